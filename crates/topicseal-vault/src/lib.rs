//! Secret store connectivity for topicseal.
//!
//! [`TokenRenewingConnection`] keeps a valid token in front of any
//! [`SecretStoreSession`] and implements `topicseal_keys::SecretReader`, so it
//! plugs straight into `SecretStoreKeyProvider`. [`HttpVaultSession`] is the
//! KV v2 HTTP implementation.

pub mod auth;
pub mod connection;
pub mod error;
pub mod http;
pub mod session;

pub use auth::{AuthSettings, VaultAuth};
pub use connection::TokenRenewingConnection;
pub use error::VaultError;
pub use http::{HttpSessionOptions, HttpVaultSession};
pub use session::{LoginGrant, SecretStoreSession};

/// Open an authenticated HTTP connection from configuration.
pub fn connect_http(
    options: HttpSessionOptions,
    auth: AuthSettings,
) -> Result<TokenRenewingConnection<HttpVaultSession>, VaultError> {
    let auth = auth.resolve()?;
    let session = HttpVaultSession::new(options)?;
    TokenRenewingConnection::connect(session, auth)
}
