//! Raw secret store operations, below token management.

use std::fmt;
use std::time::Duration;

use topicseal_keys::SecretResponse;

use crate::error::VaultError;

/// Result of an app-role login.
#[derive(Clone, PartialEq, Eq)]
pub struct LoginGrant {
    pub client_token: String,
    /// Zero means the token does not expire.
    pub lease_duration: Duration,
    pub renewable: bool,
}

impl fmt::Debug for LoginGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginGrant")
            .field("client_token", &"<redacted>")
            .field("lease_duration", &self.lease_duration)
            .field("renewable", &self.renewable)
            .finish()
    }
}

/// Stateless access to the store. The caller supplies the token.
pub trait SecretStoreSession: Send + Sync {
    fn login_app_role(&self, role_id: &str, secret_id: &str) -> Result<LoginGrant, VaultError>;

    /// Read a secret, latest version when `version` is `None`.
    fn read(
        &self,
        token: &str,
        path: &str,
        version: Option<u32>,
    ) -> Result<SecretResponse, VaultError>;
}
