use thiserror::Error;
use topicseal_keys::KeyError;

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("Vault configuration error: {0}")]
    Configuration(String),

    #[error("Vault login failed: {0}")]
    Login(String),

    #[error("Vault request failed: {0}")]
    Transport(String),

    #[error("Vault returned status {status} for {path}")]
    Status { status: u16, path: String },

    #[error("Malformed Vault response: {0}")]
    MalformedResponse(String),
}

impl From<VaultError> for KeyError {
    fn from(err: VaultError) -> Self {
        match err {
            VaultError::Configuration(msg) => KeyError::Configuration(msg),
            VaultError::MalformedResponse(msg) => KeyError::Format(msg),
            other => KeyError::Store(other.to_string()),
        }
    }
}
