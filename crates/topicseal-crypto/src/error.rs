use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Invalid key length: expected {expected} bytes, got {got}")]
    InvalidKeyLength { expected: usize, got: usize },

    #[error("Invalid IV length: expected {expected} bytes, got {got}")]
    InvalidIvLength { expected: usize, got: usize },

    #[error("Invalid key encoding: {0}")]
    InvalidKeyEncoding(String),

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Decryption failed: ciphertext is not authentic under this key")]
    AuthenticationFailed,

    #[error("Malformed field envelope: {0}")]
    MalformedField(String),

    #[error("Malformed envelope headers: {0}")]
    MalformedHeaders(String),

    #[error("Random number generation failed: {0}")]
    RngFailed(String),
}

impl CryptoError {
    /// True for wire-format problems, as opposed to key or cipher failures.
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            CryptoError::MalformedField(_) | CryptoError::MalformedHeaders(_)
        )
    }
}
