use thiserror::Error;

#[derive(Debug, Error)]
pub enum KeyError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Format error: {0}")]
    Format(String),

    #[error("Secret store error: {0}")]
    Store(String),

    #[error(
        "Ambiguous key cache for topic \"{topic}\": {candidates} entries match; clear the second-level cache"
    )]
    CacheAmbiguity { topic: String, candidates: usize },

    #[error("Crypto error: {0}")]
    Crypto(#[from] topicseal_crypto::CryptoError),
}

impl KeyError {
    /// True when the secret store itself failed, as opposed to bad input or
    /// configuration. Only these failures may be papered over with a stale key.
    pub fn is_store_failure(&self) -> bool {
        matches!(self, KeyError::Store(_))
    }
}

/// Failure of a second-level cache backend. Never fatal.
#[derive(Debug, Error)]
pub enum CacheStorageError {
    #[error("Cache storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cache storage backend error: {0}")]
    Backend(String),
}
