use thiserror::Error;
use topicseal_crypto::CryptoError;
use topicseal_keys::KeyError;

/// Coarse classification of every failure the engine can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bad topic mapping, missing team, conflicting credentials. Fatal.
    Configuration,
    /// Malformed envelope, headers, key material or secret metadata. Fatal.
    Format,
    /// Authentication tag mismatch or cipher failure. Never read as plaintext.
    Crypto,
    /// Secret store unreachable or answering with an error.
    Store,
    /// The second-level cache holds conflicting entries and must be cleared.
    CacheAmbiguity,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Key(#[from] KeyError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

impl Error {
    /// Failure category.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Key(KeyError::Configuration(_)) => ErrorKind::Configuration,
            Error::Key(KeyError::Format(_)) => ErrorKind::Format,
            Error::Key(KeyError::Store(_)) => ErrorKind::Store,
            Error::Key(KeyError::CacheAmbiguity { .. }) => ErrorKind::CacheAmbiguity,
            Error::Key(KeyError::Crypto(e)) | Error::Crypto(e) => crypto_kind(e),
        }
    }
}

fn crypto_kind(err: &CryptoError) -> ErrorKind {
    match err {
        CryptoError::MalformedField(_)
        | CryptoError::MalformedHeaders(_)
        | CryptoError::InvalidIvLength { .. }
        | CryptoError::InvalidKeyLength { .. }
        | CryptoError::InvalidKeyEncoding(_) => ErrorKind::Format,
        CryptoError::AuthenticationFailed
        | CryptoError::EncryptionFailed(_)
        | CryptoError::RngFailed(_) => ErrorKind::Crypto,
    }
}

pub type Result<T> = std::result::Result<T, Error>;
