//! AES-256-GCM with 96-bit IVs and 128-bit tags.
//!
//! The ciphertext returned by [`TopicKey::encrypt`] carries the tag appended,
//! the IV travels separately in the envelope. IV uniqueness per key relies
//! entirely on the operating system CSPRNG behind `getrandom`; nothing here
//! records or checks previously used IVs.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};

use crate::base64::decode_key_material;
use crate::error::CryptoError;
use crate::types::{AES_GCM_IV_LENGTH, AES_GCM_TAG_LENGTH, AES_KEY_LENGTH};

/// Generate a random 12-byte IV for AES-GCM.
pub fn generate_iv() -> Result<[u8; AES_GCM_IV_LENGTH], CryptoError> {
    let mut iv = [0u8; AES_GCM_IV_LENGTH];
    getrandom::getrandom(&mut iv).map_err(|e| CryptoError::RngFailed(e.to_string()))?;
    Ok(iv)
}

/// An AES-256-GCM key ready for use.
///
/// The cipher state is zeroized on drop.
pub struct TopicKey {
    cipher: Aes256Gcm,
}

impl TopicKey {
    /// Create a key from 32 bytes of raw key material.
    pub fn new(key: &[u8]) -> Result<Self, CryptoError> {
        if key.len() != AES_KEY_LENGTH {
            return Err(CryptoError::InvalidKeyLength {
                expected: AES_KEY_LENGTH,
                got: key.len(),
            });
        }
        let cipher = Aes256Gcm::new_from_slice(key)
            .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;
        Ok(Self { cipher })
    }

    /// Create a key from base64 key material as handed out by the secret store.
    pub fn from_encoded(encoded: &str) -> Result<Self, CryptoError> {
        let raw = decode_key_material(encoded)?;
        Self::new(&raw)
    }

    /// Encrypt under a freshly generated IV. Returns `(iv, ciphertext+tag)`.
    pub fn encrypt(
        &self,
        plaintext: &[u8],
    ) -> Result<([u8; AES_GCM_IV_LENGTH], Vec<u8>), CryptoError> {
        let iv = generate_iv()?;
        let ciphertext = self.encrypt_with_iv(&iv, plaintext)?;
        Ok((iv, ciphertext))
    }

    /// Encrypt under a caller-supplied IV.
    ///
    /// Reusing an IV with the same key breaks GCM; outside of fixed test
    /// vectors callers want [`TopicKey::encrypt`].
    pub fn encrypt_with_iv(&self, iv: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        check_iv(iv)?;
        self.cipher
            .encrypt(Nonce::from_slice(iv), plaintext)
            .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))
    }

    /// Decrypt `ciphertext+tag`. A tag mismatch is always an error.
    pub fn decrypt(&self, iv: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        check_iv(iv)?;
        if ciphertext.len() < AES_GCM_TAG_LENGTH {
            return Err(CryptoError::AuthenticationFailed);
        }
        self.cipher
            .decrypt(Nonce::from_slice(iv), ciphertext)
            .map_err(|_| CryptoError::AuthenticationFailed)
    }
}

impl std::fmt::Debug for TopicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("TopicKey(..)")
    }
}

fn check_iv(iv: &[u8]) -> Result<(), CryptoError> {
    if iv.len() != AES_GCM_IV_LENGTH {
        return Err(CryptoError::InvalidIvLength {
            expected: AES_GCM_IV_LENGTH,
            got: iv.len(),
        });
    }
    Ok(())
}
