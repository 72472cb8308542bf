//! Encrypted-or-plaintext payload plus the metadata needed to decrypt it.

/// A message payload together with its crypto metadata.
///
/// An envelope is encrypted exactly when it carries a non-empty IV and a key
/// version greater than zero. Anything else is plaintext and is handed back
/// unchanged on decryption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    payload: Vec<u8>,
    iv: Option<Vec<u8>>,
    key_version: u32,
    key_attribute_name: Option<String>,
}

impl Envelope {
    /// Wrap a payload that is not encrypted.
    pub fn plaintext(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            payload: payload.into(),
            iv: None,
            key_version: 0,
            key_attribute_name: None,
        }
    }

    /// Build an envelope from its raw parts.
    ///
    /// # Arguments
    /// * `payload` - Ciphertext (including the GCM tag) or plaintext
    /// * `iv` - Initialization vector used for encryption, if any
    /// * `key_version` - Secret-store version of the key, 0 for plaintext
    /// * `key_attribute_name` - Attribute holding the key inside the secret
    pub fn new(
        payload: impl Into<Vec<u8>>,
        iv: Option<Vec<u8>>,
        key_version: u32,
        key_attribute_name: Option<String>,
    ) -> Self {
        Self {
            payload: payload.into(),
            iv,
            key_version,
            key_attribute_name,
        }
    }

    /// Ciphertext with tag, or the plaintext when unencrypted.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Nonce, if any.
    pub fn iv(&self) -> Option<&[u8]> {
        self.iv.as_deref()
    }

    /// Key version, 0 when unencrypted.
    pub fn key_version(&self) -> u32 {
        self.key_version
    }

    /// Secret attribute holding the key.
    pub fn key_attribute_name(&self) -> Option<&str> {
        self.key_attribute_name.as_deref()
    }

    /// True when both an IV and a positive key version are set.
    pub fn is_encrypted(&self) -> bool {
        self.iv.as_ref().is_some_and(|iv| !iv.is_empty()) && self.key_version > 0
    }

    /// Consume the envelope and return the payload bytes.
    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }
}
