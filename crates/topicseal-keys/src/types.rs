use std::fmt;

use zeroize::Zeroize;

/// Attribute holding the key material when nothing else is configured.
pub const DEFAULT_KEY_ATTRIBUTE_NAME: &str = "value";

/// Upper bound for the random jitter added to every key TTL.
pub const DEFAULT_MAX_JITTER: std::time::Duration = std::time::Duration::from_secs(120);

/// One rotation generation of a topic key, as read from the secret store.
#[derive(Clone, PartialEq, Eq)]
pub struct KeyVersion {
    pub version: u32,
    pub key_attribute_name: Option<String>,
    /// Base64 key material. May carry trailing CR/LF from the store.
    pub encoded_key: String,
}

impl KeyVersion {
    pub fn new(
        version: u32,
        key_attribute_name: Option<String>,
        encoded_key: impl Into<String>,
    ) -> Self {
        Self {
            version,
            key_attribute_name,
            encoded_key: encoded_key.into(),
        }
    }
}

impl fmt::Debug for KeyVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyVersion")
            .field("version", &self.version)
            .field("key_attribute_name", &self.key_attribute_name)
            .field("encoded_key", &"<redacted>")
            .finish()
    }
}

impl Drop for KeyVersion {
    fn drop(&mut self) {
        self.encoded_key.zeroize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_redacts_key_material() {
        let kv = KeyVersion::new(3, Some("value".into()), "c2VjcmV0");
        let out = format!("{:?}", kv);
        assert!(out.contains("version: 3"));
        assert!(!out.contains("c2VjcmV0"));
    }
}
