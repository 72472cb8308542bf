//! Key lookup capabilities.

use std::sync::Arc;

use crate::error::KeyError;
use crate::types::KeyVersion;

/// Resolves key material for topics.
pub trait KeyProvider: Send + Sync {
    /// Current key for encrypting messages on `topic`.
    ///
    /// `None` means the topic has no encryption policy and messages go out in
    /// plaintext. It is not an error.
    fn retrieve_key_for_encryption(&self, topic: &str) -> Result<Option<KeyVersion>, KeyError>;

    /// Base64 key material of a specific, possibly historical, key version.
    ///
    /// `key_attribute_name` of `None` selects the attribute configured for the
    /// topic.
    fn retrieve_key_for_decryption(
        &self,
        topic: &str,
        version: u32,
        key_attribute_name: Option<&str>,
    ) -> Result<String, KeyError>;
}

/// Providers that know whether a topic is encrypted at all.
pub trait TopicPolicyAware {
    fn is_encrypted_topic(&self, topic: &str) -> bool;
}

impl<T> KeyProvider for Arc<T>
where
    T: KeyProvider + ?Sized,
{
    fn retrieve_key_for_encryption(&self, topic: &str) -> Result<Option<KeyVersion>, KeyError> {
        (**self).retrieve_key_for_encryption(topic)
    }

    fn retrieve_key_for_decryption(
        &self,
        topic: &str,
        version: u32,
        key_attribute_name: Option<&str>,
    ) -> Result<String, KeyError> {
        (**self).retrieve_key_for_decryption(topic, version, key_attribute_name)
    }
}

impl<T> KeyProvider for Box<T>
where
    T: KeyProvider + ?Sized,
{
    fn retrieve_key_for_encryption(&self, topic: &str) -> Result<Option<KeyVersion>, KeyError> {
        (**self).retrieve_key_for_encryption(topic)
    }

    fn retrieve_key_for_decryption(
        &self,
        topic: &str,
        version: u32,
        key_attribute_name: Option<&str>,
    ) -> Result<String, KeyError> {
        (**self).retrieve_key_for_decryption(topic, version, key_attribute_name)
    }
}

impl<T> TopicPolicyAware for Arc<T>
where
    T: TopicPolicyAware + ?Sized,
{
    fn is_encrypted_topic(&self, topic: &str) -> bool {
        (**self).is_encrypted_topic(topic)
    }
}
