//! KeyProvider backed directly by the secret store.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::error::KeyError;
use crate::provider::{KeyProvider, TopicPolicyAware};
use crate::resolver::TopicPathResolver;
use crate::secret::{SecretReader, SecretResponse};
use crate::types::KeyVersion;

type Connector = Box<dyn Fn() -> Result<Arc<dyn SecretReader>, KeyError> + Send + Sync>;

/// Reads key material and version metadata from the secret store.
///
/// The store connection is opened on first use and reused afterwards. A
/// failed connect is not remembered, the next lookup tries again.
pub struct SecretStoreKeyProvider {
    resolver: TopicPathResolver,
    connect: Connector,
    connection: Mutex<Option<Arc<dyn SecretReader>>>,
}

impl SecretStoreKeyProvider {
    /// Create a provider that opens its connection lazily through `connect`.
    pub fn new<F>(resolver: TopicPathResolver, connect: F) -> Self
    where
        F: Fn() -> Result<Arc<dyn SecretReader>, KeyError> + Send + Sync + 'static,
    {
        Self {
            resolver,
            connect: Box::new(connect),
            connection: Mutex::new(None),
        }
    }

    /// Create a provider around an already open reader.
    pub fn with_reader(resolver: TopicPathResolver, reader: Arc<dyn SecretReader>) -> Self {
        let shared = reader.clone();
        Self {
            resolver,
            connect: Box::new(move || Ok(shared.clone())),
            connection: Mutex::new(Some(reader)),
        }
    }

    /// Topic to secret-path resolution in use.
    pub fn resolver(&self) -> &TopicPathResolver {
        &self.resolver
    }

    fn connection(&self) -> Result<Arc<dyn SecretReader>, KeyError> {
        let mut slot = self.connection.lock();
        if let Some(reader) = slot.as_ref() {
            return Ok(reader.clone());
        }
        debug!("opening secret store connection");
        let reader = (self.connect)()?;
        *slot = Some(reader.clone());
        Ok(reader)
    }
}

impl KeyProvider for SecretStoreKeyProvider {
    fn retrieve_key_for_encryption(&self, topic: &str) -> Result<Option<KeyVersion>, KeyError> {
        if !self.resolver.is_encryption_enabled(topic) {
            debug!(topic, "topic is not encrypted");
            return Ok(None);
        }
        let path = self.resolver.path(topic)?;
        let attribute = self.resolver.key_attribute_name(topic);
        let secret = self.connection()?.read(&path)?;

        let metadata = secret.metadata.as_ref().ok_or_else(|| {
            KeyError::Format(format!("secret at \"{}\" has no version metadata", path))
        })?;
        if metadata.version == 0 {
            return Err(KeyError::Format(format!(
                "secret at \"{}\" reports invalid version 0",
                path
            )));
        }
        let encoded_key = extract_key(&secret, &path, &attribute)?;
        debug!(
            topic,
            path = %path,
            version = metadata.version,
            created_time = %metadata.created_time,
            "fetched encryption key"
        );
        Ok(Some(KeyVersion::new(
            metadata.version,
            Some(attribute),
            encoded_key,
        )))
    }

    fn retrieve_key_for_decryption(
        &self,
        topic: &str,
        version: u32,
        key_attribute_name: Option<&str>,
    ) -> Result<String, KeyError> {
        let path = self.resolver.path(topic)?;
        let attribute = match key_attribute_name {
            Some(name) => name.to_string(),
            None => self.resolver.key_attribute_name(topic),
        };
        let secret = self.connection()?.read_version(&path, version)?;
        if let Some(metadata) = &secret.metadata {
            if metadata.version != version {
                return Err(KeyError::Format(format!(
                    "asked for version {} of \"{}\" but the store returned version {}",
                    version, path, metadata.version
                )));
            }
        }
        let encoded_key = extract_key(&secret, &path, &attribute)?;
        debug!(topic, path = %path, version, "fetched decryption key");
        Ok(encoded_key)
    }
}

impl TopicPolicyAware for SecretStoreKeyProvider {
    fn is_encrypted_topic(&self, topic: &str) -> bool {
        self.resolver.is_encryption_enabled(topic)
    }
}

fn extract_key(secret: &SecretResponse, path: &str, attribute: &str) -> Result<String, KeyError> {
    match secret.data.get(attribute) {
        Some(key) if !key.trim().is_empty() => Ok(key.clone()),
        _ => Err(KeyError::Format(format!(
            "secret at \"{}\" has no key attribute \"{}\"",
            path, attribute
        ))),
    }
}
