//! Topic-aware encryption and decryption of payloads.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use topicseal_crypto::{Envelope, TopicKey};
use topicseal_keys::clock::expiry_after;
use topicseal_keys::{Clock, Jitter, KeyProvider, RandomJitter, SystemClock};
use tracing::{debug, trace};

use crate::error::Result;
use crate::options::EngineOptions;

#[derive(Clone)]
struct ActiveKey {
    version: u32,
    key_attribute_name: Option<String>,
    cipher: Arc<TopicKey>,
}

struct EncryptionSlot {
    /// `None` records that the topic is not encrypted.
    key: Option<ActiveKey>,
    expire_at: DateTime<Utc>,
}

struct DecryptionSlot {
    cipher: Arc<TopicKey>,
    expire_at: DateTime<Utc>,
}

type DecryptionSlotKey = (String, u32, Option<String>);

/// Encrypts payloads under the current key of their topic and decrypts them
/// under whichever key version their envelope names.
///
/// Resolved keys are cached in process for the configured TTL plus jitter.
/// Two callers missing the same slot at once may both ask the provider; the
/// later insert wins.
pub struct CryptoEngine<P> {
    provider: P,
    options: EngineOptions,
    clock: Arc<dyn Clock>,
    jitter: Arc<dyn Jitter>,
    encryption_keys: RwLock<HashMap<String, EncryptionSlot>>,
    decryption_keys: RwLock<HashMap<DecryptionSlotKey, DecryptionSlot>>,
}

impl<P: KeyProvider> CryptoEngine<P> {
    /// Engine on the wall clock with random jitter.
    pub fn new(provider: P, options: EngineOptions) -> Self {
        Self::with_clock(
            provider,
            options,
            Arc::new(SystemClock),
            Arc::new(RandomJitter),
        )
    }

    /// Create an engine with explicit time and jitter sources.
    pub fn with_clock(
        provider: P,
        options: EngineOptions,
        clock: Arc<dyn Clock>,
        jitter: Arc<dyn Jitter>,
    ) -> Self {
        Self {
            provider,
            options,
            clock,
            jitter,
            encryption_keys: RwLock::new(HashMap::new()),
            decryption_keys: RwLock::new(HashMap::new()),
        }
    }

    /// Key provider behind the in-process caches.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Encrypt `plaintext` for `topic`.
    ///
    /// Topics without a key yield an unencrypted envelope around the
    /// unchanged plaintext. Every encryption draws a fresh random IV.
    pub fn encrypt(&self, topic: &str, plaintext: &[u8]) -> Result<Envelope> {
        let Some(active) = self.encryption_key(topic)? else {
            return Ok(Envelope::plaintext(plaintext.to_vec()));
        };
        let (iv, ciphertext) = active.cipher.encrypt(plaintext)?;
        Ok(Envelope::new(
            ciphertext,
            Some(iv.to_vec()),
            active.version,
            active.key_attribute_name,
        ))
    }

    /// Decrypt an envelope received on `topic`.
    ///
    /// Unencrypted envelopes return their payload as is. A failed
    /// authentication tag is an error, never plaintext.
    pub fn decrypt(&self, topic: &str, envelope: &Envelope) -> Result<Vec<u8>> {
        let iv = match envelope.iv() {
            Some(iv) if envelope.is_encrypted() => iv,
            _ => return Ok(envelope.payload().to_vec()),
        };
        let cipher = self.decryption_key(
            topic,
            envelope.key_version(),
            envelope.key_attribute_name(),
        )?;
        Ok(cipher.decrypt(iv, envelope.payload())?)
    }

    /// Forget every key held in process.
    pub fn invalidate(&self) {
        self.encryption_keys.write().clear();
        self.decryption_keys.write().clear();
        debug!("in-process key caches cleared");
    }

    fn expiry(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        expiry_after(
            now,
            self.options.key_cache_ttl(),
            self.jitter.as_ref(),
            self.options.max_jitter(),
        )
    }

    fn encryption_key(&self, topic: &str) -> Result<Option<ActiveKey>> {
        let now = self.clock.now();
        if let Some(slot) = self.encryption_keys.read().get(topic) {
            if slot.expire_at > now {
                return Ok(slot.key.clone());
            }
        }

        let key = match self.provider.retrieve_key_for_encryption(topic)? {
            Some(kv) => {
                trace!(topic, version = kv.version, key = %kv.encoded_key, "resolved encryption key");
                Some(ActiveKey {
                    version: kv.version,
                    key_attribute_name: kv.key_attribute_name.clone(),
                    cipher: Arc::new(TopicKey::from_encoded(&kv.encoded_key)?),
                })
            }
            None => {
                debug!(topic, "no encryption key, payloads pass through unencrypted");
                None
            }
        };
        self.encryption_keys.write().insert(
            topic.to_string(),
            EncryptionSlot {
                key: key.clone(),
                expire_at: self.expiry(now),
            },
        );
        Ok(key)
    }

    fn decryption_key(
        &self,
        topic: &str,
        version: u32,
        key_attribute_name: Option<&str>,
    ) -> Result<Arc<TopicKey>> {
        let now = self.clock.now();
        let slot_key = (
            topic.to_string(),
            version,
            key_attribute_name.map(str::to_string),
        );
        if let Some(slot) = self.decryption_keys.read().get(&slot_key) {
            if slot.expire_at > now {
                return Ok(slot.cipher.clone());
            }
        }

        let encoded = self
            .provider
            .retrieve_key_for_decryption(topic, version, key_attribute_name)?;
        trace!(topic, version, key = %encoded, "resolved decryption key");
        let cipher = Arc::new(TopicKey::from_encoded(&encoded)?);
        self.decryption_keys.write().insert(
            slot_key,
            DecryptionSlot {
                cipher: cipher.clone(),
                expire_at: self.expiry(now),
            },
        );
        Ok(cipher)
    }
}
