//! Second-level key cache in front of a slower KeyProvider.
//!
//! The cache lives in a [`SecondLevelCacheStorage`] as one text blob that may
//! be shared with other instances. Every lookup loads the whole blob, decides,
//! maybe asks the inner provider, and maybe writes the whole blob back. That
//! cycle runs under one per-instance lock. Other processes writing the same
//! storage are not excluded; conflicting state they leave behind surfaces as
//! [`KeyError::CacheAmbiguity`] instead of being resolved silently.
//!
//! The storage is an optimization. Failing to read or write it is logged and
//! otherwise ignored.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::cache_format::{empty_cache, parse_entries, serialize_entries, CacheEntry};
use crate::clock::{expiry_after, Clock, Jitter, RandomJitter, SystemClock};
use crate::error::KeyError;
use crate::provider::{KeyProvider, TopicPolicyAware};
use crate::storage::SecondLevelCacheStorage;
use crate::types::{KeyVersion, DEFAULT_MAX_JITTER};

/// Tuning for [`CachingKeyProvider`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CachingOptions {
    /// How long an encryption key is served from the cache before the store
    /// is asked again.
    pub encryption_key_ttl_secs: u64,
    /// Upper bound of the random extra lifetime added to each expiry.
    pub max_jitter_secs: u64,
    /// Largest serialized cache, in characters, that will be written.
    /// Anything bigger is replaced by an empty cache.
    pub max_cache_chars: usize,
}

impl Default for CachingOptions {
    fn default() -> Self {
        Self {
            encryption_key_ttl_secs: 60 * 60,
            max_jitter_secs: DEFAULT_MAX_JITTER.as_secs(),
            max_cache_chars: 64 * 1024,
        }
    }
}

impl CachingOptions {
    /// Encryption key lifetime.
    pub fn encryption_key_ttl(&self) -> Duration {
        Duration::from_secs(self.encryption_key_ttl_secs)
    }

    /// Upper bound of the random extra lifetime.
    pub fn max_jitter(&self) -> Duration {
        Duration::from_secs(self.max_jitter_secs)
    }
}

/// KeyProvider decorator backed by a persisted, possibly shared, cache.
pub struct CachingKeyProvider<P> {
    inner: P,
    storage: Box<dyn SecondLevelCacheStorage>,
    options: CachingOptions,
    clock: Arc<dyn Clock>,
    jitter: Arc<dyn Jitter>,
    lock: Mutex<()>,
}

impl<P: KeyProvider> CachingKeyProvider<P> {
    /// Create a caching provider.
    ///
    /// # Arguments
    /// * `inner` - Provider consulted on cache misses and expiry
    /// * `storage` - Backend holding the serialized cache
    /// * `options` - TTL, jitter and size settings
    /// * `clock` - Time source for expiry decisions
    /// * `jitter` - Source of the random extra lifetime
    pub fn new(
        inner: P,
        storage: impl SecondLevelCacheStorage + 'static,
        options: CachingOptions,
        clock: Arc<dyn Clock>,
        jitter: Arc<dyn Jitter>,
    ) -> Self {
        Self {
            inner,
            storage: Box::new(storage),
            options,
            clock,
            jitter,
            lock: Mutex::new(()),
        }
    }

    /// Create a caching provider on the wall clock with random jitter.
    pub fn with_defaults(
        inner: P,
        storage: impl SecondLevelCacheStorage + 'static,
        options: CachingOptions,
    ) -> Self {
        Self::new(
            inner,
            storage,
            options,
            Arc::new(SystemClock),
            Arc::new(RandomJitter),
        )
    }

    /// The wrapped provider.
    pub fn inner(&self) -> &P {
        &self.inner
    }

    /// Wipe the whole second-level cache.
    ///
    /// This is the way out of [`KeyError::CacheAmbiguity`].
    pub fn clear(&self) {
        let _guard = self.lock.lock();
        info!("clearing second-level key cache");
        self.write(empty_cache());
    }

    fn load(&self) -> Vec<CacheEntry> {
        match self.storage.retrieve_entry() {
            Ok(Some(text)) => parse_entries(&text),
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!(error = %e, "failed to read second-level key cache, continuing without it");
                Vec::new()
            }
        }
    }

    fn persist(&self, entries: &[CacheEntry]) {
        let text = serialize_entries(entries);
        let chars = text.chars().count();
        if chars > self.options.max_cache_chars {
            warn!(
                chars,
                max = self.options.max_cache_chars,
                "second-level key cache too large, replacing it with an empty cache"
            );
            self.write(empty_cache());
            return;
        }
        self.write(text);
    }

    fn write(&self, text: String) {
        if let Err(e) = self.storage.store_entry(&text) {
            warn!(error = %e, "failed to write second-level key cache");
        }
    }

    fn expiry(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        expiry_after(
            now,
            self.options.encryption_key_ttl(),
            self.jitter.as_ref(),
            self.options.max_jitter(),
        )
    }
}

impl<P: KeyProvider> KeyProvider for CachingKeyProvider<P> {
    fn retrieve_key_for_encryption(&self, topic: &str) -> Result<Option<KeyVersion>, KeyError> {
        let _guard = self.lock.lock();
        let mut entries = self.load();
        let now = self.clock.now();

        let live: Vec<usize> = entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.topic == topic && e.is_encryption_entry() && !e.is_expired_at(now))
            .map(|(i, _)| i)
            .collect();
        match live.as_slice() {
            [] => {}
            [only] => {
                let entry = &entries[*only];
                debug!(topic, version = entry.version, "encryption key served from second-level cache");
                return Ok(Some(entry.to_key_version()));
            }
            many => {
                return Err(KeyError::CacheAmbiguity {
                    topic: topic.to_string(),
                    candidates: many.len(),
                });
            }
        }

        let stale = newest_expired(&entries, topic);
        match self.inner.retrieve_key_for_encryption(topic) {
            Ok(Some(key)) => {
                let expire_at = self.expiry(now);
                match stale {
                    Some(i) if entries[i].holds(&key) => {
                        debug!(topic, version = key.version, "cached encryption key unchanged, extending expiry");
                        entries[i].expire_at = Some(expire_at);
                    }
                    _ => {
                        debug!(topic, version = key.version, "caching new encryption key");
                        entries.push(CacheEntry::for_encryption(topic, &key, expire_at));
                    }
                }
                self.persist(&entries);
                Ok(Some(key))
            }
            Ok(None) => Ok(None),
            Err(e) if e.is_store_failure() => {
                let Some(i) = stale else {
                    return Err(e);
                };
                warn!(
                    topic,
                    version = entries[i].version,
                    error = %e,
                    "secret store unavailable, serving expired encryption key from cache"
                );
                entries[i].expire_at = Some(self.expiry(now));
                let key = entries[i].to_key_version();
                self.persist(&entries);
                Ok(Some(key))
            }
            Err(e) => Err(e),
        }
    }

    fn retrieve_key_for_decryption(
        &self,
        topic: &str,
        version: u32,
        key_attribute_name: Option<&str>,
    ) -> Result<String, KeyError> {
        let _guard = self.lock.lock();
        let mut entries = self.load();

        let matches: Vec<&CacheEntry> = entries
            .iter()
            .filter(|e| {
                !e.is_encryption_entry()
                    && e.topic == topic
                    && e.version == version
                    && e.key_attribute_name.as_deref() == key_attribute_name
            })
            .collect();
        if let Some(first) = matches.first() {
            if matches.iter().any(|e| e.encoded_key != first.encoded_key) {
                return Err(KeyError::CacheAmbiguity {
                    topic: topic.to_string(),
                    candidates: matches.len(),
                });
            }
            debug!(topic, version, "decryption key served from second-level cache");
            return Ok(first.encoded_key.clone());
        }

        let key = self
            .inner
            .retrieve_key_for_decryption(topic, version, key_attribute_name)?;
        debug!(topic, version, "caching decryption key");
        entries.push(CacheEntry::for_decryption(
            topic,
            version,
            key_attribute_name,
            &key,
        ));
        self.persist(&entries);
        Ok(key)
    }
}

impl<P: TopicPolicyAware> TopicPolicyAware for CachingKeyProvider<P> {
    fn is_encrypted_topic(&self, topic: &str) -> bool {
        self.inner.is_encrypted_topic(topic)
    }
}

/// Best expired encryption entry for a topic: highest version, then latest
/// expiry.
fn newest_expired(entries: &[CacheEntry], topic: &str) -> Option<usize> {
    entries
        .iter()
        .enumerate()
        .filter(|(_, e)| e.topic == topic && e.is_encryption_entry())
        .max_by(|(_, a), (_, b)| {
            a.version
                .cmp(&b.version)
                .then_with(|| a.expire_at.cmp(&b.expire_at))
        })
        .map(|(i, _)| i)
}
