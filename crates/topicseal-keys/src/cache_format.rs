//! Text format of the second-level key cache.
//!
//! ```text
//! topicseal-key-cache v1
//! topic<TAB>orders
//! 4<TAB>2026-10-19T12:00:00Z<TAB>value<TAB>gZvWT1IN0mM5...
//! 3<TAB><TAB>value<TAB>q2P0aZ4xc0Fm...
//! ```
//!
//! Entry lines are `version, expiry, key attribute name, key material`, with
//! an empty field for an absent expiry or attribute. Entries follow the
//! `topic` line they belong to. Lines that do not parse are skipped so one
//! damaged entry never costs the rest of the cache.

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use tracing::{debug, warn};
use zeroize::Zeroize;

use crate::types::KeyVersion;

/// First line of every serialized cache.
pub const CACHE_HEADER: &str = "topicseal-key-cache v1";

const HEADER_PREFIX: &str = "topicseal-key-cache ";
const TOPIC_TAG: &str = "topic";
const SEPARATOR: char = '\t';

/// One cached key.
///
/// With `expire_at` set this is an encryption-direction entry: the current
/// key of a topic, valid until it expires. Without it this is a
/// decryption-direction entry: a fixed historical version, valid forever.
#[derive(Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub topic: String,
    pub version: u32,
    pub key_attribute_name: Option<String>,
    pub encoded_key: String,
    pub expire_at: Option<DateTime<Utc>>,
}

impl CacheEntry {
    pub fn for_encryption(topic: &str, key: &KeyVersion, expire_at: DateTime<Utc>) -> Self {
        Self {
            topic: topic.to_string(),
            version: key.version,
            key_attribute_name: key.key_attribute_name.clone(),
            encoded_key: key.encoded_key.trim().to_string(),
            expire_at: Some(expire_at),
        }
    }

    pub fn for_decryption(
        topic: &str,
        version: u32,
        key_attribute_name: Option<&str>,
        encoded_key: &str,
    ) -> Self {
        Self {
            topic: topic.to_string(),
            version,
            key_attribute_name: key_attribute_name.map(str::to_string),
            encoded_key: encoded_key.trim().to_string(),
            expire_at: None,
        }
    }

    /// True for entries carrying an expiry.
    pub fn is_encryption_entry(&self) -> bool {
        self.expire_at.is_some()
    }

    /// Expired entries are those whose expiry is not after `now`.
    /// Decryption-direction entries never expire.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expire_at.is_some_and(|at| at <= now)
    }

    /// Same version, attribute and key material as `key`.
    pub fn holds(&self, key: &KeyVersion) -> bool {
        self.version == key.version
            && self.key_attribute_name == key.key_attribute_name
            && self.encoded_key == key.encoded_key.trim()
    }

    /// The cached key.
    pub fn to_key_version(&self) -> KeyVersion {
        KeyVersion::new(
            self.version,
            self.key_attribute_name.clone(),
            self.encoded_key.clone(),
        )
    }

    fn is_serializable(&self) -> bool {
        let clean = |s: &str| !s.contains(|c: char| matches!(c, '\t' | '\n' | '\r'));
        !self.topic.is_empty()
            && clean(&self.topic)
            && self.key_attribute_name.as_deref().map_or(true, clean)
            && !self.encoded_key.is_empty()
            && clean(&self.encoded_key)
    }
}

impl fmt::Debug for CacheEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheEntry")
            .field("topic", &self.topic)
            .field("version", &self.version)
            .field("key_attribute_name", &self.key_attribute_name)
            .field("encoded_key", &"<redacted>")
            .field("expire_at", &self.expire_at)
            .finish()
    }
}

impl Drop for CacheEntry {
    fn drop(&mut self) {
        self.encoded_key.zeroize();
    }
}

/// Total order used for serialization: topic, version descending, attribute
/// name, expiry. Absent attribute names and expiries sort first.
pub fn entry_order(a: &CacheEntry, b: &CacheEntry) -> Ordering {
    a.topic
        .cmp(&b.topic)
        .then_with(|| b.version.cmp(&a.version))
        .then_with(|| a.key_attribute_name.cmp(&b.key_attribute_name))
        .then_with(|| a.expire_at.cmp(&b.expire_at))
        .then_with(|| a.encoded_key.cmp(&b.encoded_key))
}

/// A serialized cache holding no entries.
pub fn empty_cache() -> String {
    format!("{}\n", CACHE_HEADER)
}

/// Serialize entries in deterministic order.
///
/// Entries whose fields would break the line format are dropped.
pub fn serialize_entries(entries: &[CacheEntry]) -> String {
    let mut sorted: Vec<&CacheEntry> = entries.iter().collect();
    sorted.sort_by(|a, b| entry_order(a, b));

    let mut out = empty_cache();
    let mut current_topic: Option<&str> = None;
    for entry in sorted {
        if !entry.is_serializable() {
            warn!(topic = %entry.topic.escape_debug(), "dropping key cache entry that cannot be serialized");
            continue;
        }
        if current_topic != Some(entry.topic.as_str()) {
            out.push_str(TOPIC_TAG);
            out.push(SEPARATOR);
            out.push_str(&entry.topic);
            out.push('\n');
            current_topic = Some(entry.topic.as_str());
        }
        let expiry = entry
            .expire_at
            .map(|at| at.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            .unwrap_or_default();
        out.push_str(&entry.version.to_string());
        out.push(SEPARATOR);
        out.push_str(&expiry);
        out.push(SEPARATOR);
        out.push_str(entry.key_attribute_name.as_deref().unwrap_or(""));
        out.push(SEPARATOR);
        out.push_str(&entry.encoded_key);
        out.push('\n');
    }
    out
}

/// Parse a serialized cache, skipping anything unreadable.
///
/// An unknown format version yields an empty cache.
pub fn parse_entries(text: &str) -> Vec<CacheEntry> {
    let mut lines = text.lines().filter(|l| !l.trim().is_empty());

    match lines.next() {
        Some(header) if header.trim_end() == CACHE_HEADER => {}
        Some(header) if header.starts_with(HEADER_PREFIX) => {
            warn!(header = %header.trim_end(), "unsupported key cache format, ignoring cached keys");
            return Vec::new();
        }
        Some(_) => {
            warn!("key cache has no format header, ignoring cached keys");
            return Vec::new();
        }
        None => return Vec::new(),
    }

    let mut entries = Vec::new();
    let mut topic: Option<String> = None;
    let mut skipped = 0usize;

    for line in lines {
        let fields: Vec<&str> = line.trim_end_matches('\r').split(SEPARATOR).collect();
        match fields.as_slice() {
            [TOPIC_TAG, name] => {
                topic = (!name.is_empty()).then(|| name.to_string());
                if topic.is_none() {
                    skipped += 1;
                }
            }
            [version, expiry, attribute, key] => {
                match (&topic, parse_entry(version, expiry, attribute, key)) {
                    (Some(t), Some((version, expire_at, key_attribute_name, encoded_key))) => {
                        entries.push(CacheEntry {
                            topic: t.clone(),
                            version,
                            key_attribute_name,
                            encoded_key,
                            expire_at,
                        });
                    }
                    _ => {
                        debug!("skipping unreadable key cache entry");
                        skipped += 1;
                    }
                }
            }
            _ => {
                debug!("skipping unrecognized key cache line");
                skipped += 1;
            }
        }
    }

    if skipped > 0 {
        warn!(skipped, kept = entries.len(), "key cache contained unreadable lines");
    }
    entries
}

type ParsedEntry = (u32, Option<DateTime<Utc>>, Option<String>, String);

fn parse_entry(version: &str, expiry: &str, attribute: &str, key: &str) -> Option<ParsedEntry> {
    let version: u32 = version.parse().ok().filter(|v| *v > 0)?;
    let expire_at = if expiry.is_empty() {
        None
    } else {
        Some(
            DateTime::parse_from_rfc3339(expiry)
                .ok()?
                .with_timezone(&Utc),
        )
    };
    let attribute = (!attribute.is_empty()).then(|| attribute.to_string());
    if key.is_empty() {
        return None;
    }
    Some((version, expire_at, attribute, key.to_string()))
}
