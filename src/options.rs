use std::time::Duration;

use serde::Deserialize;
use topicseal_keys::types::DEFAULT_MAX_JITTER;

/// Tuning for the in-process key caches of [`crate::CryptoEngine`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineOptions {
    /// Lifetime of a resolved key (or of the knowledge that a topic has none).
    pub key_cache_ttl_secs: u64,
    /// Upper bound of the random extra lifetime per cache slot.
    pub max_jitter_secs: u64,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            key_cache_ttl_secs: 10 * 60,
            max_jitter_secs: DEFAULT_MAX_JITTER.as_secs(),
        }
    }
}

impl EngineOptions {
    /// In-process key cache lifetime.
    pub fn key_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.key_cache_ttl_secs)
    }

    /// Upper bound of the random extra lifetime.
    pub fn max_jitter(&self) -> Duration {
        Duration::from_secs(self.max_jitter_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let opts: EngineOptions = serde_json::from_str(r#"{"keyCacheTtlSecs": 30}"#).unwrap();
        assert_eq!(opts.key_cache_ttl(), Duration::from_secs(30));
        assert_eq!(opts.max_jitter(), Duration::from_secs(120));
    }
}
