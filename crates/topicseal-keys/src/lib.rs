//! Key lookup for topic encryption: the `KeyProvider` capability, secret path
//! resolution, the secret-store-backed provider, and the persisted
//! second-level key cache.

pub mod cache_format;
pub mod caching;
pub mod clock;
pub mod error;
pub mod provider;
pub mod resolver;
pub mod secret;
pub mod secret_store;
pub mod storage;
pub mod types;

pub use caching::{CachingKeyProvider, CachingOptions};
pub use clock::{Clock, FixedJitter, Jitter, ManualClock, RandomJitter, SystemClock};
pub use error::{CacheStorageError, KeyError};
pub use provider::{KeyProvider, TopicPolicyAware};
pub use resolver::{ResolverSettings, SingleTopic, TopicPathResolver, TopicRule};
pub use secret::{SecretMetadata, SecretReader, SecretResponse};
pub use secret_store::SecretStoreKeyProvider;
pub use storage::{FileCacheStorage, InMemoryCacheStorage, SecondLevelCacheStorage};
pub use types::{KeyVersion, DEFAULT_KEY_ATTRIBUTE_NAME};
