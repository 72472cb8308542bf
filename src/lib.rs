//! Transparent per-topic encryption for publish/subscribe payloads.
//!
//! Payloads and individual string fields are sealed with AES-256-GCM under a
//! per-topic key held in a secret store. Messages only ever carry the key
//! version and the IV. Keys are resolved through a [`KeyProvider`], usually a
//! [`CachingKeyProvider`] in front of a [`SecretStoreKeyProvider`], and cached
//! in process by the [`CryptoEngine`].
//!
//! ```no_run
//! use std::sync::Arc;
//! use topicseal::{
//!     CachingKeyProvider, CachingOptions, CryptoEngine, EngineOptions, FieldEnvelopeCodec,
//!     FileCacheStorage, SecretReader, SecretStoreKeyProvider, TopicPathResolver,
//! };
//! use topicseal::vault::{connect_http, AuthSettings, HttpSessionOptions};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let resolver = TopicPathResolver::single("*", "kafka/%TOPICNAME%", None);
//! let store = SecretStoreKeyProvider::new(resolver, || {
//!     let conn = connect_http(
//!         HttpSessionOptions::new("https://vault.internal:8200"),
//!         AuthSettings::app_role("orders-service", "s3cr3t"),
//!     )?;
//!     Ok(Arc::new(conn) as Arc<dyn SecretReader>)
//! });
//! let provider = CachingKeyProvider::with_defaults(
//!     store,
//!     FileCacheStorage::new("/var/cache/topicseal/keys"),
//!     CachingOptions::default(),
//! );
//! let engine = Arc::new(CryptoEngine::new(provider, EngineOptions::default()));
//! let fields = FieldEnvelopeCodec::new(engine.clone());
//!
//! let sealed = fields.encode_field("orders", Some("4111 1111 1111 1111"))?;
//! let _opened = fields.decode_field("orders", sealed.as_deref())?;
//! # Ok(())
//! # }
//! ```

pub mod engine;
pub mod error;
pub mod field_codec;
pub mod options;

pub use engine::CryptoEngine;
pub use error::{Error, ErrorKind, Result};
pub use field_codec::FieldEnvelopeCodec;
pub use options::EngineOptions;

pub use topicseal_crypto::{envelope_from_headers, envelope_headers, Envelope};
pub use topicseal_keys::{
    CachingKeyProvider, CachingOptions, FileCacheStorage, InMemoryCacheStorage, KeyProvider,
    KeyVersion, ResolverSettings, SecondLevelCacheStorage, SecretReader, SecretStoreKeyProvider,
    TopicPathResolver, TopicPolicyAware, TopicRule,
};

pub use topicseal_crypto as crypto;
pub use topicseal_keys as keys;
pub use topicseal_vault as vault;
