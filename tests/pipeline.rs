//! End-to-end tests: secret store → key providers → engine → wire formats.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use parking_lot::Mutex;
use topicseal::crypto::headers::{HEADER_CIPHER_DESCRIPTOR, HEADER_IV};
use topicseal::keys::{KeyError, SecretMetadata, SecretResponse};
use topicseal::{
    envelope_from_headers, envelope_headers, CachingKeyProvider, CachingOptions, CryptoEngine,
    EngineOptions, ErrorKind, FieldEnvelopeCodec, InMemoryCacheStorage, SecretReader,
    SecretStoreKeyProvider, TopicPathResolver, TopicPolicyAware, TopicRule,
};

// ============================================================================
// Helpers
// ============================================================================

const KEY_V1: &str = "q2P0aZ4xc0FmV9s1yH3bW8kJrT6uEoN2dLpXcAeZg1M=";
const KEY_V2: &str = "gZvWT1IN0mM5sK3sK0V2Wfzo9Jmk4tUPt7gxRsuN3LY=";

/// In-memory KV store: path → key material per version (index 0 = version 1).
#[derive(Default)]
struct VersionedStore {
    secrets: Mutex<HashMap<String, Vec<String>>>,
    down: AtomicBool,
    reads: AtomicUsize,
}

impl VersionedStore {
    fn with(path: &str, keys: &[&str]) -> Arc<Self> {
        let store = Self::default();
        store.secrets.lock().insert(
            path.to_string(),
            keys.iter().map(|k| k.to_string()).collect(),
        );
        Arc::new(store)
    }

    fn rotate(&self, path: &str, key: &str) {
        self.secrets
            .lock()
            .entry(path.to_string())
            .or_default()
            .push(key.to_string());
    }

    fn response(version: u32, key: &str) -> SecretResponse {
        SecretResponse {
            data: [("value".to_string(), format!("{}\n", key))].into_iter().collect(),
            metadata: Some(SecretMetadata {
                version,
                created_time: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            }),
        }
    }
}

impl SecretReader for VersionedStore {
    fn read(&self, path: &str) -> Result<SecretResponse, KeyError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.down.load(Ordering::SeqCst) {
            return Err(KeyError::Store("connection refused".into()));
        }
        let secrets = self.secrets.lock();
        let keys = secrets
            .get(path)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| KeyError::Store(format!("404 {}", path)))?;
        Ok(Self::response(keys.len() as u32, &keys[keys.len() - 1]))
    }

    fn read_version(&self, path: &str, version: u32) -> Result<SecretResponse, KeyError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.down.load(Ordering::SeqCst) {
            return Err(KeyError::Store("connection refused".into()));
        }
        let secrets = self.secrets.lock();
        let key = secrets
            .get(path)
            .and_then(|keys| keys.get((version as usize).wrapping_sub(1)))
            .ok_or_else(|| KeyError::Store(format!("404 {}?version={}", path, version)))?;
        Ok(Self::response(version, key))
    }
}

fn resolver() -> TopicPathResolver {
    TopicPathResolver::multi(vec![
        TopicRule::fallback().with_path_template("kafka/%TOPICNAME%"),
        TopicRule::prefix("audit.").with_encryption_enabled(false),
    ])
    .expect("valid rules")
}

type Stack = CryptoEngine<CachingKeyProvider<SecretStoreKeyProvider>>;

fn stack(store: Arc<VersionedStore>, cache: Arc<InMemoryCacheStorage>) -> Arc<Stack> {
    let provider = SecretStoreKeyProvider::with_reader(resolver(), store);
    let caching = CachingKeyProvider::with_defaults(provider, cache, CachingOptions::default());
    Arc::new(CryptoEngine::new(caching, EngineOptions::default()))
}

// ============================================================================
// Field envelopes
// ============================================================================

#[test]
fn field_round_trip_through_full_stack() {
    let store = VersionedStore::with("kafka/orders", &[KEY_V1]);
    let codec = FieldEnvelopeCodec::new(stack(store, Arc::new(InMemoryCacheStorage::new())));

    let sealed = codec
        .encode_field("orders", Some("4111 1111 1111 1111"))
        .unwrap()
        .unwrap();
    assert!(sealed.starts_with("encAesV1.1."));
    let opened = codec.decode_field("orders", Some(&sealed)).unwrap();
    assert_eq!(opened.as_deref(), Some("4111 1111 1111 1111"));
}

#[test]
fn known_field_vector_decodes_from_store() {
    let store = VersionedStore::with("kafka/orders", &[KEY_V1, "unused", KEY_V2]);
    let codec = FieldEnvelopeCodec::new(stack(store, Arc::new(InMemoryCacheStorage::new())));
    let opened = codec
        .decode_field(
            "orders",
            Some("encAesV1.3.JPsMcIDBGACHUveT.Y89d2GZR/Dpg8BXlzAkJB9SqazBGwXJ+4PLoCQ=="),
        )
        .unwrap();
    assert_eq!(opened.as_deref(), Some("Hello World!"));
}

#[test]
fn unencrypted_topics_pass_through() {
    let store = Arc::new(VersionedStore::default());
    let engine = stack(store.clone(), Arc::new(InMemoryCacheStorage::new()));
    let codec = FieldEnvelopeCodec::new(engine.clone());

    assert_eq!(
        codec.encode_field("audit.login", Some("alice")).unwrap().as_deref(),
        Some("alice")
    );
    assert!(!engine.provider().is_encrypted_topic("audit.login"));
    assert!(engine.provider().is_encrypted_topic("orders"));
    assert_eq!(store.reads.load(Ordering::SeqCst), 0);
}

#[test]
fn old_fields_stay_readable_after_rotation() {
    let store = VersionedStore::with("kafka/orders", &[KEY_V1]);
    let cache = Arc::new(InMemoryCacheStorage::new());
    let codec = FieldEnvelopeCodec::new(stack(store.clone(), cache.clone()));
    let old = codec.encode_field("orders", Some("before")).unwrap().unwrap();

    store.rotate("kafka/orders", KEY_V2);
    let fresh = FieldEnvelopeCodec::new(stack(store, Arc::new(InMemoryCacheStorage::new())));
    let new = fresh.encode_field("orders", Some("after")).unwrap().unwrap();
    assert!(new.starts_with("encAesV1.2."));

    assert_eq!(fresh.decode_field("orders", Some(&old)).unwrap().as_deref(), Some("before"));
    assert_eq!(codec.decode_field("orders", Some(&new)).unwrap().as_deref(), Some("after"));
}

// ============================================================================
// Header envelopes
// ============================================================================

#[test]
fn header_round_trip() {
    let store = VersionedStore::with("kafka/payments", &[KEY_V1, KEY_V2]);
    let engine = stack(store, Arc::new(InMemoryCacheStorage::new()));

    let envelope = engine.encrypt("payments", br#"{"amount":42}"#).unwrap();
    let headers = envelope_headers(&envelope);
    assert_eq!(headers.len(), 3);

    let received = envelope_from_headers(
        envelope.payload().to_vec(),
        headers.iter().map(|(n, v)| (*n, v.as_slice())),
    )
    .unwrap();
    assert_eq!(received, envelope);
    assert_eq!(engine.decrypt("payments", &received).unwrap(), br#"{"amount":42}"#);
}

#[test]
fn descriptor_headers_are_understood() {
    let store = VersionedStore::with("kafka/orders", &[KEY_V1, "unused", KEY_V2]);
    let engine = stack(store, Arc::new(InMemoryCacheStorage::new()));

    let iv = topicseal::crypto::base64_decode("JPsMcIDBGACHUveT").unwrap();
    let payload = topicseal::crypto::base64_decode("Y89d2GZR/Dpg8BXlzAkJB9SqazBGwXJ+4PLoCQ==").unwrap();
    let descriptor =
        br#"[{"payload":{"cipherVersion":3,"cipherVersionString":"3","cipherName":"value"}}]"#;
    let envelope = envelope_from_headers(
        payload,
        [
            (HEADER_IV, iv.as_slice()),
            (HEADER_CIPHER_DESCRIPTOR, descriptor.as_slice()),
        ],
    )
    .unwrap();
    assert_eq!(envelope.key_version(), 3);
    assert_eq!(envelope.key_attribute_name(), Some("value"));
    assert_eq!(engine.decrypt("orders", &envelope).unwrap(), b"Hello World!");
}

#[test]
fn plaintext_messages_have_no_headers() {
    let engine = stack(
        Arc::new(VersionedStore::default()),
        Arc::new(InMemoryCacheStorage::new()),
    );
    let envelope = engine.encrypt("audit.login", b"alice").unwrap();
    assert!(envelope_headers(&envelope).is_empty());
    let received = envelope_from_headers(b"alice".to_vec(), std::iter::empty()).unwrap();
    assert_eq!(engine.decrypt("audit.login", &received).unwrap(), b"alice");
}

// ============================================================================
// Failure classification
// ============================================================================

#[test]
fn missing_path_is_configuration_error() {
    let resolver = TopicPathResolver::multi(vec![TopicRule::exact("orders").with_path("kafka/orders")])
        .unwrap();
    let provider = SecretStoreKeyProvider::with_reader(resolver, Arc::new(VersionedStore::default()));
    let engine = CryptoEngine::new(provider, EngineOptions::default());
    let err = engine.encrypt("shipments", b"x").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
}

#[test]
fn store_outage_on_decrypt_is_store_error() {
    let store = VersionedStore::with("kafka/orders", &[KEY_V1]);
    let engine = stack(store.clone(), Arc::new(InMemoryCacheStorage::new()));
    let envelope = engine.encrypt("orders", b"x").unwrap();
    engine.invalidate();
    store.down.store(true, Ordering::SeqCst);
    // Decryption keys are not in the second-level cache yet.
    assert_eq!(engine.decrypt("orders", &envelope).unwrap_err().kind(), ErrorKind::Store);
}

#[test]
fn tampered_field_is_crypto_error() {
    let store = VersionedStore::with("kafka/orders", &[KEY_V1]);
    let codec = FieldEnvelopeCodec::new(stack(store, Arc::new(InMemoryCacheStorage::new())));
    let sealed = codec.encode_field("orders", Some("value")).unwrap().unwrap();
    let mut parts: Vec<String> = sealed.split('.').map(str::to_string).collect();
    let mut ct = topicseal::crypto::base64_decode(&parts[3]).unwrap();
    ct[0] ^= 0x80;
    parts[3] = topicseal::crypto::base64_encode(&ct);
    let err = codec.decode_field("orders", Some(&parts.join("."))).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Crypto);
}
