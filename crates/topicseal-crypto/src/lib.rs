//! Envelope primitives for topic encryption: AES-256-GCM, the textual field
//! format, and the transport header mapping.
//!
//! Key lookup and caching live in `topicseal-keys`; this crate only ever sees
//! key material that has already been resolved.

pub mod aes_gcm;
pub mod base64;
pub mod envelope;
pub mod error;
pub mod field;
pub mod headers;
pub mod types;

pub use crate::aes_gcm::{generate_iv, TopicKey};
pub use base64::{base64_decode, base64_encode, decode_key_material};
pub use envelope::Envelope;
pub use error::CryptoError;
pub use field::{decode_field, encode_field, is_encrypted_field};
pub use headers::{envelope_from_headers, envelope_headers};
pub use types::{AES_GCM_IV_LENGTH, AES_GCM_TAG_LENGTH, AES_KEY_LENGTH, FIELD_PREFIX};
