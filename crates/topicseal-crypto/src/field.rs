//! Textual wire format for encrypted fields inside structured messages.
//!
//! Format: `encAesV1.<version>.<iv base64>.<ciphertext base64>`
//!
//! Values without the `encAesV1.` prefix are plaintext and pass through
//! untouched. Persisted field values must stay decodable forever, so this
//! format never changes.

use crate::base64::{base64_decode, base64_encode};
use crate::envelope::Envelope;
use crate::error::CryptoError;
use crate::types::{FIELD_PREFIX, FIELD_SEGMENTS};

/// Render an envelope as a field value.
///
/// Unencrypted envelopes come back as their payload, which must be UTF-8.
pub fn encode_field(envelope: &Envelope) -> Result<String, CryptoError> {
    match envelope.iv() {
        Some(iv) if envelope.is_encrypted() => Ok(format!(
            "{}.{}.{}.{}",
            FIELD_PREFIX,
            envelope.key_version(),
            base64_encode(iv),
            base64_encode(envelope.payload())
        )),
        _ => String::from_utf8(envelope.payload().to_vec())
            .map_err(|e| CryptoError::MalformedField(format!("plaintext is not UTF-8: {}", e))),
    }
}

/// True if the value carries the encrypted-field prefix.
pub fn is_encrypted_field(value: &str) -> bool {
    value
        .strip_prefix(FIELD_PREFIX)
        .is_some_and(|rest| rest.starts_with('.'))
}

/// Parse a field value into an envelope.
///
/// Plaintext values become unencrypted envelopes. Prefixed values must have
/// exactly four segments, a positive integer version, and base64 IV and
/// ciphertext. The field format carries no key attribute name.
pub fn decode_field(value: &str) -> Result<Envelope, CryptoError> {
    if !is_encrypted_field(value) {
        return Ok(Envelope::plaintext(value.as_bytes().to_vec()));
    }

    let parts: Vec<&str> = value.split('.').collect();
    if parts.len() != FIELD_SEGMENTS {
        return Err(CryptoError::MalformedField(format!(
            "expected {} segments, got {}",
            FIELD_SEGMENTS,
            parts.len()
        )));
    }

    let version: u32 = parts[1]
        .parse()
        .map_err(|_| CryptoError::MalformedField(format!("invalid version \"{}\"", parts[1])))?;
    if version == 0 {
        return Err(CryptoError::MalformedField("version must be positive".into()));
    }
    let iv = base64_decode(parts[2])
        .map_err(|e| CryptoError::MalformedField(format!("invalid IV: {}", e)))?;
    let ciphertext = base64_decode(parts[3])
        .map_err(|e| CryptoError::MalformedField(format!("invalid ciphertext: {}", e)))?;

    Ok(Envelope::new(ciphertext, Some(iv), version, None))
}
