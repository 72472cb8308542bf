//! Whole-message envelopes carried in transport headers.
//!
//! The payload is the raw ciphertext and the crypto metadata rides along as
//! message attributes. Two layouts exist in the wild:
//!
//! - discrete: `x-enc-iv` (raw IV bytes), `x-enc-key-version` (decimal
//!   ASCII) and `x-enc-key-name` (UTF-8, omitted when absent)
//! - descriptor: `x-enc-cipher` holding a JSON array with a single object
//!   keyed by the encrypted attribute, e.g.
//!   `[{"payload":{"cipherVersion":3,"cipherVersionString":"3","cipherName":"value"}}]`,
//!   where `cipherName` is the key attribute name. The IV still travels in
//!   `x-enc-iv`.
//!
//! Only the discrete layout is written. Both are read, discrete first.

use std::collections::HashMap;

use serde::Deserialize;

use crate::envelope::Envelope;
use crate::error::CryptoError;

pub const HEADER_IV: &str = "x-enc-iv";
pub const HEADER_KEY_VERSION: &str = "x-enc-key-version";
pub const HEADER_KEY_NAME: &str = "x-enc-key-name";
pub const HEADER_CIPHER_DESCRIPTOR: &str = "x-enc-cipher";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CipherDescriptor {
    cipher_version: Option<u32>,
    cipher_version_string: Option<String>,
    cipher_name: Option<String>,
}

/// Headers to attach for an envelope. Empty when the envelope is plaintext.
pub fn envelope_headers(envelope: &Envelope) -> Vec<(&'static str, Vec<u8>)> {
    let Some(iv) = envelope.iv().filter(|_| envelope.is_encrypted()) else {
        return Vec::new();
    };
    let mut headers = vec![
        (HEADER_IV, iv.to_vec()),
        (
            HEADER_KEY_VERSION,
            envelope.key_version().to_string().into_bytes(),
        ),
    ];
    if let Some(name) = envelope.key_attribute_name() {
        headers.push((HEADER_KEY_NAME, name.as_bytes().to_vec()));
    }
    headers
}

/// Rebuild an envelope from a payload and the message headers.
///
/// Messages without crypto headers yield plaintext envelopes. Unrelated
/// headers are ignored.
pub fn envelope_from_headers<'a, I>(payload: Vec<u8>, headers: I) -> Result<Envelope, CryptoError>
where
    I: IntoIterator<Item = (&'a str, &'a [u8])>,
{
    let mut iv = None;
    let mut version = None;
    let mut key_name = None;
    let mut descriptor = None;

    for (name, value) in headers {
        match name {
            HEADER_IV => iv = Some(value.to_vec()),
            HEADER_KEY_VERSION => version = Some(parse_version(value)?),
            HEADER_KEY_NAME => key_name = Some(utf8(value, HEADER_KEY_NAME)?),
            HEADER_CIPHER_DESCRIPTOR => descriptor = Some(value),
            _ => {}
        }
    }

    let (version, key_name) = match (version, descriptor) {
        (Some(v), _) => (v, key_name),
        (None, Some(raw)) => {
            let (v, name) = parse_descriptor(raw)?;
            (v, key_name.or(name))
        }
        (None, None) => {
            if iv.is_some() {
                return Err(CryptoError::MalformedHeaders(format!(
                    "{} present without a key version",
                    HEADER_IV
                )));
            }
            return Ok(Envelope::plaintext(payload));
        }
    };

    if iv.is_none() {
        return Err(CryptoError::MalformedHeaders(format!(
            "key version {} present without {}",
            version, HEADER_IV
        )));
    }

    Ok(Envelope::new(payload, iv, version, key_name))
}

fn utf8(value: &[u8], header: &str) -> Result<String, CryptoError> {
    String::from_utf8(value.to_vec())
        .map_err(|_| CryptoError::MalformedHeaders(format!("{} is not UTF-8", header)))
}

fn parse_version(value: &[u8]) -> Result<u32, CryptoError> {
    let text = utf8(value, HEADER_KEY_VERSION)?;
    text.trim().parse().map_err(|_| {
        CryptoError::MalformedHeaders(format!("invalid {} \"{}\"", HEADER_KEY_VERSION, text))
    })
}

fn parse_descriptor(raw: &[u8]) -> Result<(u32, Option<String>), CryptoError> {
    let entries: Vec<HashMap<String, CipherDescriptor>> = serde_json::from_slice(raw)
        .map_err(|e| CryptoError::MalformedHeaders(format!("{}: {}", HEADER_CIPHER_DESCRIPTOR, e)))?;

    let [entry] = entries.as_slice() else {
        return Err(CryptoError::MalformedHeaders(format!(
            "{} must hold exactly one descriptor, got {}",
            HEADER_CIPHER_DESCRIPTOR,
            entries.len()
        )));
    };
    let mut descriptors = entry.values();
    let (Some(descriptor), None) = (descriptors.next(), descriptors.next()) else {
        return Err(CryptoError::MalformedHeaders(format!(
            "{} descriptor must be keyed by a single attribute",
            HEADER_CIPHER_DESCRIPTOR
        )));
    };

    let version = match (descriptor.cipher_version, &descriptor.cipher_version_string) {
        (Some(v), _) => v,
        (None, Some(s)) => s.trim().parse().map_err(|_| {
            CryptoError::MalformedHeaders(format!("invalid cipherVersionString \"{}\"", s))
        })?,
        (None, None) => {
            return Err(CryptoError::MalformedHeaders(
                "descriptor has no cipher version".into(),
            ))
        }
    };

    Ok((version, descriptor.cipher_name.clone()))
}
