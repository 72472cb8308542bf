//! Base64 helpers for IVs, ciphertexts and secret-store key material.

use base64ct::{Base64, Base64Unpadded, Base64Url, Base64UrlUnpadded, Encoding};
use zeroize::Zeroizing;

use crate::error::CryptoError;

/// Standard base64 encode with padding.
pub fn base64_encode(data: &[u8]) -> String {
    Base64::encode_string(data)
}

/// Standard base64 decode with padding.
pub fn base64_decode(s: &str) -> Result<Vec<u8>, base64ct::Error> {
    Base64::decode_vec(s)
}

/// Decode key material as stored in the secret store.
///
/// Stores hand back the key as a base64 string that may use the URL-safe
/// alphabet, may drop the `=` padding and may end in CR/LF. Both alphabets
/// are accepted, padded or not.
pub fn decode_key_material(encoded: &str) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    let trimmed = encoded.trim();
    Base64Url::decode_vec(trimmed)
        .or_else(|_| Base64::decode_vec(trimmed))
        .or_else(|_| Base64UrlUnpadded::decode_vec(trimmed))
        .or_else(|_| Base64Unpadded::decode_vec(trimmed))
        .map(Zeroizing::new)
        .map_err(|e| CryptoError::InvalidKeyEncoding(e.to_string()))
}
