/// AES-GCM IV length in bytes (96 bits per NIST recommendation).
pub const AES_GCM_IV_LENGTH: usize = 12;

/// AES-GCM tag length in bytes (128 bits).
pub const AES_GCM_TAG_LENGTH: usize = 16;

/// AES key length in bytes (256 bits).
pub const AES_KEY_LENGTH: usize = 32;

/// Prefix marking an encrypted field value: `encAesV1.<version>.<iv>.<ciphertext>`.
pub const FIELD_PREFIX: &str = "encAesV1";

/// Number of dot-delimited segments in an encrypted field value.
pub const FIELD_SEGMENTS: usize = 4;
