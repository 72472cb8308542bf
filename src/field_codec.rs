//! Encryption of individual string fields inside structured messages.

use std::sync::Arc;

use topicseal_crypto::{decode_field, encode_field, is_encrypted_field, CryptoError};
use topicseal_keys::KeyProvider;

use crate::engine::CryptoEngine;
use crate::error::Result;

/// Turns field values into `encAesV1.<version>.<iv>.<ciphertext>` strings and
/// back. Values of unencrypted topics, and values read without the prefix,
/// pass through unchanged. `None` stays `None` in both directions.
pub struct FieldEnvelopeCodec<P> {
    engine: Arc<CryptoEngine<P>>,
}

impl<P> Clone for FieldEnvelopeCodec<P> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
        }
    }
}

impl<P: KeyProvider> FieldEnvelopeCodec<P> {
    /// Codec over a shared engine.
    pub fn new(engine: Arc<CryptoEngine<P>>) -> Self {
        Self { engine }
    }

    /// Underlying engine.
    pub fn engine(&self) -> &CryptoEngine<P> {
        &self.engine
    }

    /// Encrypt a field value for `topic`.
    pub fn encode_field(&self, topic: &str, value: Option<&str>) -> Result<Option<String>> {
        let Some(value) = value else {
            return Ok(None);
        };
        let envelope = self.engine.encrypt(topic, value.as_bytes())?;
        Ok(Some(encode_field(&envelope)?))
    }

    /// Decrypt a field value read from `topic`.
    pub fn decode_field(&self, topic: &str, value: Option<&str>) -> Result<Option<String>> {
        let Some(value) = value else {
            return Ok(None);
        };
        if !is_encrypted_field(value) {
            return Ok(Some(value.to_string()));
        }
        let envelope = decode_field(value)?;
        let plaintext = self.engine.decrypt(topic, &envelope)?;
        let text = String::from_utf8(plaintext).map_err(|_| {
            CryptoError::MalformedField("decrypted field is not valid UTF-8".into())
        })?;
        Ok(Some(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::options::EngineOptions;
    use topicseal_keys::{KeyError, KeyVersion};

    const KNOWN_KEY: &str = "gZvWT1IN0mM5sK3sK0V2Wfzo9Jmk4tUPt7gxRsuN3LY=";
    const KNOWN_FIELD: &str =
        "encAesV1.3.JPsMcIDBGACHUveT.Y89d2GZR/Dpg8BXlzAkJB9SqazBGwXJ+4PLoCQ==";

    struct OneKey(Option<KeyVersion>);

    impl KeyProvider for OneKey {
        fn retrieve_key_for_encryption(
            &self,
            _topic: &str,
        ) -> std::result::Result<Option<KeyVersion>, KeyError> {
            Ok(self.0.clone())
        }

        fn retrieve_key_for_decryption(
            &self,
            _topic: &str,
            version: u32,
            _key_attribute_name: Option<&str>,
        ) -> std::result::Result<String, KeyError> {
            if version == 3 {
                Ok(KNOWN_KEY.to_string())
            } else {
                Err(KeyError::Store(format!("no version {}", version)))
            }
        }
    }

    fn codec(key: Option<KeyVersion>) -> FieldEnvelopeCodec<OneKey> {
        FieldEnvelopeCodec::new(Arc::new(CryptoEngine::new(
            OneKey(key),
            EngineOptions::default(),
        )))
    }

    fn encrypting() -> FieldEnvelopeCodec<OneKey> {
        codec(Some(KeyVersion::new(3, Some("value".into()), KNOWN_KEY)))
    }

    #[test]
    fn none_stays_none() {
        let c = encrypting();
        assert_eq!(c.encode_field("orders", None).unwrap(), None);
        assert_eq!(c.decode_field("orders", None).unwrap(), None);
    }

    #[test]
    fn round_trip() {
        let c = encrypting();
        let encoded = c.encode_field("orders", Some("Hello World!")).unwrap().unwrap();
        assert!(encoded.starts_with("encAesV1.3."));
        assert_eq!(encoded.split('.').count(), 4);
        assert_eq!(
            c.decode_field("orders", Some(&encoded)).unwrap().as_deref(),
            Some("Hello World!")
        );
    }

    #[test]
    fn decodes_known_vector() {
        let c = codec(None);
        assert_eq!(
            c.decode_field("orders", Some(KNOWN_FIELD)).unwrap().as_deref(),
            Some("Hello World!")
        );
    }

    #[test]
    fn plain_values_pass_through() {
        let c = encrypting();
        assert_eq!(c.decode_field("orders", Some("plain")).unwrap().as_deref(), Some("plain"));
        assert_eq!(
            c.decode_field("orders", Some("encAesV1")).unwrap().as_deref(),
            Some("encAesV1")
        );
        let unencrypted = codec(None);
        assert_eq!(
            unencrypted.encode_field("logs", Some("plain")).unwrap().as_deref(),
            Some("plain")
        );
    }

    #[test]
    fn malformed_fields_are_format_errors() {
        let c = encrypting();
        for bad in [
            "encAesV1.3.JPsMcIDBGACHUveT",
            "encAesV1.x.JPsMcIDBGACHUveT.Y89d2GZR",
            "encAesV1.3.JPsMcIDBGACHUveT.Y89d2GZR.extra",
            "encAesV1.3.!!!.Y89d2GZR/Dpg8BXlzAkJB9SqazBGwXJ+4PLoCQ==",
        ] {
            let err = c.decode_field("orders", Some(bad)).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Format, "{}", bad);
        }
    }

    #[test]
    fn unknown_version_is_store_error() {
        let c = encrypting();
        let err = c
            .decode_field(
                "orders",
                Some("encAesV1.9.JPsMcIDBGACHUveT.Y89d2GZR/Dpg8BXlzAkJB9SqazBGwXJ+4PLoCQ=="),
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Store);
    }
}
