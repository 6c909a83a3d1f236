//! Slug encode/decode pipeline: serialize → compress → encrypt → assemble,
//! and the strict inverse (parse → decrypt → decompress → deserialize).

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::classifier::{classify, ClassifierConfig};
use crate::compression::{compress_auto, decompress, CompressionAlgorithm, CompressionConfig};
use crate::encryption::{derive_password_key, open, seal, EncryptionAlgorithm, EncryptionKey};
use crate::error::{SlugError, SlugResult};
use crate::options::{DecodeOptions, EncodeOptions, ResolvedOptions};
use crate::secret::SecretProvider;
use crate::slug::{assemble, parse, SlugFlags};

/// Statistics from a single encode
#[derive(Debug, Default, Clone)]
pub struct EncodeStats {
    /// Serialized value size in bytes
    pub input_bytes: usize,
    /// Bytes after the compression stage (equal to input when skipped)
    pub bytes_after_compression: usize,
    /// Bytes after the encryption stage (equal to previous when skipped)
    pub bytes_after_encryption: usize,
    /// Compression ratio (input_bytes / bytes_after_compression)
    pub compression_ratio: f64,
    /// Final slug length in characters
    pub slug_len: usize,
}

/// The slug codec. Stateless apart from configuration and the injected
/// secret provider; owns no I/O resources.
#[derive(Clone)]
pub struct SlugCodec {
    compression: CompressionConfig,
    cipher: EncryptionAlgorithm,
    classifier: ClassifierConfig,
    secrets: Option<Arc<dyn SecretProvider>>,
}

impl Default for SlugCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl SlugCodec {
    /// Creates a codec with default compression/cipher settings and no
    /// secret provider (encrypted slugs then require a per-call password).
    pub fn new() -> Self {
        Self {
            compression: CompressionConfig::default(),
            cipher: EncryptionAlgorithm::default(),
            classifier: ClassifierConfig::default(),
            secrets: None,
        }
    }

    /// Installs a secret provider consulted when no per-call password is given.
    pub fn with_secret_provider(mut self, provider: Arc<dyn SecretProvider>) -> Self {
        self.secrets = Some(provider);
        self
    }

    /// Overrides the AEAD cipher used for newly encoded slugs.
    pub fn with_cipher(mut self, cipher: EncryptionAlgorithm) -> Self {
        self.cipher = cipher;
        self
    }

    /// Overrides compression selection parameters.
    pub fn with_compression(mut self, config: CompressionConfig) -> Self {
        self.compression = config;
        self
    }

    /// Overrides classifier parameters used when `auto_config` is requested.
    pub fn with_classifier(mut self, config: ClassifierConfig) -> Self {
        self.classifier = config;
        self
    }

    /// Resolves the effective options for a value, running the classifier
    /// when the caller asked for auto-config.
    pub fn resolve_options(
        &self,
        value: &Value,
        options: &EncodeOptions,
    ) -> SlugResult<ResolvedOptions> {
        let classification = if options.auto_config {
            Some(classify(value, &self.classifier)?)
        } else {
            None
        };
        Ok(options.resolve(classification.as_ref()))
    }

    /// Encodes a value into a slug string.
    pub fn encode(&self, value: &Value, options: &EncodeOptions) -> SlugResult<String> {
        self.encode_with_stats(value, options).map(|(slug, _)| slug)
    }

    /// Encodes a value, additionally reporting per-stage byte counts.
    pub fn encode_with_stats(
        &self,
        value: &Value,
        options: &EncodeOptions,
    ) -> SlugResult<(String, EncodeStats)> {
        let serialized =
            serde_json::to_vec(value).map_err(|e| SlugError::SerializeFailed(e.to_string()))?;
        let resolved = self.resolve_options(value, options)?;

        let mut stats = EncodeStats {
            input_bytes: serialized.len(),
            ..Default::default()
        };

        let (payload, algo) = if resolved.compress {
            compress_auto(&serialized, &self.compression)?
        } else {
            (serialized, CompressionAlgorithm::None)
        };
        stats.bytes_after_compression = payload.len();

        let (payload, encrypted) = if resolved.encrypt {
            let key = self
                .effective_key(options.password.as_deref())
                .ok_or(SlugError::MissingCredential)?;
            let sealed = seal(&payload, &key, self.cipher)?;
            (sealed, true)
        } else {
            (payload, false)
        };
        stats.bytes_after_encryption = payload.len();

        stats.compression_ratio = if stats.bytes_after_compression > 0 {
            stats.input_bytes as f64 / stats.bytes_after_compression as f64
        } else {
            1.0
        };

        let slug = assemble(
            SlugFlags {
                compression: algo,
                encrypted,
            },
            &payload,
        );
        stats.slug_len = slug.len();
        debug!(
            input = stats.input_bytes,
            compressed = stats.bytes_after_compression,
            encrypted,
            slug_len = stats.slug_len,
            "value encoded"
        );
        Ok((slug, stats))
    }

    /// Decodes a slug back into a value, applying inverse transforms in
    /// strict reverse order: decrypt before decompress.
    pub fn decode(&self, slug: &str, options: &DecodeOptions) -> SlugResult<Value> {
        let (flags, payload) = parse(slug)?;

        let payload = if flags.encrypted {
            let key = self
                .effective_key(options.password.as_deref())
                .ok_or(SlugError::MissingCredential)?;
            open(&payload, &key)?
        } else {
            payload
        };

        let serialized = decompress(&payload, flags.compression)?;
        serde_json::from_slice(&serialized)
            .map_err(|e| SlugError::CorruptPayload(format!("payload is not valid JSON: {e}")))
    }

    /// Typed encode convenience: serializes `value` through `serde_json`.
    pub fn encode_value<T: Serialize>(
        &self,
        value: &T,
        options: &EncodeOptions,
    ) -> SlugResult<String> {
        let value =
            serde_json::to_value(value).map_err(|e| SlugError::SerializeFailed(e.to_string()))?;
        self.encode(&value, options)
    }

    /// Typed decode convenience.
    pub fn decode_value<T: DeserializeOwned>(
        &self,
        slug: &str,
        options: &DecodeOptions,
    ) -> SlugResult<T> {
        let value = self.decode(slug, options)?;
        serde_json::from_value(value)
            .map_err(|e| SlugError::CorruptPayload(format!("value has unexpected shape: {e}")))
    }

    fn effective_key(&self, password: Option<&str>) -> Option<EncryptionKey> {
        match password {
            Some(password) => Some(derive_password_key(password)),
            None => self.secrets.as_ref().and_then(|p| p.secret()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secret::FixedSecretProvider;
    use proptest::prelude::*;
    use serde_json::json;

    fn codec_with_secret() -> SlugCodec {
        SlugCodec::new()
            .with_secret_provider(Arc::new(FixedSecretProvider::new(EncryptionKey([7u8; 32]))))
    }

    #[test]
    fn plain_roundtrip() {
        let codec = SlugCodec::new();
        let value = json!({"filters": {"status": "open"}, "page": 2});
        let slug = codec.encode(&value, &EncodeOptions::default()).unwrap();
        assert_eq!(codec.decode(&slug, &DecodeOptions::default()).unwrap(), value);
    }

    #[test]
    fn compressed_roundtrip() {
        let codec = SlugCodec::new();
        let value = json!({ "rows": vec!["the same line of text"; 500] });
        let options = EncodeOptions {
            compress: Some(true),
            ..Default::default()
        };
        let slug = codec.encode(&value, &options).unwrap();
        assert_eq!(codec.decode(&slug, &DecodeOptions::default()).unwrap(), value);
    }

    #[test]
    fn encrypted_roundtrip_with_password() {
        let codec = SlugCodec::new();
        let value = json!({"session": "abc"});
        let options = EncodeOptions {
            password: Some("hunter2".to_string()),
            ..Default::default()
        };
        let slug = codec.encode(&value, &options).unwrap();
        let decoded = codec
            .decode(
                &slug,
                &DecodeOptions {
                    password: Some("hunter2".to_string()),
                },
            )
            .unwrap();
        assert_eq!(decoded, value);
    }

    #[test]
    fn encrypted_roundtrip_with_provider() {
        let codec = codec_with_secret();
        let value = json!({"token": "abc"});
        let options = EncodeOptions {
            encrypt: Some(true),
            ..Default::default()
        };
        let slug = codec.encode(&value, &options).unwrap();
        assert_eq!(codec.decode(&slug, &DecodeOptions::default()).unwrap(), value);
    }

    #[test]
    fn decode_needs_no_flags_from_caller() {
        // Compression and encryption state are read from the slug itself.
        let codec = codec_with_secret();
        let value = json!({ "data": vec!["compressible text"; 300] });
        let options = EncodeOptions {
            compress: Some(true),
            encrypt: Some(true),
            ..Default::default()
        };
        let slug = codec.encode(&value, &options).unwrap();
        assert_eq!(codec.decode(&slug, &DecodeOptions::default()).unwrap(), value);
    }

    #[test]
    fn missing_credential_on_encode() {
        let codec = SlugCodec::new();
        let options = EncodeOptions {
            encrypt: Some(true),
            ..Default::default()
        };
        assert!(matches!(
            codec.encode(&json!({"a": 1}), &options),
            Err(SlugError::MissingCredential)
        ));
    }

    #[test]
    fn missing_credential_on_decode() {
        let codec = codec_with_secret();
        let options = EncodeOptions {
            encrypt: Some(true),
            ..Default::default()
        };
        let slug = codec.encode(&json!({"a": 1}), &options).unwrap();

        let keyless = SlugCodec::new();
        assert!(matches!(
            keyless.decode(&slug, &DecodeOptions::default()),
            Err(SlugError::MissingCredential)
        ));
    }

    #[test]
    fn wrong_password_is_decryption_failure() {
        let codec = SlugCodec::new();
        let options = EncodeOptions {
            password: Some("right".to_string()),
            ..Default::default()
        };
        let slug = codec.encode(&json!({"a": 1}), &options).unwrap();
        assert!(matches!(
            codec.decode(
                &slug,
                &DecodeOptions {
                    password: Some("wrong".to_string())
                }
            ),
            Err(SlugError::DecryptionFailed)
        ));
    }

    #[test]
    fn tampered_encrypted_slug_is_decryption_failure() {
        let codec = codec_with_secret();
        let options = EncodeOptions {
            encrypt: Some(true),
            ..Default::default()
        };
        let slug = codec.encode(&json!({"balance": 100}), &options).unwrap();

        // Flip one mid-payload character (staying inside the base64url alphabet).
        let payload_start = slug.rfind('.').unwrap() + 1;
        let mut chars: Vec<char> = slug.chars().collect();
        let target = payload_start + (chars.len() - payload_start) / 2;
        chars[target] = if chars[target] == 'A' { 'B' } else { 'A' };
        let tampered: String = chars.into_iter().collect();

        assert!(matches!(
            codec.decode(&tampered, &DecodeOptions::default()),
            Err(SlugError::DecryptionFailed)
        ));
    }

    #[test]
    fn auto_config_encrypts_sensitive_values() {
        let codec = codec_with_secret();
        let value = json!({"user": "ada", "access_token": "abc"});
        let options = EncodeOptions {
            auto_config: true,
            ..Default::default()
        };
        let slug = codec.encode(&value, &options).unwrap();
        assert_eq!(slug.split('.').nth(1).unwrap().chars().nth(1), Some('1'));
        assert_eq!(codec.decode(&slug, &DecodeOptions::default()).unwrap(), value);
    }

    #[test]
    fn explicit_options_override_auto_config() {
        let codec = SlugCodec::new();
        let value = json!({"password_hint": "pet name"});
        let options = EncodeOptions {
            auto_config: true,
            encrypt: Some(false),
            ..Default::default()
        };
        let slug = codec.encode(&value, &options).unwrap();
        assert_eq!(slug.split('.').nth(1).unwrap().chars().nth(1), Some('0'));
    }

    #[test]
    fn compression_stats_reported() {
        let codec = SlugCodec::new();
        let value = json!({ "rows": vec!["repetitive"; 1000] });
        let options = EncodeOptions {
            compress: Some(true),
            ..Default::default()
        };
        let (_, stats) = codec.encode_with_stats(&value, &options).unwrap();
        assert!(stats.bytes_after_compression < stats.input_bytes);
        assert!(stats.compression_ratio > 1.0);
    }

    #[test]
    fn compressed_slug_not_longer_than_plain() {
        let codec = SlugCodec::new();
        let value = json!({ "rows": vec!["a long repeated line of content"; 200] });
        let plain = codec
            .encode(
                &value,
                &EncodeOptions {
                    compress: Some(false),
                    ..Default::default()
                },
            )
            .unwrap();
        let compressed = codec
            .encode(
                &value,
                &EncodeOptions {
                    compress: Some(true),
                    ..Default::default()
                },
            )
            .unwrap();
        assert!(compressed.len() <= plain.len());
    }

    #[test]
    fn typed_roundtrip() {
        #[derive(serde::Serialize, serde::Deserialize, PartialEq, Debug)]
        struct Filters {
            status: String,
            page: u32,
        }
        let codec = SlugCodec::new();
        let filters = Filters {
            status: "open".to_string(),
            page: 7,
        };
        let slug = codec
            .encode_value(&filters, &EncodeOptions::default())
            .unwrap();
        let decoded: Filters = codec.decode_value(&slug, &DecodeOptions::default()).unwrap();
        assert_eq!(decoded, filters);
    }

    proptest! {
        #[test]
        fn prop_roundtrip_any_json_strings(
            entries in prop::collection::btree_map("[a-z]{1,8}", ".{0,40}", 0..10)
        ) {
            let value = serde_json::to_value(&entries).unwrap();
            let codec = codec_with_secret();
            for options in [
                EncodeOptions::default(),
                EncodeOptions { compress: Some(true), ..Default::default() },
                EncodeOptions { encrypt: Some(true), ..Default::default() },
                EncodeOptions { compress: Some(true), encrypt: Some(true), ..Default::default() },
            ] {
                let slug = codec.encode(&value, &options).unwrap();
                prop_assert_eq!(&codec.decode(&slug, &DecodeOptions::default()).unwrap(), &value);
            }
        }
    }
}
