//! Slug token wire format: `<version>.<flags>.<payload>`
//!
//! ASCII and URL-safe throughout. `version` identifies the encode scheme
//! generation, `flags` is a two-character tag (compression algorithm id +
//! encrypted marker), and `payload` is base64url (no padding) of the
//! transformed bytes. The flags make every slug self-describing: decode
//! never needs external context beyond a secret for encrypted slugs.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

use crate::compression::CompressionAlgorithm;
use crate::error::{SlugError, SlugResult};

/// Current slug format version tag.
pub const SLUG_VERSION: &str = "v1";

/// Transform flags recorded in a slug's second segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlugFlags {
    /// Compression algorithm applied to the serialized value.
    pub compression: CompressionAlgorithm,
    /// Whether the (compressed) bytes were sealed with an AEAD cipher.
    pub encrypted: bool,
}

impl SlugFlags {
    /// Renders the two-character flags tag.
    pub fn tag(&self) -> String {
        let enc = if self.encrypted { '1' } else { '0' };
        format!("{}{}", self.compression.id(), enc)
    }

    /// Parses a flags tag back into flags.
    pub fn parse(tag: &str) -> SlugResult<Self> {
        let mut chars = tag.chars();
        let (comp_id, enc_id) = match (chars.next(), chars.next(), chars.next()) {
            (Some(c), Some(e), None) => (c, e),
            _ => {
                return Err(SlugError::CorruptPayload(format!(
                    "malformed flags tag: {tag:?}"
                )))
            }
        };
        let compression = CompressionAlgorithm::from_id(comp_id)?;
        let encrypted = match enc_id {
            '0' => false,
            '1' => true,
            other => {
                return Err(SlugError::CorruptPayload(format!(
                    "malformed encryption flag: {other:?}"
                )))
            }
        };
        Ok(Self {
            compression,
            encrypted,
        })
    }
}

/// Assembles a slug string from flags and transformed payload bytes.
pub fn assemble(flags: SlugFlags, payload: &[u8]) -> String {
    format!(
        "{}.{}.{}",
        SLUG_VERSION,
        flags.tag(),
        URL_SAFE_NO_PAD.encode(payload)
    )
}

/// Splits a slug string into its flags and raw payload bytes.
///
/// The version segment is checked first: an unknown version is
/// `UnsupportedFormat` before any payload inspection happens.
pub fn parse(slug: &str) -> SlugResult<(SlugFlags, Vec<u8>)> {
    let mut segments = slug.splitn(3, '.');
    let version = segments.next().unwrap_or_default();
    if version != SLUG_VERSION {
        return Err(SlugError::UnsupportedFormat(version.to_string()));
    }
    let flags_tag = segments
        .next()
        .ok_or_else(|| SlugError::CorruptPayload("missing flags segment".to_string()))?;
    let payload_b64 = segments
        .next()
        .ok_or_else(|| SlugError::CorruptPayload("missing payload segment".to_string()))?;

    let flags = SlugFlags::parse(flags_tag)?;
    let payload = URL_SAFE_NO_PAD
        .decode(payload_b64)
        .map_err(|e| SlugError::CorruptPayload(format!("payload is not base64url: {e}")))?;
    Ok((flags, payload))
}
