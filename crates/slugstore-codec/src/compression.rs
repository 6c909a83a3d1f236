//! LZ4 and Zstd compression/decompression for the slug encode pipeline

use crate::error::{SlugError, SlugResult};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Compression algorithm selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum CompressionAlgorithm {
    /// No compression (passthrough)
    None,
    /// LZ4 block format — lightweight default, available everywhere
    #[default]
    Lz4,
    /// Zstandard — higher ratio, selected for large payloads
    Zstd,
}

impl CompressionAlgorithm {
    /// Single-character algorithm id recorded in the slug flags segment.
    pub fn id(&self) -> char {
        match self {
            CompressionAlgorithm::None => 'n',
            CompressionAlgorithm::Lz4 => 'l',
            CompressionAlgorithm::Zstd => 'z',
        }
    }

    /// Resolves an algorithm id back to the algorithm.
    /// Unknown ids fail rather than silently returning garbage downstream.
    pub fn from_id(id: char) -> SlugResult<Self> {
        match id {
            'n' => Ok(CompressionAlgorithm::None),
            'l' => Ok(CompressionAlgorithm::Lz4),
            'z' => Ok(CompressionAlgorithm::Zstd),
            other => Err(SlugError::UnsupportedAlgorithm(other)),
        }
    }
}

/// Configuration for compression selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressionConfig {
    /// Payloads at or above this size use Zstd instead of LZ4.
    pub zstd_min_bytes: usize,
    /// Zstd compression level (1=fastest, 19=best ratio, 3=balanced default)
    pub zstd_level: i32,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            zstd_min_bytes: 16 * 1024,
            zstd_level: 3,
        }
    }
}

/// Compress data with the given algorithm. Returns compressed bytes.
pub fn compress(data: &[u8], algo: CompressionAlgorithm, level: i32) -> SlugResult<Vec<u8>> {
    match algo {
        CompressionAlgorithm::None => Ok(data.to_vec()),
        CompressionAlgorithm::Lz4 => Ok(lz4_flex::compress_prepend_size(data)),
        CompressionAlgorithm::Zstd => zstd::encode_all(data, level)
            .map_err(|e| SlugError::CompressionFailed(e.to_string())),
    }
}

/// Decompress data using the algorithm recorded at compress time.
pub fn decompress(data: &[u8], algo: CompressionAlgorithm) -> SlugResult<Vec<u8>> {
    match algo {
        CompressionAlgorithm::None => Ok(data.to_vec()),
        CompressionAlgorithm::Lz4 => lz4_flex::decompress_size_prepended(data)
            .map_err(|e| SlugError::CorruptPayload(e.to_string())),
        CompressionAlgorithm::Zstd => {
            zstd::decode_all(data).map_err(|e| SlugError::CorruptPayload(e.to_string()))
        }
    }
}

/// Compress with size-based algorithm selection and a never-expand guarantee.
///
/// Picks Zstd for payloads at or above `zstd_min_bytes`, LZ4 otherwise, then
/// compares output size against the input: if compression did not shrink the
/// payload, the uncompressed bytes are kept and `None` is recorded so decode
/// still knows what happened.
pub fn compress_auto(data: &[u8], config: &CompressionConfig) -> SlugResult<(Vec<u8>, CompressionAlgorithm)> {
    if !is_compressible(data) {
        return Ok((data.to_vec(), CompressionAlgorithm::None));
    }

    let algo = if data.len() >= config.zstd_min_bytes {
        CompressionAlgorithm::Zstd
    } else {
        CompressionAlgorithm::Lz4
    };

    let compressed = compress(data, algo, config.zstd_level)?;
    if compressed.len() >= data.len() {
        debug!(
            original = data.len(),
            compressed = compressed.len(),
            "compression did not shrink payload, storing raw"
        );
        return Ok((data.to_vec(), CompressionAlgorithm::None));
    }
    Ok((compressed, algo))
}

/// Check whether compressing data is worthwhile.
/// Returns false if data appears to be already compressed or random (high entropy).
pub fn is_compressible(data: &[u8]) -> bool {
    if data.len() < 64 {
        return true;
    }
    let sample = &data[..data.len().min(1024)];
    let compressed = lz4_flex::compress_prepend_size(sample);
    (compressed.len() as f64) < (sample.len() as f64 * 0.95)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn prop_lz4_roundtrip(data in prop::collection::vec(0u8..=255, 0..100_000)) {
            let c = compress(&data, CompressionAlgorithm::Lz4, 3).unwrap();
            let d = decompress(&c, CompressionAlgorithm::Lz4).unwrap();
            prop_assert_eq!(d, data);
        }
        #[test]
        fn prop_zstd_roundtrip(data in prop::collection::vec(0u8..=255, 0..100_000)) {
            let c = compress(&data, CompressionAlgorithm::Zstd, 3).unwrap();
            let d = decompress(&c, CompressionAlgorithm::Zstd).unwrap();
            prop_assert_eq!(d, data);
        }
        #[test]
        fn prop_auto_roundtrip(data in prop::collection::vec(0u8..=255, 0..50_000)) {
            let (c, algo) = compress_auto(&data, &CompressionConfig::default()).unwrap();
            let d = decompress(&c, algo).unwrap();
            prop_assert_eq!(d, data);
        }
        #[test]
        fn prop_auto_never_expands(data in prop::collection::vec(0u8..=255, 0..50_000)) {
            let (c, _) = compress_auto(&data, &CompressionConfig::default()).unwrap();
            prop_assert!(c.len() <= data.len());
        }
    }

    #[test]
    fn empty_roundtrips() {
        for algo in [
            CompressionAlgorithm::None,
            CompressionAlgorithm::Lz4,
            CompressionAlgorithm::Zstd,
        ] {
            let c = compress(&[], algo, 3).unwrap();
            let d = decompress(&c, algo).unwrap();
            assert_eq!(d, b"");
        }
    }

    #[test]
    fn auto_selects_zstd_for_large_payloads() {
        let config = CompressionConfig {
            zstd_min_bytes: 1024,
            zstd_level: 3,
        };
        let data = b"repetitive text content ".repeat(100);
        let (_, algo) = compress_auto(&data, &config).unwrap();
        assert_eq!(algo, CompressionAlgorithm::Zstd);
    }

    #[test]
    fn auto_selects_lz4_for_small_payloads() {
        let data = b"small but still compressible compressible compressible".to_vec();
        let (_, algo) = compress_auto(&data, &CompressionConfig::default()).unwrap();
        assert_eq!(algo, CompressionAlgorithm::Lz4);
    }

    #[test]
    fn auto_falls_back_to_none_for_random_bytes() {
        // High-entropy input: LZ4 output would be larger than the raw bytes.
        let data: Vec<u8> = (0..4096u32)
            .map(|i| (i.wrapping_mul(2654435761) >> 13) as u8)
            .collect();
        let (c, algo) = compress_auto(&data, &CompressionConfig::default()).unwrap();
        assert_eq!(algo, CompressionAlgorithm::None);
        assert_eq!(c, data);
    }

    #[test]
    fn unknown_algorithm_id_rejected() {
        assert!(matches!(
            CompressionAlgorithm::from_id('q'),
            Err(SlugError::UnsupportedAlgorithm('q'))
        ));
    }

    #[test]
    fn algorithm_id_roundtrip() {
        for algo in [
            CompressionAlgorithm::None,
            CompressionAlgorithm::Lz4,
            CompressionAlgorithm::Zstd,
        ] {
            assert_eq!(CompressionAlgorithm::from_id(algo.id()).unwrap(), algo);
        }
    }

    #[test]
    fn corrupt_lz4_payload_rejected() {
        let result = decompress(&[0xff, 0xff, 0xff, 0xff, 0x00], CompressionAlgorithm::Lz4);
        assert!(matches!(result, Err(SlugError::CorruptPayload(_))));
    }
}
