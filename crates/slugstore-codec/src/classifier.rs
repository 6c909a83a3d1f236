//! Auto-config classifier: inspects a value before encoding and recommends
//! compression, encryption, and a storage target.
//!
//! The output is advisory only. Explicit caller options always override it
//! (see `EncodeOptions::resolve`), and the classifier never mutates or
//! discards caller-specified settings.

use serde_json::Value;

use crate::error::{SlugError, SlugResult};
use crate::options::StorageTarget;

/// Default payload size above which offline storage and compression are
/// recommended (long tokens degrade URL shareability).
pub const DEFAULT_SIZE_THRESHOLD_BYTES: usize = 1024;

/// Default recursion bound for the sensitive-key scan.
pub const DEFAULT_MAX_SCAN_DEPTH: usize = 8;

/// Configuration for the classifier.
#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    /// Serialized size at or above which offline storage and compression
    /// are recommended.
    pub size_threshold_bytes: usize,
    /// Maximum object/array nesting depth inspected by the key scan.
    pub max_depth: usize,
    /// Lowercase substrings that mark an object key as sensitive.
    pub sensitive_patterns: Vec<String>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            size_threshold_bytes: DEFAULT_SIZE_THRESHOLD_BYTES,
            max_depth: DEFAULT_MAX_SCAN_DEPTH,
            sensitive_patterns: [
                "password", "passwd", "secret", "token", "credential", "apikey", "api_key",
                "auth", "private_key", "ssn",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

/// The classifier's advisory verdict. Derived deterministically from the
/// value and config; recomputed fresh on every encode that asks for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassificationResult {
    /// Recommend compressing the serialized value.
    pub use_compression: bool,
    /// Recommend sealing the payload (a sensitive-looking key was found).
    pub use_encryption: bool,
    /// Recommended storage target.
    pub storage_target: StorageTarget,
}

/// Classifies a candidate value: measures its serialized size and scans its
/// object keys (to a bounded depth) for sensitive-looking names.
pub fn classify(value: &Value, config: &ClassifierConfig) -> SlugResult<ClassificationResult> {
    let serialized_len = serde_json::to_vec(value)
        .map_err(|e| SlugError::SerializeFailed(e.to_string()))?
        .len();

    let large = serialized_len >= config.size_threshold_bytes;
    let sensitive = scan_keys(value, config, 0);

    Ok(ClassificationResult {
        use_compression: large,
        use_encryption: sensitive,
        storage_target: if large {
            StorageTarget::Offline
        } else {
            StorageTarget::Url
        },
    })
}

fn scan_keys(value: &Value, config: &ClassifierConfig, depth: usize) -> bool {
    if depth >= config.max_depth {
        return false;
    }
    match value {
        Value::Object(map) => map.iter().any(|(key, child)| {
            let lowered = key.to_lowercase();
            config
                .sensitive_patterns
                .iter()
                .any(|pattern| lowered.contains(pattern))
                || scan_keys(child, config, depth + 1)
        }),
        Value::Array(items) => items
            .iter()
            .any(|child| scan_keys(child, config, depth + 1)),
        _ => false,
    }
}
