//! Encode options and their one-shot resolution.
//!
//! Callers hand the codec an open [`EncodeOptions`] bag; it is resolved
//! exactly once (together with an optional classifier verdict) into a closed
//! [`ResolvedOptions`] consumed everywhere downstream, so storage-target and
//! transform decisions are never re-inferred at call sites.

use serde::{Deserialize, Serialize};

use crate::classifier::ClassificationResult;

/// Where an encoded slug should be persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum StorageTarget {
    /// Address-bar query parameter (small, shareable state).
    #[default]
    Url,
    /// File- or memory-backed storage (large or sensitive state).
    Offline,
    /// Both: the URL for shareability, offline for durability.
    Hybrid,
}

/// Caller-supplied encode preferences. `None` fields defer to the
/// classifier (when enabled) or to conservative defaults.
#[derive(Debug, Clone, Default)]
pub struct EncodeOptions {
    /// Force compression on or off. `None` defers.
    pub compress: Option<bool>,
    /// Force encryption on or off. `None` defers. A supplied password
    /// always implies encryption regardless of this flag.
    pub encrypt: Option<bool>,
    /// Per-call password; when set, a key is derived from it instead of
    /// consulting the codec's secret provider.
    pub password: Option<String>,
    /// Explicit storage target. `None` defers.
    pub storage_target: Option<StorageTarget>,
    /// Run the auto-config classifier over the value before encoding.
    pub auto_config: bool,
}

/// Options needed to decode a slug. Everything else is self-described by
/// the slug's flags.
#[derive(Debug, Clone, Default)]
pub struct DecodeOptions {
    /// Per-call password for encrypted slugs; when absent the codec's
    /// secret provider is consulted.
    pub password: Option<String>,
}

/// The closed, fully-resolved configuration a single encode runs under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResolvedOptions {
    /// Whether to attempt compression.
    pub compress: bool,
    /// Whether to seal the payload.
    pub encrypt: bool,
    /// The single resolved storage target.
    pub storage_target: StorageTarget,
}

impl EncodeOptions {
    /// Resolves this option bag against an optional classifier verdict.
    /// Explicit caller settings always win; the classifier only fills gaps.
    pub fn resolve(&self, classification: Option<&ClassificationResult>) -> ResolvedOptions {
        let compress = self
            .compress
            .unwrap_or_else(|| classification.map(|c| c.use_compression).unwrap_or(false));
        let encrypt = self.password.is_some()
            || self
                .encrypt
                .unwrap_or_else(|| classification.map(|c| c.use_encryption).unwrap_or(false));
        let storage_target = self
            .storage_target
            .or_else(|| classification.map(|c| c.storage_target))
            .unwrap_or_default();
        ResolvedOptions {
            compress,
            encrypt,
            storage_target,
        }
    }
}
