//! The uniform persistence adapter contract.

use async_trait::async_trait;

use crate::entry::CachedEntry;
use crate::error::StoreResult;

/// Uniform contract implemented by every storage backend (memory, file,
/// url-param, remote) and by the fallback chain composing them.
///
/// Within one adapter instance, operations on the same key issued by the
/// same caller sequence complete in issuance order. Operations on different
/// keys or from concurrent callers carry no mutual ordering guarantee.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Short backend name used in error reports and logs.
    fn name(&self) -> &str;

    /// Fetches the entry for `key`, or `None` when absent or expired.
    async fn get(&self, key: &str) -> StoreResult<Option<CachedEntry>>;

    /// Persists `entry` under `key`. A `ttl_override` replaces the entry's
    /// own `ttl_seconds` before storage.
    async fn set(&self, key: &str, entry: CachedEntry, ttl_override: Option<u64>)
        -> StoreResult<()>;

    /// Removes the entry for `key` if present.
    async fn delete(&self, key: &str) -> StoreResult<()>;

    /// Removes every entry.
    async fn clear(&self) -> StoreResult<()>;

    /// Lists currently stored keys.
    async fn keys(&self) -> StoreResult<Vec<String>>;

    /// Releases backend resources and cancels background maintenance.
    /// Idempotent and safe to call on a never-used adapter; afterwards all
    /// other methods become deterministic no-ops.
    async fn close(&self) -> StoreResult<()>;
}

/// Applies a TTL override to an entry before storage.
pub(crate) fn apply_ttl_override(mut entry: CachedEntry, ttl_override: Option<u64>) -> CachedEntry {
    if let Some(ttl) = ttl_override {
        entry.ttl_seconds = Some(ttl);
    }
    entry
}
