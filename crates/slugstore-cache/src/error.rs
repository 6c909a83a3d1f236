//! Error types for the cache manager.

use slugstore_store::StoreError;

/// Result type alias for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Error variants for cache manager operations.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// The underlying persistence adapter failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The caller-supplied fetcher failed to produce a value.
    #[error("Fetcher failed: {0}")]
    Fetch(String),
}
