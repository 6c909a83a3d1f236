//! Error types for the slugstore-store subsystem

use slugstore_codec::SlugError;

/// Result type alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Error variants for persistence adapter operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Backend-specific I/O failure, wrapping the underlying cause.
    #[error("Adapter error in {backend}: {reason}")]
    Adapter {
        /// Name of the adapter that failed.
        backend: String,
        /// Description of the underlying cause.
        reason: String,
    },

    /// A stub backend was invoked; it is registered but has no concrete
    /// implementation wired in.
    #[error("Backend not implemented: {backend}")]
    NotImplemented {
        /// Name of the unimplemented backend.
        backend: String,
    },

    /// A codec failure surfaced through a codec-backed adapter.
    #[error(transparent)]
    Codec(#[from] SlugError),

    /// Persisted entry bytes could not be parsed.
    #[error("Invalid stored entry for key {key:?}: {reason}")]
    InvalidEntry {
        /// Key whose stored entry is invalid.
        key: String,
        /// Description of the parse failure.
        reason: String,
    },
}

impl StoreError {
    /// Convenience constructor for adapter failures.
    pub fn adapter(backend: &str, reason: impl std::fmt::Display) -> Self {
        StoreError::Adapter {
            backend: backend.to_string(),
            reason: reason.to_string(),
        }
    }
}
