//! Error types for the slugstore-codec subsystem

/// All errors that can occur while encoding or decoding slugs
#[derive(Debug, thiserror::Error)]
pub enum SlugError {
    /// Value could not be serialized to bytes
    #[error("Serialization failed: {0}")]
    SerializeFailed(String),
    /// Slug carries a format version this build does not understand
    #[error("Unsupported slug format version: {0:?}")]
    UnsupportedFormat(String),
    /// Bytes are structurally invalid after a successful header parse
    #[error("Corrupt slug payload: {0}")]
    CorruptPayload(String),
    /// Slug names a compression algorithm this build cannot decompress
    #[error("Unsupported compression algorithm id: {0:?}")]
    UnsupportedAlgorithm(char),
    /// Slug is encrypted but no secret or password was supplied
    #[error("Missing credential: slug is encrypted but no secret was supplied")]
    MissingCredential,
    /// Authentication tag mismatch — wrong secret or tampered ciphertext
    #[error("Decryption failed: authentication tag mismatch (wrong secret or tampered data)")]
    DecryptionFailed,
    /// Compression operation failed
    #[error("Compression failed: {0}")]
    CompressionFailed(String),
    /// Encryption operation failed (cipher setup, not authentication)
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),
}

/// Result type alias for codec operations.
pub type SlugResult<T> = Result<T, SlugError>;
