#![warn(missing_docs)]

//! slugstore codec subsystem: value ↔ slug transformation.
//!
//! Encode path: value → serialize (JSON) → compress (LZ4/Zstd, size-gated) → encrypt (AEAD) → base64url slug
//! Read path:   slug → parse flags → decrypt → decompress → deserialize
//!
//! Slugs are self-describing (`<version>.<flags>.<payload>`): decoding needs
//! no context beyond a secret for encrypted slugs. The codec performs no I/O.

pub mod classifier;
pub mod codec;
pub mod compression;
pub mod encryption;
pub mod error;
pub mod options;
pub mod secret;
pub mod slug;

pub use classifier::{classify, ClassificationResult, ClassifierConfig};
pub use codec::{EncodeStats, SlugCodec};
pub use compression::{CompressionAlgorithm, CompressionConfig};
pub use encryption::{derive_password_key, EncryptionAlgorithm, EncryptionKey};
pub use error::{SlugError, SlugResult};
pub use options::{DecodeOptions, EncodeOptions, ResolvedOptions, StorageTarget};
pub use secret::{FixedSecretProvider, NoSecretProvider, SecretProvider};
pub use slug::{SlugFlags, SLUG_VERSION};
