//! slugstore-store: persistence adapters and their composition.
//!
//! Every backend implements the [`StateStore`] contract over a shared
//! [`CachedEntry`] shape:
//!
//! - [`MemoryStore`] — in-process map, FIFO eviction, TTL sweeps
//! - [`FileStore`] — one JSON document per key, atomic writes
//! - [`UrlParamStore`] — slugs in a URL query string (address-bar storage)
//! - [`RemoteStore`] — remote key-value service behind a client seam
//! - [`FallbackChain`] — ordered composition: first-hit reads, fan-out writes

#![warn(missing_docs)]

pub mod chain;
pub mod entry;
pub mod error;
pub mod file;
pub mod memory;
pub mod remote;
pub mod store;
pub mod url;

pub use chain::{BroadcastReport, FallbackChain};
pub use entry::{now_ms, CachedEntry};
pub use error::{StoreError, StoreResult};
pub use file::{FileStats, FileStore, FileStoreConfig};
pub use memory::{MemoryStats, MemoryStore, MemoryStoreConfig};
pub use remote::{MockRemoteKv, RemoteBackendKind, RemoteKv, RemoteStore};
pub use store::StateStore;
pub use url::UrlParamStore;
