//! slugstore-cache: the server-side cache layer.
//!
//! [`CacheManager`] wraps any [`slugstore_store::StateStore`] with stable
//! cache-key derivation, TTL staleness, stale-while-revalidate refreshes,
//! and revalidation triggers. Background refresh failures surface on a
//! watch channel and never clobber a still-servable stale entry.

#![warn(missing_docs)]

pub mod error;
pub mod key;
pub mod manager;

pub use error::{CacheError, CacheResult};
pub use key::{canonicalize, derive_cache_key, options_digest};
pub use manager::{
    CacheManager, CacheOptions, CacheOutcome, FetchFuture, Fetcher, RevalidationPolicy,
};
