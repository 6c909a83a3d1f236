//! The persisted cache entry shape shared by every adapter.

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Milliseconds since the Unix epoch.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// A value persisted by an adapter, with creation time and optional expiry.
///
/// An entry without `ttl_seconds` never expires; one with it is stale once
/// `now - timestamp_ms > ttl_seconds * 1000`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedEntry {
    /// The persisted value.
    pub value: Value,
    /// Creation time in milliseconds since the Unix epoch.
    pub timestamp_ms: u64,
    /// Optional time-to-live in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl_seconds: Option<u64>,
    /// Optional caller-attached metadata.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<BTreeMap<String, Value>>,
}

impl CachedEntry {
    /// Creates a never-expiring entry stamped with the current time.
    pub fn new(value: Value) -> Self {
        Self {
            value,
            timestamp_ms: now_ms(),
            ttl_seconds: None,
            metadata: None,
        }
    }

    /// Creates an entry that expires `ttl_seconds` after creation.
    pub fn with_ttl(value: Value, ttl_seconds: u64) -> Self {
        Self {
            ttl_seconds: Some(ttl_seconds),
            ..Self::new(value)
        }
    }

    /// Attaches metadata to the entry.
    pub fn with_metadata(mut self, metadata: BTreeMap<String, Value>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Age of the entry at `now_ms`, saturating at zero for clock skew.
    pub fn age_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.timestamp_ms)
    }

    /// Whether the entry's TTL has elapsed at `now_ms`. The deadline
    /// saturates, so an absurdly large TTL means "never expires" rather
    /// than wrapping into the past.
    pub fn is_expired(&self, now_ms: u64) -> bool {
        match self.ttl_seconds {
            Some(ttl) => self.age_ms(now_ms) > ttl.saturating_mul(1000),
            None => false,
        }
    }
}
