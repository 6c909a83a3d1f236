//! Remote key-value adapter: compile-time backend registry plus a client seam.
//!
//! Backend kinds are a closed enum, so asking for an unwired backend fails
//! fast with `NotImplemented` instead of silently no-opping. Production
//! deployments inject a concrete [`RemoteKv`] client; tests use
//! [`MockRemoteKv`].

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;

use crate::entry::{now_ms, CachedEntry};
use crate::error::{StoreError, StoreResult};
use crate::store::{apply_ttl_override, StateStore};

/// Remote backends the build knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteBackendKind {
    /// A Redis-protocol server.
    Redis,
    /// A hosted HTTP key-value service.
    HostedKv,
}

impl RemoteBackendKind {
    /// Short backend name used in error reports and logs.
    pub fn name(&self) -> &'static str {
        match self {
            RemoteBackendKind::Redis => "redis",
            RemoteBackendKind::HostedKv => "hosted-kv",
        }
    }
}

impl fmt::Display for RemoteBackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Minimal byte-oriented client contract a concrete remote backend provides.
#[async_trait]
pub trait RemoteKv: Send + Sync {
    /// Fetches raw bytes for `key`, or `None` when absent.
    async fn fetch(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;
    /// Stores raw bytes under `key`, with an optional server-side TTL.
    async fn put(&self, key: &str, value: Vec<u8>, ttl_seconds: Option<u64>) -> StoreResult<()>;
    /// Removes `key` if present.
    async fn remove(&self, key: &str) -> StoreResult<()>;
    /// Lists stored keys.
    async fn list(&self) -> StoreResult<Vec<String>>;
}

/// [`StateStore`] over a remote key-value service.
///
/// Entries are shipped as JSON documents; the entry's TTL is forwarded to the
/// backend so the server can expire independently, while `get` still applies
/// the local expiry check for backends without native TTL.
pub struct RemoteStore {
    kind: RemoteBackendKind,
    client: Option<Arc<dyn RemoteKv>>,
    closed: AtomicBool,
}

impl RemoteStore {
    /// A registered-but-unwired backend. Every operation fails fast with
    /// [`StoreError::NotImplemented`].
    pub fn stub(kind: RemoteBackendKind) -> Self {
        Self {
            kind,
            client: None,
            closed: AtomicBool::new(false),
        }
    }

    /// A backend wired to a concrete client.
    pub fn with_client(kind: RemoteBackendKind, client: Arc<dyn RemoteKv>) -> Self {
        Self {
            kind,
            client: Some(client),
            closed: AtomicBool::new(false),
        }
    }

    fn client(&self) -> StoreResult<&Arc<dyn RemoteKv>> {
        self.client.as_ref().ok_or_else(|| StoreError::NotImplemented {
            backend: self.kind.name().to_string(),
        })
    }
}

#[async_trait]
impl StateStore for RemoteStore {
    fn name(&self) -> &str {
        self.kind.name()
    }

    async fn get(&self, key: &str) -> StoreResult<Option<CachedEntry>> {
        if self.closed.load(Ordering::SeqCst) {
            return Ok(None);
        }
        let client = self.client()?;
        let Some(bytes) = client.fetch(key).await? else {
            return Ok(None);
        };
        let entry: CachedEntry =
            serde_json::from_slice(&bytes).map_err(|e| StoreError::InvalidEntry {
                key: key.to_string(),
                reason: e.to_string(),
            })?;
        if entry.is_expired(now_ms()) {
            client.remove(key).await?;
            return Ok(None);
        }
        Ok(Some(entry))
    }

    async fn set(
        &self,
        key: &str,
        entry: CachedEntry,
        ttl_override: Option<u64>,
    ) -> StoreResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Ok(());
        }
        let entry = apply_ttl_override(entry, ttl_override);
        let bytes = serde_json::to_vec(&entry)
            .map_err(|e| StoreError::adapter(self.kind.name(), e))?;
        self.client()?.put(key, bytes, entry.ttl_seconds).await
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Ok(());
        }
        self.client()?.remove(key).await
    }

    async fn clear(&self) -> StoreResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Ok(());
        }
        let client = self.client()?;
        for key in client.list().await? {
            client.remove(&key).await?;
        }
        Ok(())
    }

    async fn keys(&self) -> StoreResult<Vec<String>> {
        if self.closed.load(Ordering::SeqCst) {
            return Ok(Vec::new());
        }
        self.client()?.list().await
    }

    async fn close(&self) -> StoreResult<()> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            debug!(backend = %self.kind, "remote adapter closed");
        }
        Ok(())
    }
}

/// In-memory [`RemoteKv`] used in tests and local development.
#[derive(Default)]
pub struct MockRemoteKv {
    data: RwLock<HashMap<String, Vec<u8>>>,
    fail_ops: AtomicBool,
}

impl MockRemoteKv {
    /// An empty mock backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// When set, every operation returns an adapter error. Used to exercise
    /// fallback behavior.
    pub fn set_failing(&self, failing: bool) {
        self.fail_ops.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> StoreResult<()> {
        if self.fail_ops.load(Ordering::SeqCst) {
            Err(StoreError::adapter("mock-remote", "injected failure"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RemoteKv for MockRemoteKv {
    async fn fetch(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        self.check()?;
        Ok(self.data.read().get(key).cloned())
    }

    async fn put(&self, key: &str, value: Vec<u8>, _ttl_seconds: Option<u64>) -> StoreResult<()> {
        self.check()?;
        self.data.write().insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> StoreResult<()> {
        self.check()?;
        self.data.write().remove(key);
        Ok(())
    }

    async fn list(&self) -> StoreResult<Vec<String>> {
        self.check()?;
        let mut keys: Vec<String> = self.data.read().keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn stub_fails_fast_with_not_implemented() {
        let store = RemoteStore::stub(RemoteBackendKind::Redis);
        let err = store.get("k").await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::NotImplemented { ref backend } if backend == "redis"
        ));

        let err = store
            .set("k", CachedEntry::new(json!(1)), None)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotImplemented { .. }));
        assert!(matches!(
            store.keys().await.unwrap_err(),
            StoreError::NotImplemented { .. }
        ));
    }

    #[tokio::test]
    async fn stub_close_still_succeeds() {
        let store = RemoteStore::stub(RemoteBackendKind::HostedKv);
        store.close().await.unwrap();
        // After close every method is a no-op, even on a stub.
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn mock_backed_roundtrip() {
        let store = RemoteStore::with_client(
            RemoteBackendKind::HostedKv,
            Arc::new(MockRemoteKv::new()),
        );
        let entry = CachedEntry::new(json!({"n": 7}));
        store.set("k", entry.clone(), None).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(entry));
        assert_eq!(store.keys().await.unwrap(), vec!["k".to_string()]);

        store.delete("k").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn expired_entry_is_dropped_on_get() {
        let store = RemoteStore::with_client(
            RemoteBackendKind::HostedKv,
            Arc::new(MockRemoteKv::new()),
        );
        let mut entry = CachedEntry::with_ttl(json!(1), 1);
        entry.timestamp_ms = now_ms() - 5_000;
        store.set("old", entry, None).await.unwrap();

        assert_eq!(store.get("old").await.unwrap(), None);
        assert!(store.keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn clear_removes_all_keys() {
        let store = RemoteStore::with_client(
            RemoteBackendKind::Redis,
            Arc::new(MockRemoteKv::new()),
        );
        store.set("a", CachedEntry::new(json!(1)), None).await.unwrap();
        store.set("b", CachedEntry::new(json!(2)), None).await.unwrap();
        store.clear().await.unwrap();
        assert!(store.keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn injected_failure_surfaces_adapter_error() {
        let mock = Arc::new(MockRemoteKv::new());
        let store = RemoteStore::with_client(RemoteBackendKind::Redis, Arc::clone(&mock) as _);
        mock.set_failing(true);
        assert!(matches!(
            store.get("k").await.unwrap_err(),
            StoreError::Adapter { .. }
        ));
    }

    #[test]
    fn backend_kinds_display_stable_names() {
        assert_eq!(RemoteBackendKind::Redis.to_string(), "redis");
        assert_eq!(RemoteBackendKind::HostedKv.to_string(), "hosted-kv");
    }
}
