//! Fallback/broadcast composition over an ordered set of adapters.
//!
//! Reads walk the adapters in priority order and return the first hit; a
//! failing adapter is logged and skipped, and an error surfaces only when
//! every adapter errored. Writes fan out to every adapter concurrently.
//! The inherent broadcast methods report the outcome per adapter; the
//! [`StateStore`] impl keeps the void-shaped contract for callers that treat
//! the chain as just another adapter.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::entry::CachedEntry;
use crate::error::{StoreError, StoreResult};
use crate::store::StateStore;

const BACKEND_NAME: &str = "chain";

/// Per-adapter outcome of a broadcast operation, in chain order.
#[derive(Debug)]
pub struct BroadcastReport {
    /// `(adapter name, outcome)` for every adapter in the chain.
    pub results: Vec<(String, StoreResult<()>)>,
}

impl BroadcastReport {
    /// Whether every adapter completed the operation.
    pub fn all_ok(&self) -> bool {
        self.results.iter().all(|(_, r)| r.is_ok())
    }

    /// Names of adapters that failed.
    pub fn failed_adapters(&self) -> Vec<&str> {
        self.results
            .iter()
            .filter(|(_, r)| r.is_err())
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// The first error, when at least one adapter failed.
    pub fn first_error(&self) -> Option<&StoreError> {
        self.results.iter().find_map(|(_, r)| r.as_ref().err())
    }

    fn into_result(mut self) -> StoreResult<()> {
        // Best-effort semantics: a partial failure is fine, total failure
        // is not.
        if self.results.is_empty() || self.results.iter().any(|(_, r)| r.is_ok()) {
            return Ok(());
        }
        let (_, first) = self.results.swap_remove(0);
        first
    }
}

/// Ordered adapter composition: first-hit reads, fan-out writes.
pub struct FallbackChain {
    stores: Vec<Arc<dyn StateStore>>,
}

impl FallbackChain {
    /// Builds a chain over `stores`, highest priority first.
    pub fn new(stores: Vec<Arc<dyn StateStore>>) -> Self {
        Self { stores }
    }

    /// The composed adapters, in priority order.
    pub fn stores(&self) -> &[Arc<dyn StateStore>] {
        &self.stores
    }

    async fn broadcast<F>(&self, op: F) -> BroadcastReport
    where
        F: Fn(Arc<dyn StateStore>) -> tokio::task::JoinHandle<StoreResult<()>>,
    {
        let mut tasks = JoinSet::new();
        for (index, store) in self.stores.iter().enumerate() {
            let name = store.name().to_string();
            let handle = op(Arc::clone(store));
            tasks.spawn(async move {
                let result = match handle.await {
                    Ok(result) => result,
                    Err(e) => Err(StoreError::adapter(&name, e)),
                };
                (index, name, result)
            });
        }

        let mut results: Vec<(usize, String, StoreResult<()>)> = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(item) => results.push(item),
                Err(e) => warn!(error = %e, "broadcast task panicked"),
            }
        }
        results.sort_by_key(|(index, _, _)| *index);

        for (_, name, result) in &results {
            if let Err(e) = result {
                warn!(adapter = %name, error = %e, "broadcast operation failed on adapter");
            }
        }
        BroadcastReport {
            results: results
                .into_iter()
                .map(|(_, name, result)| (name, result))
                .collect(),
        }
    }

    /// Fans `set` out to every adapter, reporting per-adapter outcomes.
    pub async fn broadcast_set(
        &self,
        key: &str,
        entry: CachedEntry,
        ttl_override: Option<u64>,
    ) -> BroadcastReport {
        let key = key.to_string();
        self.broadcast(move |store| {
            let key = key.clone();
            let entry = entry.clone();
            tokio::spawn(async move { store.set(&key, entry, ttl_override).await })
        })
        .await
    }

    /// Fans `delete` out to every adapter, reporting per-adapter outcomes.
    pub async fn broadcast_delete(&self, key: &str) -> BroadcastReport {
        let key = key.to_string();
        self.broadcast(move |store| {
            let key = key.clone();
            tokio::spawn(async move { store.delete(&key).await })
        })
        .await
    }

    /// Fans `clear` out to every adapter, reporting per-adapter outcomes.
    pub async fn broadcast_clear(&self) -> BroadcastReport {
        self.broadcast(|store| tokio::spawn(async move { store.clear().await }))
            .await
    }
}

#[async_trait]
impl StateStore for FallbackChain {
    fn name(&self) -> &str {
        BACKEND_NAME
    }

    async fn get(&self, key: &str) -> StoreResult<Option<CachedEntry>> {
        let mut first_error: Option<StoreError> = None;
        let mut all_errored = !self.stores.is_empty();
        for store in &self.stores {
            match store.get(key).await {
                Ok(Some(entry)) => {
                    debug!(adapter = store.name(), key, "fallback chain hit");
                    return Ok(Some(entry));
                }
                Ok(None) => all_errored = false,
                Err(e) => {
                    warn!(adapter = store.name(), key, error = %e, "adapter failed, falling through");
                    first_error.get_or_insert(e);
                }
            }
        }
        match (all_errored, first_error) {
            (true, Some(e)) => Err(e),
            _ => Ok(None),
        }
    }

    async fn set(
        &self,
        key: &str,
        entry: CachedEntry,
        ttl_override: Option<u64>,
    ) -> StoreResult<()> {
        self.broadcast_set(key, entry, ttl_override)
            .await
            .into_result()
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.broadcast_delete(key).await.into_result()
    }

    async fn clear(&self) -> StoreResult<()> {
        self.broadcast_clear().await.into_result()
    }

    async fn keys(&self) -> StoreResult<Vec<String>> {
        let mut union = BTreeSet::new();
        let mut first_error: Option<StoreError> = None;
        let mut all_errored = !self.stores.is_empty();
        for store in &self.stores {
            match store.keys().await {
                Ok(keys) => {
                    all_errored = false;
                    union.extend(keys);
                }
                Err(e) => {
                    warn!(adapter = store.name(), error = %e, "adapter failed listing keys");
                    first_error.get_or_insert(e);
                }
            }
        }
        match (all_errored, first_error) {
            (true, Some(e)) => Err(e),
            _ => Ok(union.into_iter().collect()),
        }
    }

    async fn close(&self) -> StoreResult<()> {
        self.broadcast(|store| tokio::spawn(async move { store.close().await }))
            .await
            .into_result()
    }
}
