//! In-process memory adapter with FIFO eviction and TTL sweeps.
//!
//! Expired entries are dropped both lazily on `get` and actively by a
//! periodic sweep task; either mechanism alone guarantees no caller ever
//! observes a TTL-violating entry. On overflow the single oldest entry by
//! creation timestamp is evicted (strict FIFO, not LRU).

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::debug;

use crate::entry::{now_ms, CachedEntry};
use crate::error::StoreResult;
use crate::store::{apply_ttl_override, StateStore};

const BACKEND_NAME: &str = "memory";

/// Configuration for the memory adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryStoreConfig {
    /// Maximum number of entries held before FIFO eviction kicks in.
    pub max_entries: usize,
    /// Interval between background expiry sweeps.
    pub sweep_interval: Duration,
}

impl Default for MemoryStoreConfig {
    fn default() -> Self {
        Self {
            max_entries: 1024,
            sweep_interval: Duration::from_secs(30),
        }
    }
}

/// Counters for memory adapter activity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryStats {
    /// `get` calls that found a live entry.
    pub hits: u64,
    /// `get` calls that found nothing usable.
    pub misses: u64,
    /// Entries written.
    pub inserts: u64,
    /// Entries evicted by the FIFO capacity policy.
    pub evictions: u64,
    /// Entries dropped because their TTL elapsed.
    pub expirations: u64,
    /// Background sweep cycles completed.
    pub sweep_cycles: u64,
}

/// In-process map-backed [`StateStore`].
///
/// Must be constructed inside a Tokio runtime; construction spawns the
/// background sweep task, which `close()` cancels.
pub struct MemoryStore {
    config: MemoryStoreConfig,
    entries: Arc<RwLock<HashMap<String, CachedEntry>>>,
    stats: Arc<Mutex<MemoryStats>>,
    closed: Arc<AtomicBool>,
    shutdown: watch::Sender<bool>,
}

impl MemoryStore {
    /// Creates the adapter and starts its periodic expiry sweep.
    pub fn new(config: MemoryStoreConfig) -> Self {
        let entries: Arc<RwLock<HashMap<String, CachedEntry>>> = Arc::default();
        let stats: Arc<Mutex<MemoryStats>> = Arc::default();
        let closed = Arc::new(AtomicBool::new(false));
        let (shutdown, mut shutdown_rx) = watch::channel(false);

        let sweep_entries = Arc::clone(&entries);
        let sweep_stats = Arc::clone(&stats);
        let interval = config.sweep_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await; // first tick completes immediately
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let now = now_ms();
                        let mut map = sweep_entries.write();
                        let before = map.len();
                        map.retain(|_, entry| !entry.is_expired(now));
                        let dropped = (before - map.len()) as u64;
                        drop(map);
                        let mut stats = sweep_stats.lock();
                        stats.expirations += dropped;
                        stats.sweep_cycles += 1;
                        if dropped > 0 {
                            debug!(dropped, "memory sweep removed expired entries");
                        }
                    }
                    _ = shutdown_rx.changed() => break,
                }
            }
        });

        Self {
            config,
            entries,
            stats,
            closed,
            shutdown,
        }
    }

    /// Snapshot of the adapter's counters.
    pub fn stats(&self) -> MemoryStats {
        self.stats.lock().clone()
    }

    /// Current number of stored entries (including not-yet-swept expired ones).
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether no entries are stored.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    fn evict_oldest(&self, map: &mut HashMap<String, CachedEntry>) {
        if let Some(oldest) = map
            .iter()
            .min_by_key(|(_, entry)| entry.timestamp_ms)
            .map(|(key, _)| key.clone())
        {
            debug!(key = %oldest, "evicting oldest entry (FIFO capacity policy)");
            map.remove(&oldest);
            self.stats.lock().evictions += 1;
        }
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    fn name(&self) -> &str {
        BACKEND_NAME
    }

    async fn get(&self, key: &str) -> StoreResult<Option<CachedEntry>> {
        if self.closed.load(Ordering::SeqCst) {
            return Ok(None);
        }
        let now = now_ms();
        let mut map = self.entries.write();
        match map.get(key) {
            Some(entry) if entry.is_expired(now) => {
                // Lazy expiry: drop it now rather than waiting for the sweep.
                map.remove(key);
                drop(map);
                let mut stats = self.stats.lock();
                stats.expirations += 1;
                stats.misses += 1;
                Ok(None)
            }
            Some(entry) => {
                let entry = entry.clone();
                drop(map);
                self.stats.lock().hits += 1;
                Ok(Some(entry))
            }
            None => {
                drop(map);
                self.stats.lock().misses += 1;
                Ok(None)
            }
        }
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
        let mut map = self.entries.write();
        if !map.contains_key(key) && map.len() >= self.config.max_entries {
            self.evict_oldest(&mut map);
        }
        map.insert(key.to_string(), entry);
        drop(map);
        self.stats.lock().inserts += 1;
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Ok(());
        }
        self.entries.write().remove(key);
        Ok(())
    }

    async fn clear(&self) -> StoreResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Ok(());
        }
        self.entries.write().clear();
        Ok(())
    }

    async fn keys(&self) -> StoreResult<Vec<String>> {
        if self.closed.load(Ordering::SeqCst) {
            return Ok(Vec::new());
        }
        let now = now_ms();
        Ok(self
            .entries
            .read()
            .iter()
            .filter(|(_, entry)| !entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect())
    }

    async fn close(&self) -> StoreResult<()> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            let _ = self.shutdown.send(true);
            debug!("memory adapter closed");
        }
        Ok(())
    }
}
