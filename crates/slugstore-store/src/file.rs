//! Filesystem adapter: one JSON document per key.
//!
//! Writes go through a temp file followed by a rename, so a reader never
//! observes a half-written document. Filenames combine a sanitized key with
//! a short SHA-256 digest, which keeps names readable while ruling out
//! collisions between keys that sanitize identically.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::entry::{now_ms, CachedEntry};
use crate::error::{StoreError, StoreResult};
use crate::store::{apply_ttl_override, StateStore};

const BACKEND_NAME: &str = "file";
const ENTRY_SUFFIX: &str = ".json";
const SANITIZED_KEY_MAX: usize = 64;
const DIGEST_HEX_LEN: usize = 16;

/// Configuration for the file adapter.
#[derive(Debug, Clone)]
pub struct FileStoreConfig {
    /// Directory holding one JSON document per key. Created if missing.
    pub directory: PathBuf,
    /// Maximum number of entry files kept; oldest by modification time are
    /// pruned when exceeded.
    pub max_files: usize,
    /// Interval between background expiry sweeps.
    pub sweep_interval: Duration,
}

impl FileStoreConfig {
    /// Config rooted at `directory` with default limits.
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            max_files: 4096,
            sweep_interval: Duration::from_secs(60),
        }
    }
}

/// Counters for file adapter activity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileStats {
    /// `get` calls that found a live entry.
    pub hits: u64,
    /// `get` calls that found nothing usable.
    pub misses: u64,
    /// Entries written.
    pub writes: u64,
    /// Entry files pruned by the capacity policy.
    pub pruned: u64,
    /// Entry files dropped because their TTL elapsed.
    pub expirations: u64,
}

/// On-disk record: the key travels with the entry so `keys()` can be
/// answered from the documents themselves.
#[derive(Debug, Serialize, Deserialize)]
struct StoredRecord {
    key: String,
    #[serde(flatten)]
    entry: CachedEntry,
}

/// Directory-backed [`StateStore`] persisting entries as JSON documents.
pub struct FileStore {
    config: FileStoreConfig,
    stats: Arc<Mutex<FileStats>>,
    closed: Arc<AtomicBool>,
    write_seq: AtomicU64,
    shutdown: watch::Sender<bool>,
}

impl FileStore {
    /// Creates the directory if needed and starts the expiry sweep.
    pub async fn new(config: FileStoreConfig) -> StoreResult<Self> {
        tokio::fs::create_dir_all(&config.directory)
            .await
            .map_err(|e| StoreError::adapter(BACKEND_NAME, e))?;

        let stats: Arc<Mutex<FileStats>> = Arc::default();
        let closed = Arc::new(AtomicBool::new(false));
        let (shutdown, mut shutdown_rx) = watch::channel(false);

        let sweep_dir = config.directory.clone();
        let sweep_stats = Arc::clone(&stats);
        let interval = config.sweep_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let dropped = sweep_expired(&sweep_dir).await;
                        if dropped > 0 {
                            sweep_stats.lock().expirations += dropped;
                            debug!(dropped, "file sweep removed expired entries");
                        }
                    }
                    _ = shutdown_rx.changed() => break,
                }
            }
        });

        Ok(Self {
            config,
            stats,
            closed,
            write_seq: AtomicU64::new(0),
            shutdown,
        })
    }

    /// Snapshot of the adapter's counters.
    pub fn stats(&self) -> FileStats {
        self.stats.lock().clone()
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.config.directory.join(entry_file_name(key))
    }

    async fn read_record(&self, path: &Path) -> StoreResult<Option<StoredRecord>> {
        match tokio::fs::read(path).await {
            Ok(bytes) => {
                let record: StoredRecord = serde_json::from_slice(&bytes).map_err(|e| {
                    StoreError::InvalidEntry {
                        key: path.display().to_string(),
                        reason: e.to_string(),
                    }
                })?;
                Ok(Some(record))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::adapter(BACKEND_NAME, e)),
        }
    }

    async fn prune_to_capacity(&self) -> StoreResult<()> {
        let mut files = list_entry_files(&self.config.directory).await?;
        if files.len() <= self.config.max_files {
            return Ok(());
        }
        // Oldest by modification time go first.
        let mut with_mtime = Vec::with_capacity(files.len());
        for path in files.drain(..) {
            let mtime = tokio::fs::metadata(&path)
                .await
                .and_then(|m| m.modified())
                .ok();
            with_mtime.push((mtime, path));
        }
        with_mtime.sort_by_key(|(mtime, _)| *mtime);
        let excess = with_mtime.len() - self.config.max_files;
        for (_, path) in with_mtime.into_iter().take(excess) {
            debug!(path = %path.display(), "pruning oldest entry file");
            if let Err(e) = tokio::fs::remove_file(&path).await {
                warn!(path = %path.display(), error = %e, "failed to prune entry file");
            } else {
                self.stats.lock().pruned += 1;
            }
        }
        Ok(())
    }
}

/// Deterministic filename for a key: readable sanitized prefix plus a short
/// digest that disambiguates keys whose sanitized forms collide.
fn entry_file_name(key: &str) -> String {
    let sanitized: String = key
        .chars()
        .take(SANITIZED_KEY_MAX)
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    let digest = Sha256::digest(key.as_bytes());
    let mut hex = String::with_capacity(DIGEST_HEX_LEN);
    for byte in digest.iter().take(DIGEST_HEX_LEN / 2) {
        hex.push_str(&format!("{byte:02x}"));
    }
    format!("{sanitized}-{hex}{ENTRY_SUFFIX}")
}

async fn list_entry_files(directory: &Path) -> StoreResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut dir = tokio::fs::read_dir(directory)
        .await
        .map_err(|e| StoreError::adapter(BACKEND_NAME, e))?;
    while let Some(item) = dir
        .next_entry()
        .await
        .map_err(|e| StoreError::adapter(BACKEND_NAME, e))?
    {
        let path = item.path();
        if path.extension().and_then(|e| e.to_str()) == Some("json") {
            files.push(path);
        }
    }
    Ok(files)
}

async fn sweep_expired(directory: &Path) -> u64 {
    let files = match list_entry_files(directory).await {
        Ok(files) => files,
        Err(e) => {
            warn!(error = %e, "file sweep could not list directory");
            return 0;
        }
    };
    let now = now_ms();
    let mut dropped = 0;
    for path in files {
        let Ok(bytes) = tokio::fs::read(&path).await else {
            continue;
        };
        let Ok(record) = serde_json::from_slice::<StoredRecord>(&bytes) else {
            continue;
        };
        if record.entry.is_expired(now) && tokio::fs::remove_file(&path).await.is_ok() {
            dropped += 1;
        }
    }
    dropped
}

#[async_trait]
impl StateStore for FileStore {
    fn name(&self) -> &str {
        BACKEND_NAME
    }

    async fn get(&self, key: &str) -> StoreResult<Option<CachedEntry>> {
        if self.closed.load(Ordering::SeqCst) {
            return Ok(None);
        }
        let path = self.entry_path(key);
        match self.read_record(&path).await? {
            Some(record) if record.entry.is_expired(now_ms()) => {
                // Lazy expiry mirrors the in-memory adapter.
                let _ = tokio::fs::remove_file(&path).await;
                let mut stats = self.stats.lock();
                stats.expirations += 1;
                stats.misses += 1;
                Ok(None)
            }
            Some(record) => {
                self.stats.lock().hits += 1;
                Ok(Some(record.entry))
            }
            None => {
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
        let record = StoredRecord {
            key: key.to_string(),
            entry: apply_ttl_override(entry, ttl_override),
        };
        let bytes = serde_json::to_vec(&record)
            .map_err(|e| StoreError::adapter(BACKEND_NAME, e))?;

        let path = self.entry_path(key);
        // Unique temp name per write: concurrent writers to the same key
        // must never interleave on a shared temp path, or a half-written
        // document could be renamed into place.
        let seq = self.write_seq.fetch_add(1, Ordering::Relaxed);
        let tmp = path.with_extension(format!("tmp.{}.{seq}", std::process::id()));
        tokio::fs::write(&tmp, &bytes)
            .await
            .map_err(|e| StoreError::adapter(BACKEND_NAME, e))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| StoreError::adapter(BACKEND_NAME, e))?;
        self.stats.lock().writes += 1;

        self.prune_to_capacity().await
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Ok(());
        }
        match tokio::fs::remove_file(self.entry_path(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::adapter(BACKEND_NAME, e)),
        }
    }

    async fn clear(&self) -> StoreResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Ok(());
        }
        for path in list_entry_files(&self.config.directory).await? {
            if let Err(e) = tokio::fs::remove_file(&path).await {
                warn!(path = %path.display(), error = %e, "failed to remove entry file");
            }
        }
        Ok(())
    }

    async fn keys(&self) -> StoreResult<Vec<String>> {
        if self.closed.load(Ordering::SeqCst) {
            return Ok(Vec::new());
        }
        let now = now_ms();
        let mut keys = Vec::new();
        for path in list_entry_files(&self.config.directory).await? {
            match self.read_record(&path).await {
                Ok(Some(record)) if !record.entry.is_expired(now) => keys.push(record.key),
                Ok(_) => {}
                Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable entry file"),
            }
        }
        keys.sort();
        Ok(keys)
    }

    async fn close(&self) -> StoreResult<()> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            let _ = self.shutdown.send(true);
            debug!("file adapter closed");
        }
        Ok(())
    }
}
