//! Server-side cache manager: TTL staleness, stale-while-revalidate, and
//! revalidation triggers over any [`StateStore`].
//!
//! The manager does its own TTL bookkeeping instead of delegating to the
//! adapter's entry TTL: an adapter would delete an expired entry outright,
//! while stale-while-revalidate must keep serving it until the background
//! refresh lands. Refreshes are write-then-swap: the stored entry is only
//! replaced after a successful fetch, and a failed refresh reports to the
//! manager's error channel while the stale value stays usable.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;
use slugstore_codec::ResolvedOptions;
use slugstore_store::{now_ms, CachedEntry, StateStore};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::error::{CacheError, CacheResult};
use crate::key::{canonicalize, derive_cache_key};

/// Metadata slot holding the parameter snapshot an entry was fetched with.
const PARAMS_SNAPSHOT_KEY: &str = "params";

/// Future produced by a fetcher.
pub type FetchFuture = Pin<Box<dyn Future<Output = Result<Value, String>> + Send>>;

/// Caller-supplied data producer. Receives the request parameters and
/// yields the value to cache; errors are plain descriptions.
pub type Fetcher = Arc<dyn Fn(Value) -> FetchFuture + Send + Sync>;

/// How the manager decides an entry needs refetching before its TTL is up.
#[derive(Clone, Default)]
pub enum RevalidationPolicy {
    /// TTL alone governs freshness.
    #[default]
    None,
    /// Dotted JSON paths compared structurally between the stored parameter
    /// snapshot and the current call's parameters. Watched paths are
    /// excluded from cache-key derivation so the same logical request keeps
    /// one entry while its volatile fields are still compared.
    WatchedPaths(Vec<String>),
    /// Custom comparison over `(stored snapshot, current params)`; `true`
    /// means invalidate. Overrides path comparison entirely.
    Predicate(Arc<dyn Fn(&Value, &Value) -> bool + Send + Sync>),
}

impl fmt::Debug for RevalidationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RevalidationPolicy::None => f.write_str("None"),
            RevalidationPolicy::WatchedPaths(paths) => {
                f.debug_tuple("WatchedPaths").field(paths).finish()
            }
            RevalidationPolicy::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

/// Per-call cache behavior.
#[derive(Debug, Clone, Default)]
pub struct CacheOptions {
    /// Entry age in seconds after which it counts as stale. `None` never
    /// goes stale.
    pub ttl_seconds: Option<u64>,
    /// Serve stale data immediately and refresh in the background instead
    /// of refetching synchronously.
    pub stale_while_revalidate: bool,
    /// Early-invalidation policy applied before the TTL check.
    pub revalidation: RevalidationPolicy,
}

/// What a cache lookup produced.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheOutcome {
    /// The derived cache key the value lives under.
    pub key: String,
    /// The value served to the caller.
    pub data: Value,
    /// Whether the value came from the cache.
    pub cached: bool,
    /// Whether the served value was past its TTL (stale-while-revalidate
    /// mode only; synchronous paths never serve stale data).
    pub stale: bool,
}

/// Cache layer over one persistence adapter (or a fallback chain).
pub struct CacheManager {
    store: Arc<dyn StateStore>,
    codec_options: ResolvedOptions,
    errors: watch::Sender<Option<String>>,
}

impl CacheManager {
    /// Creates a manager over `store`. `codec_options` contribute their
    /// flags digest to every derived cache key.
    pub fn new(store: Arc<dyn StateStore>, codec_options: ResolvedOptions) -> Self {
        let (errors, _) = watch::channel(None);
        Self {
            store,
            codec_options,
            errors,
        }
    }

    /// Watch channel carrying the most recent background revalidation
    /// failure, if any.
    pub fn error_watch(&self) -> watch::Receiver<Option<String>> {
        self.errors.subscribe()
    }

    /// Looks up the entry for `params`, fetching through `fetcher` on a
    /// miss, on early invalidation, or on synchronous staleness.
    pub async fn fetch(
        &self,
        fetcher: Fetcher,
        params: Value,
        options: &CacheOptions,
    ) -> CacheResult<CacheOutcome> {
        let key = self.derive_key(&params, &options.revalidation);

        if let Some(entry) = self.store.get(&key).await? {
            if invalidation_triggered(&entry, &params, &options.revalidation) {
                debug!(key = %key, "revalidation trigger fired, refetching");
                self.store.delete(&key).await?;
            } else if !is_stale(&entry, options.ttl_seconds) {
                return Ok(CacheOutcome {
                    key,
                    data: entry.value,
                    cached: true,
                    stale: false,
                });
            } else if options.stale_while_revalidate {
                debug!(key = %key, "serving stale entry, refreshing in background");
                self.spawn_refresh(key.clone(), fetcher, params);
                return Ok(CacheOutcome {
                    key,
                    data: entry.value,
                    cached: true,
                    stale: true,
                });
            }
            // Stale without SWR falls through to a synchronous refetch.
        }

        let data = fetcher(params.clone())
            .await
            .map_err(CacheError::Fetch)?;
        self.store
            .set(&key, entry_with_snapshot(data.clone(), &params), None)
            .await?;
        Ok(CacheOutcome {
            key,
            data,
            cached: false,
            stale: false,
        })
    }

    /// Drops the entry for `params`, if any.
    pub async fn invalidate(&self, params: &Value, options: &CacheOptions) -> CacheResult<()> {
        let key = self.derive_key(params, &options.revalidation);
        self.store.delete(&key).await?;
        Ok(())
    }

    /// Forces a fetch and replaces the stored entry regardless of freshness.
    pub async fn revalidate(
        &self,
        fetcher: Fetcher,
        params: Value,
        options: &CacheOptions,
    ) -> CacheResult<CacheOutcome> {
        let key = self.derive_key(&params, &options.revalidation);
        let data = fetcher(params.clone())
            .await
            .map_err(CacheError::Fetch)?;
        self.store
            .set(&key, entry_with_snapshot(data.clone(), &params), None)
            .await?;
        Ok(CacheOutcome {
            key,
            data,
            cached: false,
            stale: false,
        })
    }

    fn derive_key(&self, params: &Value, policy: &RevalidationPolicy) -> String {
        let keyed = match policy {
            RevalidationPolicy::WatchedPaths(paths) => strip_paths(params, paths),
            _ => params.clone(),
        };
        derive_cache_key(&keyed, &self.codec_options)
    }

    fn spawn_refresh(&self, key: String, fetcher: Fetcher, params: Value) {
        let store = Arc::clone(&self.store);
        let errors = self.errors.clone();
        tokio::spawn(async move {
            match fetcher(params.clone()).await {
                Ok(data) => {
                    let entry = entry_with_snapshot(data, &params);
                    match store.set(&key, entry, None).await {
                        Ok(()) => debug!(key = %key, "background revalidation replaced entry"),
                        Err(e) => {
                            warn!(key = %key, error = %e, "background revalidation store failed");
                            let _ = errors.send(Some(e.to_string()));
                        }
                    }
                }
                Err(reason) => {
                    // The stale entry stays in place and remains servable.
                    warn!(key = %key, reason = %reason, "background revalidation fetch failed");
                    let _ = errors.send(Some(reason));
                }
            }
        });
    }
}

fn entry_with_snapshot(data: Value, params: &Value) -> CachedEntry {
    CachedEntry::new(data).with_metadata(BTreeMap::from([(
        PARAMS_SNAPSHOT_KEY.to_string(),
        canonicalize(params),
    )]))
}

fn is_stale(entry: &CachedEntry, ttl_seconds: Option<u64>) -> bool {
    match ttl_seconds {
        Some(ttl) => entry.age_ms(now_ms()) > ttl.saturating_mul(1000),
        None => false,
    }
}

fn invalidation_triggered(
    entry: &CachedEntry,
    params: &Value,
    policy: &RevalidationPolicy,
) -> bool {
    let snapshot = entry
        .metadata
        .as_ref()
        .and_then(|m| m.get(PARAMS_SNAPSHOT_KEY));
    match policy {
        RevalidationPolicy::None => false,
        RevalidationPolicy::WatchedPaths(paths) => {
            // An entry with no snapshot cannot be compared; treat it as
            // needing a refetch.
            let Some(snapshot) = snapshot else {
                return true;
            };
            let current = canonicalize(params);
            paths
                .iter()
                .any(|path| lookup_path(snapshot, path) != lookup_path(&current, path))
        }
        RevalidationPolicy::Predicate(predicate) => {
            let Some(snapshot) = snapshot else {
                return true;
            };
            predicate(snapshot, params)
        }
    }
}

/// Follows a dotted path (`"filters.status"`) into a JSON document.
fn lookup_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = value;
    for segment in path.split('.') {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Canonical copy of `params` with the watched paths removed, so volatile
/// fields do not fragment the key space.
fn strip_paths(params: &Value, paths: &[String]) -> Value {
    let mut stripped = canonicalize(params);
    for path in paths {
        remove_path(&mut stripped, path);
    }
    stripped
}

fn remove_path(value: &mut Value, path: &str) {
    let Some((head, rest)) = path.split_once('.') else {
        if let Some(map) = value.as_object_mut() {
            map.remove(path);
        }
        return;
    };
    if let Some(inner) = value.as_object_mut().and_then(|m| m.get_mut(head)) {
        remove_path(inner, rest);
    }
}
