//! Address-bar adapter: entries live as slug tokens in URL query parameters.
//!
//! The "backend" here is the codec itself plus a held current location.
//! `set` encodes the whole entry into a slug and writes it as the value of a
//! query parameter named after the key; `get` reads the parameter back and
//! decodes it. Collaborators that manage real navigation use
//! [`UrlParamStore::build_shareable_url`] and [`UrlParamStore::load_from_url`].

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;
use slugstore_codec::{DecodeOptions, EncodeOptions, SlugCodec};
use tracing::{debug, warn};
use ::url::Url;

use crate::entry::{now_ms, CachedEntry};
use crate::error::{StoreError, StoreResult};
use crate::store::{apply_ttl_override, StateStore};

const BACKEND_NAME: &str = "url";

/// Codec-backed [`StateStore`] that round-trips entries through the query
/// string of a held location URL.
pub struct UrlParamStore {
    codec: SlugCodec,
    encode_options: EncodeOptions,
    decode_options: DecodeOptions,
    current: RwLock<Url>,
    closed: AtomicBool,
}

impl UrlParamStore {
    /// Creates the adapter bound to `location`, encoding with `encode_options`
    /// and decoding with `decode_options`.
    pub fn new(
        codec: SlugCodec,
        location: Url,
        encode_options: EncodeOptions,
        decode_options: DecodeOptions,
    ) -> Self {
        Self {
            codec,
            encode_options,
            decode_options,
            current: RwLock::new(location),
            closed: AtomicBool::new(false),
        }
    }

    /// The held location with all currently stored slugs in its query string.
    pub fn current_url(&self) -> Url {
        self.current.read().clone()
    }

    /// Replaces the held location, e.g. after external navigation.
    pub fn set_current_url(&self, location: Url) {
        *self.current.write() = location;
    }

    /// Produces `base_url` with the slug stored under `key` attached as the
    /// `param_name` query parameter, ready to be shared or navigated to.
    /// Returns `None` when nothing is stored under `key`.
    pub async fn build_shareable_url(
        &self,
        key: &str,
        base_url: &Url,
        param_name: &str,
    ) -> StoreResult<Option<Url>> {
        let current = self.current.read().clone();
        let Some(slug) = query_param(&current, key) else {
            return Ok(None);
        };
        let mut shared = base_url.clone();
        set_query_param(&mut shared, param_name, &slug);
        Ok(Some(shared))
    }

    /// Decodes the slug carried in `url`'s `param_name` parameter, stores the
    /// entry under `key` in the held location, and returns it. Returns `None`
    /// when the parameter is absent.
    pub async fn load_from_url(
        &self,
        key: &str,
        url: &Url,
        param_name: &str,
    ) -> StoreResult<Option<CachedEntry>> {
        let Some(slug) = query_param(url, param_name) else {
            return Ok(None);
        };
        let entry: CachedEntry = self.codec.decode_value(&slug, &self.decode_options)?;
        self.set(key, entry.clone(), None).await?;
        debug!(key, "loaded entry from external url");
        Ok(Some(entry))
    }

    fn decode_entry(&self, key: &str, slug: &str) -> StoreResult<CachedEntry> {
        self.codec
            .decode_value(slug, &self.decode_options)
            .map_err(|e| StoreError::InvalidEntry {
                key: key.to_string(),
                reason: e.to_string(),
            })
    }
}

fn query_param(url: &Url, name: &str) -> Option<String> {
    url.query_pairs()
        .find(|(param, _)| param == name)
        .map(|(_, value)| value.into_owned())
}

fn set_query_param(url: &mut Url, name: &str, value: &str) {
    let retained: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(param, _)| param != name)
        .map(|(p, v)| (p.into_owned(), v.into_owned()))
        .collect();
    let mut pairs = url.query_pairs_mut();
    pairs.clear();
    for (p, v) in retained {
        pairs.append_pair(&p, &v);
    }
    pairs.append_pair(name, value);
}

fn remove_query_param(url: &mut Url, name: &str) {
    let retained: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(param, _)| param != name)
        .map(|(p, v)| (p.into_owned(), v.into_owned()))
        .collect();
    if retained.is_empty() {
        url.set_query(None);
    } else {
        let mut pairs = url.query_pairs_mut();
        pairs.clear();
        for (p, v) in retained {
            pairs.append_pair(&p, &v);
        }
    }
}

#[async_trait]
impl StateStore for UrlParamStore {
    fn name(&self) -> &str {
        BACKEND_NAME
    }

    async fn get(&self, key: &str) -> StoreResult<Option<CachedEntry>> {
        if self.closed.load(Ordering::SeqCst) {
            return Ok(None);
        }
        let slug = {
            let current = self.current.read();
            query_param(&current, key)
        };
        let Some(slug) = slug else {
            return Ok(None);
        };
        let entry = self.decode_entry(key, &slug)?;
        if entry.is_expired(now_ms()) {
            remove_query_param(&mut self.current.write(), key);
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
        let slug = self.codec.encode_value(&entry, &self.encode_options)?;
        set_query_param(&mut self.current.write(), key, &slug);
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Ok(());
        }
        remove_query_param(&mut self.current.write(), key);
        Ok(())
    }

    async fn clear(&self) -> StoreResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Ok(());
        }
        self.current.write().set_query(None);
        Ok(())
    }

    async fn keys(&self) -> StoreResult<Vec<String>> {
        if self.closed.load(Ordering::SeqCst) {
            return Ok(Vec::new());
        }
        let now = now_ms();
        let current = self.current.read().clone();
        let mut keys = Vec::new();
        for (param, slug) in current.query_pairs() {
            match self.decode_entry(&param, &slug) {
                Ok(entry) if !entry.is_expired(now) => keys.push(param.into_owned()),
                Ok(_) => {}
                Err(e) => {
                    warn!(key = %param, error = %e, "skipping undecodable query parameter")
                }
            }
        }
        Ok(keys)
    }

    async fn close(&self) -> StoreResult<()> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            debug!("url adapter closed");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn plain_store() -> UrlParamStore {
        UrlParamStore::new(
            SlugCodec::new(),
            Url::parse("https://app.example/dashboard").unwrap(),
            EncodeOptions::default(),
            DecodeOptions::default(),
        )
    }

    #[tokio::test]
    async fn set_get_roundtrip_through_query_string() {
        let store = plain_store();
        let entry = CachedEntry::new(json!({"filters": ["open", "mine"]}));
        store.set("view", entry.clone(), None).await.unwrap();

        // The slug is visible in the held location.
        let url = store.current_url();
        assert!(url.query().unwrap().contains("view="));

        assert_eq!(store.get("view").await.unwrap(), Some(entry));
    }

    #[tokio::test]
    async fn slug_in_query_is_url_safe() {
        let store = plain_store();
        store
            .set("state", CachedEntry::new(json!({"q": "a b&c=d"})), None)
            .await
            .unwrap();
        let url = store.current_url();
        let slug = query_param(&url, "state").unwrap();
        // Raw slug characters never need percent-encoding.
        assert!(slug
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_')));
    }

    #[tokio::test]
    async fn set_replaces_existing_param_and_keeps_others() {
        let store = plain_store();
        store.set("a", CachedEntry::new(json!(1)), None).await.unwrap();
        store.set("b", CachedEntry::new(json!(2)), None).await.unwrap();
        store.set("a", CachedEntry::new(json!(3)), None).await.unwrap();

        let mut keys = store.keys().await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(store.get("a").await.unwrap().map(|e| e.value), Some(json!(3)));
    }

    #[tokio::test]
    async fn expired_entry_is_removed_from_location() {
        let store = plain_store();
        let mut entry = CachedEntry::with_ttl(json!(1), 1);
        entry.timestamp_ms = now_ms() - 5_000;
        store.set("old", entry, None).await.unwrap();

        assert_eq!(store.get("old").await.unwrap(), None);
        assert!(store.keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn keys_lists_live_entries_only() {
        let store = plain_store();
        store.set("live", CachedEntry::new(json!(1)), None).await.unwrap();
        let mut dying = CachedEntry::with_ttl(json!(2), 1);
        dying.timestamp_ms = now_ms() - 5_000;
        store.set("dying", dying, None).await.unwrap();

        // The expired slug is still in the query string, but keys()
        // filters it like the memory and file adapters do.
        assert_eq!(store.keys().await.unwrap(), vec!["live".to_string()]);
    }

    #[tokio::test]
    async fn build_shareable_url_attaches_stored_slug() {
        let store = plain_store();
        let entry = CachedEntry::new(json!({"tab": "metrics"}));
        store.set("view", entry.clone(), None).await.unwrap();

        let base = Url::parse("https://share.example/report").unwrap();
        let shared = store
            .build_shareable_url("view", &base, "s")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(shared.host_str(), Some("share.example"));

        // A second adapter can load the entry back from the shared link.
        let other = plain_store();
        let loaded = other.load_from_url("view", &shared, "s").await.unwrap();
        assert_eq!(loaded, Some(entry.clone()));
        assert_eq!(other.get("view").await.unwrap(), Some(entry));
    }

    #[tokio::test]
    async fn build_shareable_url_for_missing_key_is_none() {
        let store = plain_store();
        let base = Url::parse("https://share.example/").unwrap();
        assert_eq!(
            store.build_shareable_url("absent", &base, "s").await.unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn load_from_url_without_param_is_none() {
        let store = plain_store();
        let url = Url::parse("https://share.example/?other=1").unwrap();
        assert_eq!(store.load_from_url("k", &url, "s").await.unwrap(), None);
    }

    #[tokio::test]
    async fn corrupt_slug_surfaces_invalid_entry() {
        let store = plain_store();
        let mut url = store.current_url();
        set_query_param(&mut url, "bad", "v1.n0.%%%%");
        store.set_current_url(url);

        let err = store.get("bad").await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidEntry { .. }));
    }

    #[tokio::test]
    async fn clear_strips_query_string() {
        let store = plain_store();
        store.set("a", CachedEntry::new(json!(1)), None).await.unwrap();
        store.clear().await.unwrap();
        assert_eq!(store.current_url().query(), None);
        assert!(store.keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn close_makes_ops_noops() {
        let store = plain_store();
        store.set("k", CachedEntry::new(json!(1)), None).await.unwrap();
        store.close().await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
        store.set("k2", CachedEntry::new(json!(2)), None).await.unwrap();
        assert!(store.keys().await.unwrap().is_empty());
    }
}
