//! Archived playlist fallback.
//!
//! Selected playlists are served from a static copy in object storage instead
//! of being resolved live. A fetched copy is kept for the life of the process;
//! restart to pick up a republished one.

use crate::provider::SnapshotPayload;
use anyhow::Context;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Where archived playlists are read from.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn fetch(&self, playlist_id: &str) -> anyhow::Result<SnapshotPayload>;
}

/// Reads `<base>/playlist.json` over HTTP.
#[derive(Debug, Clone)]
pub struct HttpSnapshotStore {
    http: reqwest::Client,
    base_url: String,
}

impl HttpSnapshotStore {
    pub fn new(http: reqwest::Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl SnapshotStore for HttpSnapshotStore {
    async fn fetch(&self, _playlist_id: &str) -> anyhow::Result<SnapshotPayload> {
        let url = format!("{}/playlist.json", self.base_url);
        let payload = self
            .http
            .get(&url)
            .send()
            .await
            .with_context(|| format!("fetch {url}"))?
            .error_for_status()
            .context("snapshot http status")?
            .json::<SnapshotPayload>()
            .await
            .context("parse snapshot json")?;
        Ok(payload)
    }
}

pub struct SnapshotCache {
    store: Arc<dyn SnapshotStore>,
    allowed: HashSet<String>,
    entries: RwLock<HashMap<String, Arc<SnapshotPayload>>>,
}

impl SnapshotCache {
    pub fn new<I, S>(store: Arc<dyn SnapshotStore>, allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            store,
            allowed: allowed.into_iter().map(Into::into).collect(),
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn is_eligible(&self, playlist_id: &str) -> bool {
        self.allowed.contains(playlist_id)
    }

    pub async fn get(&self, playlist_id: &str) -> Option<Arc<SnapshotPayload>> {
        self.entries.read().await.get(playlist_id).cloned()
    }

    pub async fn put(&self, playlist_id: &str, payload: Arc<SnapshotPayload>) {
        self.entries
            .write()
            .await
            .insert(playlist_id.to_string(), payload);
    }

    /// Archived payload for `playlist_id`, fetching it on first use.
    ///
    /// Any fetch failure is a miss and is not remembered, so the next lookup
    /// tries again.
    pub async fn lookup(&self, playlist_id: &str) -> Option<Arc<SnapshotPayload>> {
        if !self.is_eligible(playlist_id) {
            return None;
        }
        if let Some(hit) = self.get(playlist_id).await {
            return Some(hit);
        }

        match self.store.fetch(playlist_id).await {
            Ok(payload) => {
                info!(playlist_id, songs = payload.len(), "snapshot loaded");
                let payload = Arc::new(payload);
                self.put(playlist_id, payload.clone()).await;
                Some(payload)
            }
            Err(e) => {
                debug!(playlist_id, "snapshot unavailable: {e:#}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Default)]
    struct FlakyStore {
        fetches: AtomicUsize,
        healthy: AtomicBool,
    }

    #[async_trait]
    impl SnapshotStore for FlakyStore {
        async fn fetch(&self, _playlist_id: &str) -> anyhow::Result<SnapshotPayload> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if !self.healthy.load(Ordering::SeqCst) {
                anyhow::bail!("object store unreachable");
            }
            Ok(serde_json::from_value(json!([{
                "author": "A",
                "title": "T",
                "pic": "https://r2.example/pic/m.jpg",
                "url": "https://r2.example/music/m.m4a",
                "lrc": "https://r2.example/lrc/m.lrc"
            }]))?)
        }
    }

    #[tokio::test]
    async fn test_not_eligible_never_fetches() {
        let store = Arc::new(FlakyStore::default());
        store.healthy.store(true, Ordering::SeqCst);
        let cache = SnapshotCache::new(store.clone(), ["2374187585"]);

        assert!(cache.lookup("999").await.is_none());
        assert_eq!(store.fetches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failure_is_not_cached_then_success_sticks() {
        let store = Arc::new(FlakyStore::default());
        let cache = SnapshotCache::new(store.clone(), ["2374187585"]);

        assert!(cache.lookup("2374187585").await.is_none());
        assert!(cache.get("2374187585").await.is_none());
        assert_eq!(store.fetches.load(Ordering::SeqCst), 1);

        store.healthy.store(true, Ordering::SeqCst);
        let first = cache.lookup("2374187585").await.unwrap();
        assert_eq!(store.fetches.load(Ordering::SeqCst), 2);

        let second = cache.lookup("2374187585").await.unwrap();
        let third = cache.lookup("2374187585").await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(Arc::ptr_eq(&first, &third));
        assert_eq!(store.fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_successful_entry_survives_store_outage() {
        let store = Arc::new(FlakyStore::default());
        store.healthy.store(true, Ordering::SeqCst);
        let cache = SnapshotCache::new(store.clone(), ["p"]);

        let first = cache.lookup("p").await.unwrap();
        store.healthy.store(false, Ordering::SeqCst);
        let again = cache.lookup("p").await.unwrap();
        assert!(Arc::ptr_eq(&first, &again));
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let cache = SnapshotCache::new(Arc::new(FlakyStore::default()), ["p"]);
        let payload = Arc::new(Vec::new());
        cache.put("p", payload.clone()).await;
        assert!(Arc::ptr_eq(&cache.lookup("p").await.unwrap(), &payload));
    }

    #[tokio::test]
    async fn test_http_store() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/playlist.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"author": "A", "title": "T", "pic": "p", "url": "", "lrc": "l"}
            ])))
            .mount(&server)
            .await;

        let store = HttpSnapshotStore::new(reqwest::Client::new(), &format!("{}/", server.uri()));
        let payload = store.fetch("any").await.unwrap();
        assert_eq!(payload.len(), 1);
        assert_eq!(payload[0]["url"], "");
    }

    #[tokio::test]
    async fn test_http_store_keeps_unknown_fields_and_nulls() {
        let body = json!([
            {"author": "A", "title": "T", "pic": "p", "url": null, "lrc": "l", "theme": "red"},
            {"title": "only title", "extra": {"nested": [1, 2]}}
        ]);
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/playlist.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body.clone()))
            .mount(&server)
            .await;

        let store = HttpSnapshotStore::new(reqwest::Client::new(), &server.uri());
        let cache = SnapshotCache::new(Arc::new(store), ["p"]);
        let payload = cache.lookup("p").await.unwrap();
        assert_eq!(serde_json::to_value(&*payload).unwrap(), body);
    }

    #[tokio::test]
    async fn test_http_store_rejects_non_array_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/playlist.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"songs": []})))
            .mount(&server)
            .await;

        let store = HttpSnapshotStore::new(reqwest::Client::new(), &server.uri());
        assert!(store.fetch("p").await.is_err());
    }

    #[tokio::test]
    async fn test_http_store_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/playlist.json"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        let store = HttpSnapshotStore::new(reqwest::Client::new(), &server.uri());
        assert!(store.fetch("any").await.is_err());

        let cache = SnapshotCache::new(Arc::new(store), ["p"]);
        assert!(cache.lookup("p").await.is_none());
        assert!(cache.get("p").await.is_none());
    }
}
