use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use tracing::debug;

use super::{ObjectStore, StorageError};
use crate::config::MAX_SIGNED_URL_TTL_SECS;

#[derive(Debug, Clone)]
struct CachedUrl {
    url: String,
    expires_at: DateTime<Utc>,
}

/// Storage path -> signed URL, reused until shortly before expiry.
///
/// Entries are never evicted; the map lives as long as the process.
#[derive(Debug)]
pub struct SignedUrlCache {
    ttl_secs: u64,
    margin: Duration,
    entries: Mutex<HashMap<String, CachedUrl>>,
}

impl SignedUrlCache {
    pub fn new(ttl_secs: u64, margin_secs: u64) -> Self {
        let ttl_secs = ttl_secs.min(MAX_SIGNED_URL_TTL_SECS);
        Self {
            ttl_secs,
            margin: Duration::seconds(margin_secs.min(ttl_secs) as i64),
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl_secs(&self) -> u64 {
        self.ttl_secs
    }

    /// Cached URL for `path` if it is still outside the safety margin at `now`
    pub fn lookup(&self, path: &str, now: DateTime<Utc>) -> Option<String> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries
            .get(path)
            .filter(|entry| now < entry.expires_at - self.margin)
            .map(|entry| entry.url.clone())
    }

    pub fn store(&self, path: &str, url: String, issued_at: DateTime<Utc>) {
        let expires_at = issued_at + Duration::seconds(self.ttl_secs as i64);
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(path.to_string(), CachedUrl { url, expires_at });
    }

    pub fn invalidate(&self, path: &str) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.remove(path);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub async fn get_or_sign<S: ObjectStore + ?Sized>(&self, store: &S, path: &str) -> Result<String, StorageError> {
        self.get_or_sign_at(store, path, Utc::now()).await
    }

    /// Return the cached URL or ask `store` for a fresh one as of `now`
    pub async fn get_or_sign_at<S: ObjectStore + ?Sized>(
        &self,
        store: &S,
        path: &str,
        now: DateTime<Utc>,
    ) -> Result<String, StorageError> {
        if let Some(url) = self.lookup(path, now) {
            return Ok(url);
        }

        debug!("Signing storage path {}", path);
        let url = store.create_signed_url(path, self.ttl_secs).await?;
        self.store(path, url.clone(), now);
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingStore {
        signed: AtomicUsize,
    }

    #[async_trait]
    impl ObjectStore for CountingStore {
        async fn upload(&self, _path: &str, _bytes: Vec<u8>, _content_type: &str) -> Result<(), StorageError> {
            Ok(())
        }

        async fn remove(&self, _path: &str) -> Result<(), StorageError> {
            Ok(())
        }

        async fn create_signed_url(&self, path: &str, expires_in_secs: u64) -> Result<String, StorageError> {
            let n = self.signed.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(format!("https://cdn.test/{path}?ttl={expires_in_secs}&n={n}"))
        }
    }

    #[tokio::test]
    async fn reuses_url_within_ttl() {
        let cache = SignedUrlCache::new(3600, 60);
        let store = CountingStore::default();
        let t0 = Utc::now();

        let first = cache.get_or_sign_at(&store, "u1/a.jpg", t0).await.unwrap();
        let second = cache
            .get_or_sign_at(&store, "u1/a.jpg", t0 + Duration::minutes(30))
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(store.signed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn re_signs_after_expiry_margin() {
        let cache = SignedUrlCache::new(3600, 60);
        let store = CountingStore::default();
        let t0 = Utc::now();

        let first = cache.get_or_sign_at(&store, "u1/a.jpg", t0).await.unwrap();
        // Inside the final minute the entry is already treated as stale
        let late = cache
            .get_or_sign_at(&store, "u1/a.jpg", t0 + Duration::seconds(3550))
            .await
            .unwrap();

        assert_ne!(first, late);
        assert_eq!(store.signed.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn paths_are_cached_independently() {
        let cache = SignedUrlCache::new(3600, 60);
        let store = CountingStore::default();
        let now = Utc::now();

        cache.get_or_sign_at(&store, "u1/a.jpg", now).await.unwrap();
        cache.get_or_sign_at(&store, "u1/b.jpg", now).await.unwrap();
        cache.get_or_sign_at(&store, "u1/a.jpg", now).await.unwrap();

        assert_eq!(store.signed.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn invalidate_drops_entry() {
        let cache = SignedUrlCache::new(3600, 60);
        let now = Utc::now();
        cache.store("u1/a.jpg", "https://cdn.test/a".to_string(), now);
        assert!(cache.lookup("u1/a.jpg", now).is_some());

        cache.invalidate("u1/a.jpg");
        assert!(cache.lookup("u1/a.jpg", now).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn oversized_ttl_is_capped() {
        let cache = SignedUrlCache::new(u64::MAX, u64::MAX);
        assert_eq!(cache.ttl_secs(), MAX_SIGNED_URL_TTL_SECS);

        let now = Utc::now();
        cache.store("a/1.jpg", "https://signed/1".to_string(), now);
        assert_eq!(cache.lookup("a/1.jpg", now).as_deref(), None);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn margin_never_exceeds_ttl() {
        let cache = SignedUrlCache::new(30, 60);
        let now = Utc::now();
        cache.store("p", "u".to_string(), now);
        // margin clamps to ttl, so the entry is stale immediately but lookup does not panic
        assert!(cache.lookup("p", now).is_none());
    }
}
