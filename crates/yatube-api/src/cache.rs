//! Rendered-page cache for the anonymous home feed.
//!
//! Entries expire on their TTL only. Writes to the store do not invalidate
//! anything, so a cached page may show posts that were deleted or miss new
//! ones until it expires or the cache is cleared by an admin.
//!
//! The number of entries is capped. When full, expired entries are swept
//! first, then the entry closest to expiry is evicted.

use std::future::Future;
use std::time::{Duration, Instant};

use bytes::Bytes;
use dashmap::DashMap;
use tracing::{debug, warn};

use crate::config::DEFAULT_INDEX_CACHE_MAX_ENTRIES;

/// Key/value cache of rendered response bodies.
pub trait PageCache: Send + Sync {
    /// Fresh entry for `key`, if any.
    fn get(&self, key: &str) -> Option<Bytes>;

    fn set(&self, key: &str, value: Bytes, ttl: Duration);

    /// Drops every entry.
    fn clear(&self);
}

#[derive(Debug, Clone)]
struct CachedEntry {
    data: Bytes,
    expires_at: Instant,
}

impl CachedEntry {
    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// Process-local cache; each key is read and written independently.
pub struct MemoryPageCache {
    store: DashMap<String, CachedEntry>,
    max_entries: usize,
}

impl Default for MemoryPageCache {
    fn default() -> Self {
        Self::with_limit(DEFAULT_INDEX_CACHE_MAX_ENTRIES)
    }
}

impl MemoryPageCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(max_entries: usize) -> Self {
        Self {
            store: DashMap::new(),
            max_entries: max_entries.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Makes room for one more key.
    fn enforce_limit(&self) {
        if self.store.len() < self.max_entries {
            return;
        }

        self.store.retain(|_, entry| !entry.is_expired());
        if self.store.len() < self.max_entries {
            return;
        }

        let oldest = self
            .store
            .iter()
            .min_by_key(|entry| entry.expires_at)
            .map(|entry| entry.key().clone());
        if let Some(key) = oldest {
            warn!(entries = self.store.len(), evicted = %key, "page cache full");
            self.store.remove(&key);
        }
    }
}

impl PageCache for MemoryPageCache {
    fn get(&self, key: &str) -> Option<Bytes> {
        if let Some(entry) = self.store.get(key) {
            if !entry.is_expired() {
                return Some(entry.data.clone());
            }
        }

        // Expired entries are dropped lazily on access.
        self.store.remove_if(key, |_, entry| entry.is_expired());
        None
    }

    fn set(&self, key: &str, value: Bytes, ttl: Duration) {
        if ttl.is_zero() {
            return;
        }
        if !self.store.contains_key(key) {
            self.enforce_limit();
        }
        self.store.insert(
            key.to_string(),
            CachedEntry {
                data: value,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    fn clear(&self) {
        self.store.clear();
    }
}

/// Serves `key` from `cache`, or renders it with `compute` and stores the
/// result for `ttl`. Failed renders are not cached.
pub async fn get_or_compute<F, Fut, E>(
    cache: &dyn PageCache,
    key: &str,
    ttl: Duration,
    compute: F,
) -> Result<Bytes, E>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Bytes, E>>,
{
    if let Some(hit) = cache.get(key) {
        debug!(key, "page cache HIT");
        return Ok(hit);
    }

    debug!(key, "page cache MISS");
    let rendered = compute().await?;
    cache.set(key, rendered.clone(), ttl);
    Ok(rendered)
}

/// Cache key for a home feed page. Requests that do not name a page number
/// share the key of page 1.
pub fn index_key(page: Option<&str>) -> String {
    let number = page
        .and_then(|raw| raw.trim().parse::<u64>().ok())
        .filter(|n| *n > 0)
        .unwrap_or(1);
    format!("index_page:{number}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    async fn render(calls: &AtomicUsize, body: &'static str) -> Result<Bytes, ()> {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(Bytes::from_static(body.as_bytes()))
    }

    #[tokio::test]
    async fn second_call_is_served_from_cache() {
        let cache = MemoryPageCache::new();
        let calls = AtomicUsize::new(0);
        let ttl = Duration::from_secs(60);

        let first = get_or_compute(&cache, "k", ttl, || render(&calls, "one")).await.unwrap();
        let second = get_or_compute(&cache, "k", ttl, || render(&calls, "two")).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn entries_expire_after_ttl() {
        let cache = MemoryPageCache::new();
        let calls = AtomicUsize::new(0);
        let ttl = Duration::from_millis(30);

        get_or_compute(&cache, "k", ttl, || render(&calls, "one")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;
        let fresh = get_or_compute(&cache, "k", ttl, || render(&calls, "two")).await.unwrap();

        assert_eq!(fresh, Bytes::from_static(b"two"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn clear_forces_recompute() {
        let cache = MemoryPageCache::new();
        let calls = AtomicUsize::new(0);
        let ttl = Duration::from_secs(60);

        get_or_compute(&cache, "k", ttl, || render(&calls, "one")).await.unwrap();
        cache.clear();
        let fresh = get_or_compute(&cache, "k", ttl, || render(&calls, "two")).await.unwrap();

        assert_eq!(fresh, Bytes::from_static(b"two"));
    }

    #[tokio::test]
    async fn errors_are_not_cached() {
        let cache = MemoryPageCache::new();
        let ttl = Duration::from_secs(60);

        let failed: Result<Bytes, &str> = get_or_compute(&cache, "k", ttl, || async { Err("boom") }).await;
        assert!(failed.is_err());
        assert!(cache.get("k").is_none());
    }

    #[test]
    fn keys_differ_per_page() {
        assert_ne!(index_key(None), index_key(Some("2")));
        assert_eq!(index_key(Some(" 2")), index_key(Some("2")));
    }

    #[test]
    fn junk_page_values_share_one_key() {
        let keys: std::collections::HashSet<_> = ["junk1", "junk2", "0", "-3", ""]
            .into_iter()
            .map(|raw| index_key(Some(raw)))
            .collect();
        assert_eq!(keys.len(), 1);
        assert!(keys.contains(&index_key(None)));
    }

    #[test]
    fn entry_count_is_capped() {
        let cache = MemoryPageCache::with_limit(100);
        let ttl = Duration::from_secs(20);

        for n in 0..5_000 {
            cache.set(&format!("index_page:{n}"), Bytes::from_static(b"page"), ttl);
        }

        assert!(cache.len() <= 100);
        assert!(cache.get("index_page:4999").is_some());
    }

    #[test]
    fn full_cache_drops_expired_entries_first() {
        let cache = MemoryPageCache::with_limit(2);
        cache.set("stale", Bytes::from_static(b"a"), Duration::from_millis(1));
        cache.set("fresh", Bytes::from_static(b"b"), Duration::from_secs(60));
        std::thread::sleep(Duration::from_millis(5));

        cache.set("new", Bytes::from_static(b"c"), Duration::from_secs(60));

        assert_eq!(cache.len(), 2);
        assert!(cache.get("fresh").is_some());
        assert!(cache.get("new").is_some());
    }
}
