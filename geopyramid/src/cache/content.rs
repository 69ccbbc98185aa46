//! Tile content cache keyed by tile key.
//!
//! Holds raw fetched bodies together with their content type, so a cached tile
//! goes through exactly the same decoding as a freshly fetched one. The
//! retrieval pipeline reads from the cache before touching the transport and a
//! [`ContentCacheWriteBack`](crate::retrieval::ContentCacheWriteBack) post-processor
//! fills it after successful fetches.
//!
//! [`MemoryContentCache`] is backed by `moka::future::Cache`, which is
//! lock-free on reads and safe to share between retrieval tasks.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use futures::future::BoxFuture;
use futures::FutureExt;
use moka::future::Cache as MokaCache;

/// A cached tile body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedContent {
    pub content_type: String,
    pub body: Bytes,
}

impl CachedContent {
    pub fn new(content_type: impl Into<String>, body: impl Into<Bytes>) -> Self {
        Self {
            content_type: content_type.into(),
            body: body.into(),
        }
    }

    /// Bytes charged against a cache's capacity.
    pub fn weight(&self) -> u32 {
        (self.body.len() + self.content_type.len()).min(u32::MAX as usize) as u32
    }
}

/// Snapshot of cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContentCacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entry_count: u64,
    pub size_bytes: u64,
}

impl ContentCacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

impl fmt::Display for ContentCacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} entries, {} bytes, {:.1}% hit rate",
            self.entry_count,
            self.size_bytes,
            self.hit_rate() * 100.0
        )
    }
}

/// Key-value store for tile content, shared between retrieval tasks.
pub trait ContentCache: Send + Sync {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Option<CachedContent>>;

    fn put<'a>(&'a self, key: &'a str, content: CachedContent) -> BoxFuture<'a, ()>;

    fn remove<'a>(&'a self, key: &'a str) -> BoxFuture<'a, ()>;

    fn stats(&self) -> ContentCacheStats;
}

/// In-memory content cache bounded by total body size.
pub struct MemoryContentCache {
    cache: MokaCache<String, CachedContent>,
    max_size_bytes: u64,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl MemoryContentCache {
    /// Create a cache holding at most `max_size_bytes` of content.
    pub fn new(max_size_bytes: u64) -> Self {
        let cache = MokaCache::builder()
            .weigher(|_key: &String, value: &CachedContent| -> u32 { value.weight() })
            .max_capacity(max_size_bytes)
            .build();

        Self {
            cache,
            max_size_bytes,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn max_size_bytes(&self) -> u64 {
        self.max_size_bytes
    }

    pub fn contains(&self, key: &str) -> bool {
        self.cache.contains_key(key)
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.cache.invalidate_all();
        let _ = self.cache.run_pending_tasks().now_or_never();
    }
}

impl ContentCache for MemoryContentCache {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Option<CachedContent>> {
        async move {
            let found = self.cache.get(key).await;
            let counter = if found.is_some() {
                &self.hits
            } else {
                &self.misses
            };
            counter.fetch_add(1, Ordering::Relaxed);
            found
        }
        .boxed()
    }

    fn put<'a>(&'a self, key: &'a str, content: CachedContent) -> BoxFuture<'a, ()> {
        async move {
            self.cache.insert(key.to_string(), content).await;
            self.cache.run_pending_tasks().await;
        }
        .boxed()
    }

    fn remove<'a>(&'a self, key: &'a str) -> BoxFuture<'a, ()> {
        async move {
            self.cache.invalidate(key).await;
        }
        .boxed()
    }

    fn stats(&self) -> ContentCacheStats {
        ContentCacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entry_count: self.cache.entry_count(),
            size_bytes: self.cache.weighted_size(),
        }
    }
}

impl fmt::Debug for MemoryContentCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryContentCache")
            .field("max_size_bytes", &self.max_size_bytes)
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_then_get() {
        let cache = MemoryContentCache::new(1024);
        let content = CachedContent::new("application/bil16", vec![1u8, 0, 2, 0]);
        cache.put("0.0.0", content.clone()).await;

        assert_eq!(cache.get("0.0.0").await, Some(content));
        assert_eq!(cache.get("0.0.1").await, None);

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hit_rate(), 0.5);
    }

    #[tokio::test]
    async fn test_remove() {
        let cache = MemoryContentCache::new(1024);
        cache.put("1.2.3", CachedContent::new("image/png", vec![0u8; 8])).await;
        assert!(cache.contains("1.2.3"));
        cache.remove("1.2.3").await;
        assert_eq!(cache.get("1.2.3").await, None);
    }

    #[tokio::test]
    async fn test_size_bounded() {
        let cache = MemoryContentCache::new(1000);
        for i in 0..20 {
            let key = format!("0.0.{}", i);
            cache.put(&key, CachedContent::new("x", vec![0u8; 200])).await;
        }
        assert!(cache.stats().size_bytes <= 1000);
    }

    #[test]
    fn test_weight_counts_body_and_type() {
        let content = CachedContent::new("image/png", vec![0u8; 10]);
        assert_eq!(content.weight(), 19);
    }
}
