//! Lookup result cache
//!
//! Interviews on the same topic tend to issue overlapping queries, and search
//! backends rate-limit aggressively. [`CachedLookup`] keeps recent results in
//! an LRU map with a per-entry TTL. Failures are never cached.

use crate::tools::Lookup;
use crate::types::{CapabilityResult, Snippet};
use async_trait::async_trait;
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

const DEFAULT_CAPACITY: NonZeroUsize = NonZeroUsize::MIN.saturating_add(255);

struct CacheEntry {
    snippets: Vec<Snippet>,
    inserted_at: Instant,
}

/// Statistics for cache performance monitoring
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

pub struct CachedLookup<L> {
    inner: L,
    entries: Mutex<LruCache<(String, usize), CacheEntry>>,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<L: Lookup> CachedLookup<L> {
    pub fn new(inner: L, capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(DEFAULT_CAPACITY);
        Self {
            inner,
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    fn cached(&self, key: &(String, usize)) -> Option<Vec<Snippet>> {
        let mut entries = self.entries.lock();
        let fresh = entries
            .get(key)
            .map(|entry| (entry.inserted_at.elapsed() < self.ttl, entry.snippets.clone()));
        match fresh {
            Some((true, snippets)) => Some(snippets),
            Some((false, _)) => {
                entries.pop(key);
                None
            }
            None => None,
        }
    }
}

#[async_trait]
impl<L: Lookup> Lookup for CachedLookup<L> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn search(&self, query: &str, max_results: usize) -> CapabilityResult<Vec<Snippet>> {
        let key = (query.trim().to_lowercase(), max_results);

        if let Some(snippets) = self.cached(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(lookup = self.inner.name(), query, "lookup cache hit");
            return Ok(snippets);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        let snippets = self.inner.search(query, max_results).await?;
        self.entries.lock().put(
            key,
            CacheEntry {
                snippets: snippets.clone(),
                inserted_at: Instant::now(),
            },
        );

        Ok(snippets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CapabilityError;
    use std::sync::atomic::AtomicUsize;

    struct CountingLookup {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl Lookup for CountingLookup {
        fn name(&self) -> &str {
            "counting"
        }

        async fn search(&self, query: &str, _max: usize) -> CapabilityResult<Vec<Snippet>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(CapabilityError::transient("counting", "down"));
            }
            Ok(vec![Snippet {
                source_id: format!("src://{}", query),
                text: query.to_string(),
                lookup: "counting".to_string(),
            }])
        }
    }

    fn counting(fail: bool) -> CountingLookup {
        CountingLookup {
            calls: AtomicUsize::new(0),
            fail,
        }
    }

    #[tokio::test]
    async fn test_repeated_query_hits_cache() {
        let cached = CachedLookup::new(counting(false), 8, Duration::from_secs(60));

        let first = cached.search("Rust", 3).await.unwrap();
        let second = cached.search("  rust ", 3).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(cached.inner.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cached.stats(), CacheStats { hits: 1, misses: 1 });
    }

    #[tokio::test]
    async fn test_expired_entries_are_refetched() {
        let cached = CachedLookup::new(counting(false), 8, Duration::from_millis(0));

        cached.search("Rust", 3).await.unwrap();
        cached.search("Rust", 3).await.unwrap();

        assert_eq!(cached.inner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let cached = CachedLookup::new(counting(true), 8, Duration::from_secs(60));

        assert!(cached.search("Rust", 3).await.is_err());
        assert!(cached.search("Rust", 3).await.is_err());

        assert_eq!(cached.inner.calls.load(Ordering::SeqCst), 2);
    }
}
