//! C13: in-memory layer. LRU-capacity and byte-ceiling eviction are both
//! always enforced; the adaptive "policy" (spec §4.13) governs which
//! pressure signal triggers proactive eviction versus an expiry sweep.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use lru::LruCache;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionPolicy {
    Lru,
    SizeBased,
    TtlBased,
}

/// Picks the active policy from the two pressure signals spec §4.13 names.
/// Size pressure is checked first: a cache at >90% of its byte ceiling needs
/// space freed regardless of how fresh its entries are.
pub fn choose_policy(memory_pressure: f32, near_expiry_ratio: f32) -> EvictionPolicy {
    if memory_pressure > 0.9 {
        EvictionPolicy::SizeBased
    } else if near_expiry_ratio > 0.3 {
        EvictionPolicy::TtlBased
    } else {
        EvictionPolicy::Lru
    }
}

struct Entry<T> {
    value: T,
    size_bytes: u64,
    stored_at: Instant,
    ttl: Duration,
}

impl<T> Entry<T> {
    fn is_expired(&self) -> bool {
        self.stored_at.elapsed() >= self.ttl
    }

    fn expires_within(&self, window: Duration) -> bool {
        let remaining = self.ttl.saturating_sub(self.stored_at.elapsed());
        remaining <= window
    }
}

/// Hit/miss/eviction counters for one [`MemoryCache`], mirroring the
/// `ResilienceStats` pattern used for retry/circuit-breaker accounting.
#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryCacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

pub struct MemoryCache<T: Clone + Send + Sync + 'static> {
    inner: Mutex<LruCache<String, Entry<T>>>,
    total_bytes: AtomicU64,
    max_bytes: u64,
    default_ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl<T: Clone + Send + Sync + 'static> MemoryCache<T> {
    pub fn new(max_entries: usize, max_bytes: u64, default_ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(max_entries.max(1)).unwrap();
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
            total_bytes: AtomicU64::new(0),
            max_bytes,
            default_ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    pub fn stats(&self) -> MemoryCacheStats {
        MemoryCacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }

    pub async fn get(&self, key: &str) -> Option<T> {
        let mut guard = self.inner.lock().await;
        let expired = guard.get(key).map(|e| e.is_expired()).unwrap_or(false);
        if expired {
            if let Some(evicted) = guard.pop(key) {
                self.total_bytes.fetch_sub(evicted.size_bytes, Ordering::Relaxed);
                self.evictions.fetch_add(1, Ordering::Relaxed);
            }
            self.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        }
        let value = guard.get(key).map(|e| e.value.clone());
        if value.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        value
    }

    pub async fn put(&self, key: String, value: T, size_bytes: u64) {
        self.put_with_ttl(key, value, size_bytes, self.default_ttl).await
    }

    pub async fn put_with_ttl(&self, key: String, value: T, size_bytes: u64, ttl: Duration) {
        let mut guard = self.inner.lock().await;
        if let Some(old) = guard.peek(&key) {
            self.total_bytes.fetch_sub(old.size_bytes, Ordering::Relaxed);
        }
        let entry = Entry { value, size_bytes, stored_at: Instant::now(), ttl };
        if let Some((_, evicted)) = guard.push(key, entry) {
            self.total_bytes.fetch_sub(evicted.size_bytes, Ordering::Relaxed);
            self.evictions.fetch_add(1, Ordering::Relaxed);
        }
        self.total_bytes.fetch_add(size_bytes, Ordering::Relaxed);

        while self.total_bytes.load(Ordering::Relaxed) > self.max_bytes {
            let Some((_, evicted)) = guard.pop_lru() else { break };
            self.total_bytes.fetch_sub(evicted.size_bytes, Ordering::Relaxed);
            self.evictions.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Removes all expired entries. Represents the `TtlBased` policy's
    /// proactive sweep when a large share of entries are near expiry.
    pub async fn sweep_expired(&self) -> usize {
        let mut guard = self.inner.lock().await;
        let expired_keys: Vec<String> =
            guard.iter().filter(|(_, e)| e.is_expired()).map(|(k, _)| k.clone()).collect();
        for key in &expired_keys {
            if let Some(evicted) = guard.pop(key) {
                self.total_bytes.fetch_sub(evicted.size_bytes, Ordering::Relaxed);
                self.evictions.fetch_add(1, Ordering::Relaxed);
            }
        }
        expired_keys.len()
    }

    pub async fn memory_pressure(&self) -> f32 {
        if self.max_bytes == 0 {
            return 0.0;
        }
        self.total_bytes.load(Ordering::Relaxed) as f32 / self.max_bytes as f32
    }

    pub async fn near_expiry_ratio(&self, window: Duration) -> f32 {
        let guard = self.inner.lock().await;
        if guard.is_empty() {
            return 0.0;
        }
        let near = guard.iter().filter(|(_, e)| e.expires_within(window)).count();
        near as f32 / guard.len() as f32
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let cache: MemoryCache<String> = MemoryCache::new(10, 1_000_000, Duration::from_secs(60));
        cache.put("k".to_string(), "v".to_string(), 10).await;
        assert_eq!(cache.get("k").await, Some("v".to_string()));
    }

    #[tokio::test]
    async fn stats_track_hits_and_misses() {
        let cache: MemoryCache<String> = MemoryCache::new(10, 1_000_000, Duration::from_secs(60));
        cache.put("k".to_string(), "v".to_string(), 10).await;
        cache.get("k").await;
        cache.get("missing").await;
        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[tokio::test]
    async fn stats_track_capacity_evictions() {
        let cache: MemoryCache<String> = MemoryCache::new(10, 150, Duration::from_secs(60));
        cache.put("a".to_string(), "v".to_string(), 100).await;
        cache.put("b".to_string(), "v".to_string(), 100).await;
        assert_eq!(cache.stats().evictions, 1);
    }

    #[tokio::test]
    async fn expired_entry_is_not_returned() {
        let cache: MemoryCache<String> = MemoryCache::new(10, 1_000_000, Duration::from_millis(10));
        cache.put("k".to_string(), "v".to_string(), 10).await;
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(cache.get("k").await, None);
    }

    #[tokio::test]
    async fn byte_ceiling_evicts_least_recently_used() {
        let cache: MemoryCache<String> = MemoryCache::new(10, 150, Duration::from_secs(60));
        cache.put("a".to_string(), "v".to_string(), 100).await;
        cache.put("b".to_string(), "v".to_string(), 100).await;
        assert!(cache.get("a").await.is_none());
        assert!(cache.get("b").await.is_some());
    }

    #[test]
    fn policy_prefers_size_based_under_pressure() {
        assert_eq!(choose_policy(0.95, 0.0), EvictionPolicy::SizeBased);
        assert_eq!(choose_policy(0.5, 0.5), EvictionPolicy::TtlBased);
        assert_eq!(choose_policy(0.1, 0.1), EvictionPolicy::Lru);
    }
}
