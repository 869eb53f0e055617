//! C13: Cache (spec §4.13). Two layers — an in-memory LRU/TTL cache always
//! present, and an optional distributed KV layer behind [`DistributedCache`].
//! `Get` probes memory then distributed; writes populate both.

pub mod distributed;
pub mod key;
pub mod memory;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::instrument;

pub use distributed::DistributedCache;
pub use key::{cache_key, options_hash};
pub use memory::{choose_policy, EvictionPolicy, MemoryCache, MemoryCacheStats};

const NEAR_EXPIRY_WINDOW: Duration = Duration::from_secs(5 * 60);

pub struct CacheStats {
    pub memory_entries: usize,
    pub memory_pressure: f32,
    pub near_expiry_ratio: f32,
    pub active_policy: EvictionPolicy,
    pub memory_hits: u64,
    pub memory_misses: u64,
    pub memory_evictions: u64,
    pub distributed_hits: u64,
    pub distributed_misses: u64,
}

pub struct AdaptiveCache<T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static> {
    memory: MemoryCache<T>,
    distributed: Option<Arc<dyn DistributedCache>>,
    default_ttl: Duration,
    distributed_hits: AtomicU64,
    distributed_misses: AtomicU64,
}

impl<T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static> AdaptiveCache<T> {
    pub fn new(
        max_entries: usize,
        max_bytes: u64,
        default_ttl: Duration,
        distributed: Option<Arc<dyn DistributedCache>>,
    ) -> Self {
        Self {
            memory: MemoryCache::new(max_entries, max_bytes, default_ttl),
            distributed,
            default_ttl,
            distributed_hits: AtomicU64::new(0),
            distributed_misses: AtomicU64::new(0),
        }
    }

    #[instrument(skip(self), fields(key = %key))]
    pub async fn get(&self, key: &str) -> Option<T> {
        if let Some(value) = self.memory.get(key).await {
            return Some(value);
        }

        let distributed = self.distributed.as_ref()?;
        let Some(bytes) = distributed.get(key).await else {
            self.distributed_misses.fetch_add(1, Ordering::Relaxed);
            return None;
        };
        self.distributed_hits.fetch_add(1, Ordering::Relaxed);
        let value: T = serde_json::from_slice(&bytes).ok()?;
        self.memory.put(key.to_string(), value.clone(), bytes.len() as u64).await;
        Some(value)
    }

    #[instrument(skip(self, value), fields(key = %key))]
    pub async fn put(&self, key: &str, value: T) {
        self.put_with_ttl(key, value, self.default_ttl).await
    }

    pub async fn put_with_ttl(&self, key: &str, value: T, ttl: Duration) {
        let bytes = serde_json::to_vec(&value).unwrap_or_default();
        self.memory.put_with_ttl(key.to_string(), value, bytes.len() as u64, ttl).await;
        if let Some(distributed) = &self.distributed {
            distributed.set(key, bytes, ttl).await;
        }
    }

    /// Applies the adaptive policy (spec §4.13): a TTL sweep when many
    /// entries are near expiry, otherwise relies on the always-on LRU/byte
    /// eviction that already runs inside every `put`.
    pub async fn run_maintenance(&self) -> CacheStats {
        let pressure = self.memory.memory_pressure().await;
        let near_expiry = self.memory.near_expiry_ratio(NEAR_EXPIRY_WINDOW).await;
        let policy = choose_policy(pressure, near_expiry);
        if policy == EvictionPolicy::TtlBased {
            self.memory.sweep_expired().await;
        }
        let memory_stats = self.memory.stats();
        CacheStats {
            memory_entries: self.memory.len().await,
            memory_pressure: pressure,
            near_expiry_ratio: near_expiry,
            active_policy: policy,
            memory_hits: memory_stats.hits,
            memory_misses: memory_stats.misses,
            memory_evictions: memory_stats.evictions,
            distributed_hits: self.distributed_hits.load(Ordering::Relaxed),
            distributed_misses: self.distributed_misses.load(Ordering::Relaxed),
        }
    }

    /// Current hit/miss/eviction counters for the memory layer.
    pub fn memory_stats(&self) -> MemoryCacheStats {
        self.memory.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_only_round_trip() {
        let cache: AdaptiveCache<String> = AdaptiveCache::new(10, 1_000_000, Duration::from_secs(60), None);
        cache.put("k", "v".to_string()).await;
        assert_eq!(cache.get("k").await, Some("v".to_string()));
    }

    #[tokio::test]
    async fn miss_returns_none_without_distributed_layer() {
        let cache: AdaptiveCache<String> = AdaptiveCache::new(10, 1_000_000, Duration::from_secs(60), None);
        assert_eq!(cache.get("missing").await, None);
    }

    #[tokio::test]
    async fn memory_stats_track_hits_and_misses() {
        let cache: AdaptiveCache<String> = AdaptiveCache::new(10, 1_000_000, Duration::from_secs(60), None);
        cache.put("k", "v".to_string()).await;
        cache.get("k").await;
        cache.get("missing").await;
        let stats = cache.memory_stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    struct StubDistributed {
        value: tokio::sync::Mutex<Option<Vec<u8>>>,
    }

    #[async_trait::async_trait]
    impl DistributedCache for StubDistributed {
        async fn get(&self, _key: &str) -> Option<Vec<u8>> {
            self.value.lock().await.clone()
        }

        async fn set(&self, _key: &str, value: Vec<u8>, _ttl: Duration) {
            *self.value.lock().await = Some(value);
        }
    }

    #[tokio::test]
    async fn run_maintenance_reports_distributed_hit_and_miss() {
        let distributed = Arc::new(StubDistributed { value: tokio::sync::Mutex::new(None) });
        let cache: AdaptiveCache<String> =
            AdaptiveCache::new(10, 1_000_000, Duration::from_secs(60), Some(distributed));
        assert_eq!(cache.get("k").await, None);

        let stats = cache.run_maintenance().await;
        assert_eq!(stats.distributed_misses, 1);
    }
}
