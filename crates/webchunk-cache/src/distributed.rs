//! C13: optional second layer. The host supplies an opaque KV-store
//! implementation (Redis, Memcached, ...); this crate never talks to one
//! directly.

use std::time::Duration;

use async_trait::async_trait;

#[async_trait]
pub trait DistributedCache: Send + Sync {
    async fn get(&self, key: &str) -> Option<Vec<u8>>;

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration);
}
