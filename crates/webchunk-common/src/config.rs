//! Ambient configuration layer (SPEC_FULL §3.3). Plain serde structs with
//! spec-faithful defaults; nothing in this crate reads the environment or a
//! file on its own — a host opts in by calling [`PipelineConfig::load`].

use serde::{Deserialize, Serialize};

use crate::error::{CommonError, Result};
use crate::types::{ChunkingOptions, CrawlOptions};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub enabled: bool,
    pub max_entries: usize,
    pub max_bytes: u64,
    pub ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: 10_000,
            max_bytes: 256 * 1024 * 1024,
            ttl_seconds: 3600,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResilienceConfig {
    pub retry_max_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_ms: u64,
    pub circuit_breaker_failure_threshold: u32,
    pub circuit_breaker_half_open_after_secs: u64,
    pub fetch_bulkhead_capacity: usize,
    pub ai_bulkhead_capacity: usize,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            retry_max_attempts: 3,
            retry_base_delay_ms: 100,
            retry_max_delay_ms: 30_000,
            circuit_breaker_failure_threshold: 5,
            circuit_breaker_half_open_after_secs: 30,
            fetch_bulkhead_capacity: 16,
            ai_bulkhead_capacity: 4,
        }
    }
}

/// Spec §9: a percentage-of-working-set ceiling is host-dependent, so this
/// is expressed as a configurable absolute byte ceiling (default 1 GiB).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    pub ceiling_bytes: u64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            ceiling_bytes: 1024 * 1024 * 1024,
        }
    }
}

/// Aggregate configuration for the whole pipeline, composed of one
/// sub-config per concern.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PipelineConfig {
    pub crawl: CrawlOptions,
    pub chunking: ChunkingOptions,
    pub cache: CacheConfig,
    pub resilience: ResilienceConfig,
    pub memory: MemoryConfig,
}

impl PipelineConfig {
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: PipelineConfig = toml::from_str(&content)
            .map_err(|e| CommonError::Config(e.to_string()))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_sane() {
        let cfg = PipelineConfig::default();
        assert!(cfg.crawl.max_pages > 0);
        assert!(cfg.chunking.max_chunk_size > cfg.chunking.min_chunk_size);
    }

    #[test]
    fn load_round_trips_toml() {
        let cfg = PipelineConfig::default();
        let serialized = toml::to_string(&cfg).unwrap();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(serialized.as_bytes()).unwrap();
        let loaded = PipelineConfig::load(file.path().to_str().unwrap()).unwrap();
        assert_eq!(loaded.crawl.max_pages, cfg.crawl.max_pages);
    }
}
