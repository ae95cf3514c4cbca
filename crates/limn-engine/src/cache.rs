//! Result caching
//!
//! Moka-backed implementation of the advisory [`ResultCache`] trait: TTL-
//! bounded, capacity-bounded, with atomic hit/miss statistics. A cache hit
//! bypasses the whole pipeline and returns the stored outcome unchanged; a
//! cache failure of any kind degrades to recomputation.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use serde::{Deserialize, Serialize};

use limn_core::{ExtractionOutcome, ResultCache};

/// Configuration for outcome cache behavior
#[derive(Debug, Clone)]
pub struct OutcomeCacheConfig {
    /// Maximum number of cached outcomes
    pub max_capacity: u64,

    /// Time-to-live per entry, in seconds
    pub ttl_seconds: u64,
}

impl Default for OutcomeCacheConfig {
    fn default() -> Self {
        Self {
            // Outcomes change with config snapshots; a short TTL keeps the
            // cache from serving stale tunings
            max_capacity: 1_000,
            ttl_seconds: 300,
        }
    }
}

/// In-process outcome cache
#[derive(Clone)]
pub struct OutcomeCache {
    cache: Cache<u64, ExtractionOutcome>,
    stats: Arc<CacheStats>,
}

impl OutcomeCache {
    /// Create with default configuration
    pub fn new() -> Self {
        Self::with_config(&OutcomeCacheConfig::default())
    }

    /// Create with custom configuration
    pub fn with_config(config: &OutcomeCacheConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.max_capacity)
            .time_to_live(Duration::from_secs(config.ttl_seconds))
            .build();

        Self {
            cache,
            stats: Arc::new(CacheStats::default()),
        }
    }

    /// Get cache statistics
    pub fn stats(&self) -> Arc<CacheStats> {
        Arc::clone(&self.stats)
    }

    /// Current entry count
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }
}

impl Default for OutcomeCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl ResultCache for OutcomeCache {
    async fn get(&self, key: u64) -> Option<ExtractionOutcome> {
        let result = self.cache.get(&key).await;
        if result.is_some() {
            self.stats.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.stats.misses.fetch_add(1, Ordering::Relaxed);
        }
        result
    }

    async fn put(&self, key: u64, outcome: ExtractionOutcome) {
        self.cache.insert(key, outcome).await;
        self.stats.writes.fetch_add(1, Ordering::Relaxed);
    }

    fn name(&self) -> &str {
        "outcome"
    }
}

// ============================================================================
// Cache Statistics
// ============================================================================

/// Hit/miss/write counters for cache monitoring
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    writes: AtomicU64,
}

impl CacheStats {
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    /// Hit rate (0.0 - 1.0)
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits() + self.misses();
        if total == 0 {
            0.0
        } else {
            self.hits() as f64 / total as f64
        }
    }

    /// Snapshot for serialization
    pub fn report(&self) -> CacheStatsReport {
        CacheStatsReport {
            hits: self.hits(),
            misses: self.misses(),
            writes: self.writes(),
            hit_rate: self.hit_rate(),
        }
    }
}

/// Serializable cache statistics snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStatsReport {
    pub hits: u64,
    pub misses: u64,
    pub writes: u64,
    pub hit_rate: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use limn_core::StrategyMode;

    #[tokio::test]
    async fn test_put_then_get() {
        let cache = OutcomeCache::new();
        assert!(cache.get(42).await.is_none());

        cache
            .put(42, ExtractionOutcome::empty(StrategyMode::Parallel))
            .await;
        let hit = cache.get(42).await;
        assert!(hit.is_some());
        assert_eq!(hit.unwrap().strategy_used, StrategyMode::Parallel);
    }

    #[tokio::test]
    async fn test_stats_track_hits_and_misses() {
        let cache = OutcomeCache::new();
        cache.get(1).await;
        cache.put(1, ExtractionOutcome::empty(StrategyMode::Single)).await;
        cache.get(1).await;

        let stats = cache.stats();
        assert_eq!(stats.hits(), 1);
        assert_eq!(stats.misses(), 1);
        assert_eq!(stats.writes(), 1);
        assert!((stats.hit_rate() - 0.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_different_keys_are_distinct() {
        let cache = OutcomeCache::new();
        cache.put(7, ExtractionOutcome::empty(StrategyMode::Single)).await;
        assert!(cache.get(8).await.is_none());
    }
}
