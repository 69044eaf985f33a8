//! # bulkline-cache
//!
//! Process-local performance layer: a keyed query cache with priority
//! eviction, two storage areas, a fixed-window request tracker, and
//! request/cache metrics.
//!
//! Everything hangs off one [`PerformanceContext`] owned by the server and
//! shared through `AppState`. Nothing is global; tests build their own
//! context or call [`PerformanceContext::reset`].
//!
//! Internal failures never surface to callers. A poisoned lock is recovered,
//! an unserializable value counts as zero bytes.

pub mod backoff;
pub mod clear;
pub mod estimate;
pub mod eviction;
pub mod maintenance;
pub mod metrics;
pub mod query_cache;
pub mod rate;
pub mod storage;

use std::future::Future;
use std::time::{Duration, Instant};

use serde::{de::DeserializeOwned, Serialize};

pub use clear::{ClearOptions, ClearReport};
pub use estimate::CacheEstimate;
pub use eviction::{EvictionPriority, EvictionReport};
pub use metrics::{MetricsRecorder, MetricsSnapshot};
pub use query_cache::{Observer, QueryCache};
pub use rate::{RateStats, RateTracker};
pub use storage::StorageArea;

/// Thresholds and limits for a [`PerformanceContext`].
#[derive(Debug, Clone)]
pub struct PerformanceSettings {
    /// Entries whose JSON form exceeds this many bytes count as large
    pub large_entry_bytes: usize,
    /// Entries not updated for this long count as stale
    pub stale_after: Duration,
    /// Window used by `ClearOptions::preserve_recent`
    pub recent_window: Duration,
    pub rate_limit: u32,
    pub rate_window: Duration,
}

impl Default for PerformanceSettings {
    fn default() -> Self {
        Self {
            large_entry_bytes: 1024 * 1024,
            stale_after: Duration::from_secs(300),
            recent_window: Duration::from_secs(60),
            rate_limit: 500,
            rate_window: Duration::from_secs(60),
        }
    }
}

/// Aggregate view served by the admin performance endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct PerformanceSnapshot {
    pub cache_entries: usize,
    pub cache_bytes: usize,
    pub large_entries: usize,
    pub stale_entries: usize,
    pub active_entries: usize,
    pub local_items: usize,
    pub session_items: usize,
    pub rate: RateStats,
    pub metrics: MetricsSnapshot,
}

#[derive(Debug)]
pub struct PerformanceContext {
    pub settings: PerformanceSettings,
    pub cache: QueryCache,
    pub local: StorageArea,
    pub session: StorageArea,
    pub rate: RateTracker,
    pub metrics: MetricsRecorder,
}

impl PerformanceContext {
    pub fn new(settings: PerformanceSettings) -> Self {
        let rate = RateTracker::new(settings.rate_limit, settings.rate_window);
        Self {
            settings,
            cache: QueryCache::new(),
            local: StorageArea::new("local"),
            session: StorageArea::new("session"),
            rate,
            metrics: MetricsRecorder::new(),
        }
    }

    /// Return every component to its initial state.
    pub fn reset(&self) {
        self.cache.clear();
        self.local.clear();
        self.session.clear();
        self.rate.reset_at(Instant::now());
        self.metrics.reset();
    }

    /// Serve `key` from the cache, or run `load` and cache its result.
    ///
    /// Only entries younger than `stale_after` count as hits. The entry is
    /// observed for the whole call, so eviction skips it while a reader is
    /// deserializing it or a stale copy is being reloaded. Unreadable cached
    /// values are reloaded.
    pub async fn read_through<T, E, F, Fut>(&self, key: &str, load: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let _observer = self.cache.observe(key);

        let fresh = self
            .cache
            .get_entry(key)
            .filter(|(_, at)| at.elapsed() < self.settings.stale_after);
        if let Some((value, _)) = fresh {
            match serde_json::from_value(value) {
                Ok(hit) => {
                    self.metrics.record_hit();
                    return Ok(hit);
                }
                Err(e) => tracing::warn!(key, error = %e, "Discarding unreadable cache entry"),
            }
        }

        self.metrics.record_miss();
        let loaded = load().await?;
        self.store(key, &loaded);
        Ok(loaded)
    }

    /// Serialize and store a value. Values that fail to serialize are not cached.
    pub fn store<T: Serialize>(&self, key: impl Into<String>, value: &T) {
        match serde_json::to_value(value) {
            Ok(v) => self.cache.insert(key, v),
            Err(e) => tracing::warn!(error = %e, "Skipping cache write for unserializable value"),
        }
    }

    pub fn estimate(&self) -> CacheEstimate {
        estimate::estimate(&self.cache, &self.settings, Instant::now())
    }

    pub fn evict(&self) -> EvictionReport {
        self.evict_at(Instant::now())
    }

    pub fn evict_at(&self, now: Instant) -> EvictionReport {
        eviction::evict(&self.cache, &self.settings, now)
    }

    pub fn snapshot(&self) -> PerformanceSnapshot {
        let now = Instant::now();
        let est = estimate::estimate(&self.cache, &self.settings, now);
        PerformanceSnapshot {
            cache_entries: est.entry_count(),
            cache_bytes: est.total_bytes,
            large_entries: est.large_entries,
            stale_entries: est.stale_entries,
            active_entries: est.active_entries,
            local_items: self.local.len(),
            session_items: self.session.len(),
            rate: self.rate.stats_at(now),
            metrics: self.metrics.snapshot(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[tokio::test]
    async fn read_through_counts_hits_and_misses() {
        let ctx = PerformanceContext::new(PerformanceSettings::default());

        let first: Result<Vec<String>, ()> = ctx
            .read_through("services:catalog", || async { Ok(vec!["sms".to_string()]) })
            .await;
        assert_eq!(first.unwrap(), vec!["sms"]);

        let second: Result<Vec<String>, ()> = ctx
            .read_through("services:catalog", || async { Err(()) })
            .await;
        assert_eq!(second.unwrap(), vec!["sms"]);

        let snap = ctx.snapshot();
        assert_eq!(snap.metrics.cache_hits, 1);
        assert_eq!(snap.metrics.cache_misses, 1);
        assert_eq!(snap.cache_entries, 1);
        assert_eq!(snap.active_entries, 0);
    }

    #[tokio::test]
    async fn stale_entry_is_observed_while_it_reloads() {
        let ctx = PerformanceContext::new(PerformanceSettings {
            stale_after: Duration::from_secs(60),
            ..PerformanceSettings::default()
        });
        let old = Instant::now()
            .checked_sub(Duration::from_secs(120))
            .unwrap_or_else(Instant::now);
        ctx.cache
            .insert_at("analytics:dashboard:u1", json!({ "contacts": 1 }), old);

        let reloaded: Result<Value, ()> = ctx
            .read_through("analytics:dashboard:u1", || async {
                let during = ctx.snapshot();
                assert_eq!(during.active_entries, 1);
                // A maintenance pass mid-reload leaves the observed entry alone.
                assert!(ctx.evict().evicted.is_empty());
                Ok(json!({ "contacts": 2 }))
            })
            .await;

        assert_eq!(reloaded.unwrap(), json!({ "contacts": 2 }));
        assert_eq!(ctx.snapshot().active_entries, 0);
        assert_eq!(ctx.cache.get("analytics:dashboard:u1"), Some(json!({ "contacts": 2 })));
    }

    #[test]
    fn reset_returns_to_initial_state() {
        let ctx = PerformanceContext::new(PerformanceSettings {
            rate_limit: 1,
            ..PerformanceSettings::default()
        });
        ctx.store("k", &1);
        ctx.local.set("a", "b");
        ctx.rate.track_request("ip");
        ctx.rate.track_request("ip");
        assert!(ctx.rate.is_throttled("ip"));

        ctx.reset();

        assert!(ctx.cache.is_empty());
        assert!(ctx.local.is_empty());
        assert!(!ctx.rate.is_throttled("ip"));
        assert_eq!(ctx.metrics.snapshot().cache_misses, 0);
    }
}
