//! Priority eviction of inactive cache entries.
//!
//! | priority | condition       |
//! |----------|-----------------|
//! | high     | large and stale |
//! | medium   | stale only      |
//! | low      | large only      |
//!
//! Entries that are neither large nor stale stay. Active entries stay
//! regardless of size or age. Order within a tier is unspecified.

use std::time::Instant;

use serde::Serialize;

use crate::{
    estimate::{estimate, CacheEstimate, EntryEstimate},
    query_cache::QueryCache,
    PerformanceSettings,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EvictionPriority {
    High,
    Medium,
    Low,
}

pub fn classify(entry: &EntryEstimate) -> Option<EvictionPriority> {
    if entry.is_active {
        return None;
    }
    match (entry.is_large, entry.is_stale) {
        (true, true) => Some(EvictionPriority::High),
        (false, true) => Some(EvictionPriority::Medium),
        (true, false) => Some(EvictionPriority::Low),
        (false, false) => None,
    }
}

/// Keys to remove, grouped by priority.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EvictionPlan {
    pub high: Vec<String>,
    pub medium: Vec<String>,
    pub low: Vec<String>,
}

impl EvictionPlan {
    pub fn from_estimate(estimate: &CacheEstimate) -> Self {
        let mut plan = Self::default();
        for entry in &estimate.entries {
            match classify(entry) {
                Some(EvictionPriority::High) => plan.high.push(entry.key.clone()),
                Some(EvictionPriority::Medium) => plan.medium.push(entry.key.clone()),
                Some(EvictionPriority::Low) => plan.low.push(entry.key.clone()),
                None => {}
            }
        }
        plan
    }

    /// All keys, high priority first.
    pub fn ordered(&self) -> impl Iterator<Item = &String> {
        self.high.iter().chain(&self.medium).chain(&self.low)
    }

    pub fn len(&self) -> usize {
        self.high.len() + self.medium.len() + self.low.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct EvictionReport {
    /// Keys actually removed, in removal order
    pub evicted: Vec<String>,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub bytes_before: usize,
}

/// Estimate, plan, and remove. An entry that gained an observer between
/// planning and removal is skipped.
pub fn evict(cache: &QueryCache, settings: &PerformanceSettings, now: Instant) -> EvictionReport {
    let est = estimate(cache, settings, now);
    let plan = EvictionPlan::from_estimate(&est);

    let mut report = EvictionReport {
        bytes_before: est.total_bytes,
        ..EvictionReport::default()
    };
    if plan.is_empty() {
        return report;
    }

    let mut entries = cache.lock();
    let tiers = [
        (EvictionPriority::High, &plan.high),
        (EvictionPriority::Medium, &plan.medium),
        (EvictionPriority::Low, &plan.low),
    ];
    for (priority, keys) in tiers {
        for key in keys {
            let removable = entries.get(key).is_some_and(|e| !e.is_active());
            if removable && entries.remove(key).is_some() {
                report.evicted.push(key.clone());
                match priority {
                    EvictionPriority::High => report.high += 1,
                    EvictionPriority::Medium => report.medium += 1,
                    EvictionPriority::Low => report.low += 1,
                }
            }
        }
    }
    drop(entries);

    if !report.evicted.is_empty() {
        tracing::debug!(
            high = report.high,
            medium = report.medium,
            low = report.low,
            "Evicted cache entries"
        );
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    fn settings() -> PerformanceSettings {
        PerformanceSettings {
            large_entry_bytes: 10,
            stale_after: Duration::from_secs(300),
            ..PerformanceSettings::default()
        }
    }

    const BIG: &str = "this value is definitely large";

    #[test]
    fn large_and_stale_evicted_before_stale_only() {
        let cache = QueryCache::new();
        let t0 = Instant::now();
        cache.insert_at("old-small", json!(1), t0);
        cache.insert_at("old-big", json!(BIG), t0);
        cache.insert_at("new-big", json!(BIG), t0 + Duration::from_secs(400));
        cache.insert_at("new-small", json!(2), t0 + Duration::from_secs(400));

        let now = t0 + Duration::from_secs(500);
        let report = evict(&cache, &settings(), now);

        assert_eq!(report.evicted, vec!["old-big", "old-small", "new-big"]);
        assert_eq!((report.high, report.medium, report.low), (1, 1, 1));
        assert_eq!(cache.keys(), vec!["new-small".to_string()]);
    }

    #[test]
    fn active_entries_are_never_evicted() {
        let cache = QueryCache::new();
        let t0 = Instant::now();
        cache.insert_at("watched", json!(BIG), t0);
        let _observer = cache.observe("watched").unwrap();

        let report = evict(&cache, &settings(), t0 + Duration::from_secs(10_000));
        assert!(report.evicted.is_empty());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn plan_orders_tiers() {
        let cache = QueryCache::new();
        let t0 = Instant::now();
        cache.insert_at("low", json!(BIG), t0 + Duration::from_secs(400));
        cache.insert_at("medium", json!(0), t0);
        cache.insert_at("high", json!(BIG), t0);

        let est = estimate(&cache, &settings(), t0 + Duration::from_secs(450));
        let plan = EvictionPlan::from_estimate(&est);
        let order: Vec<&str> = plan.ordered().map(String::as_str).collect();
        assert_eq!(order, vec!["high", "medium", "low"]);
    }
}
