//! Cache footprint estimation.
//!
//! Each entry is serialized to JSON text and its length taken as the byte
//! size. This is an approximation and a pure read.

use std::time::{Duration, Instant};

use serde::Serialize;

use crate::{query_cache::QueryCache, PerformanceSettings};

#[derive(Debug, Clone, Serialize)]
pub struct EntryEstimate {
    pub key: String,
    pub bytes: usize,
    #[serde(rename = "age_ms")]
    #[serde(serialize_with = "as_millis")]
    pub age: Duration,
    pub is_large: bool,
    pub is_stale: bool,
    pub is_active: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheEstimate {
    pub entries: Vec<EntryEstimate>,
    pub total_bytes: usize,
    pub large_entries: usize,
    pub stale_entries: usize,
    pub active_entries: usize,
}

impl CacheEstimate {
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }
}

pub fn estimate(cache: &QueryCache, settings: &PerformanceSettings, now: Instant) -> CacheEstimate {
    let entries = cache.lock();
    let mut out = CacheEstimate::default();

    for (key, entry) in entries.iter() {
        // A value that cannot be serialized counts as empty.
        let bytes = serde_json::to_string(&entry.value).map(|s| s.len()).unwrap_or(0);
        let age = now.saturating_duration_since(entry.updated_at);
        let est = EntryEstimate {
            key: key.clone(),
            bytes,
            age,
            is_large: bytes > settings.large_entry_bytes,
            is_stale: age > settings.stale_after,
            is_active: entry.is_active(),
        };

        out.total_bytes += est.bytes;
        out.large_entries += usize::from(est.is_large);
        out.stale_entries += usize::from(est.is_stale);
        out.active_entries += usize::from(est.is_active);
        out.entries.push(est);
    }

    out
}

fn as_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn settings() -> PerformanceSettings {
        PerformanceSettings {
            large_entry_bytes: 16,
            stale_after: Duration::from_secs(300),
            ..PerformanceSettings::default()
        }
    }

    #[test]
    fn flags_large_and_stale_entries() {
        let cache = QueryCache::new();
        let t0 = Instant::now();
        cache.insert_at("small", json!(1), t0);
        cache.insert_at("big", json!("a string that is well over sixteen bytes"), t0);

        let fresh = estimate(&cache, &settings(), t0 + Duration::from_secs(10));
        assert_eq!(fresh.entry_count(), 2);
        assert_eq!(fresh.large_entries, 1);
        assert_eq!(fresh.stale_entries, 0);

        let later = estimate(&cache, &settings(), t0 + Duration::from_secs(301));
        assert_eq!(later.stale_entries, 2);
        assert!(later.total_bytes > 16);
    }

    #[test]
    fn byte_size_is_json_length() {
        let cache = QueryCache::new();
        cache.insert("k", json!({ "a": 1 }));
        let est = estimate(&cache, &settings(), Instant::now());
        assert_eq!(est.entries[0].bytes, r#"{"a":1}"#.len());
    }

    #[test]
    fn empty_cache_estimates_zero() {
        let est = estimate(&QueryCache::new(), &settings(), Instant::now());
        assert_eq!(est.total_bytes, 0);
        assert!(est.entries.is_empty());
    }
}
