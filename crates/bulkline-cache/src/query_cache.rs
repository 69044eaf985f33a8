//! Keyed JSON cache with observer tracking.
//!
//! An entry is *active* while at least one [`Observer`] for it is alive.
//! Eviction never touches active entries.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use serde_json::Value;

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub value: Value,
    pub updated_at: Instant,
    observers: Arc<()>,
}

impl CacheEntry {
    fn new(value: Value, updated_at: Instant) -> Self {
        Self {
            value,
            updated_at,
            observers: Arc::new(()),
        }
    }

    pub fn is_active(&self) -> bool {
        Arc::strong_count(&self.observers) > 1
    }

    pub fn observer_count(&self) -> usize {
        Arc::strong_count(&self.observers) - 1
    }
}

/// Keeps a cache entry active until dropped.
#[derive(Debug)]
pub struct Observer {
    key: String,
    _token: Arc<()>,
}

impl Observer {
    pub fn key(&self) -> &str {
        &self.key
    }
}

#[derive(Debug, Default)]
pub struct QueryCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock the map, recovering it from a poisoned mutex.
    pub(crate) fn lock(&self) -> MutexGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.lock().get(key).map(|e| e.value.clone())
    }

    pub fn insert(&self, key: impl Into<String>, value: Value) {
        self.insert_at(key, value, Instant::now());
    }

    /// Insert or replace a value. Observers of an existing entry stay attached.
    pub fn insert_at(&self, key: impl Into<String>, value: Value, at: Instant) {
        let mut entries = self.lock();
        match entries.entry(key.into()) {
            std::collections::hash_map::Entry::Occupied(mut slot) => {
                let entry = slot.get_mut();
                entry.value = value;
                entry.updated_at = at;
            }
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(CacheEntry::new(value, at));
            }
        }
    }

    /// Value and last update time of an entry.
    pub fn get_entry(&self, key: &str) -> Option<(Value, Instant)> {
        self.lock().get(key).map(|e| (e.value.clone(), e.updated_at))
    }

    /// Mark an entry as in use. Returns `None` if the key is not cached.
    pub fn observe(&self, key: &str) -> Option<Observer> {
        self.lock().get(key).map(|e| Observer {
            key: key.to_owned(),
            _token: Arc::clone(&e.observers),
        })
    }

    pub fn remove(&self, key: &str) -> bool {
        self.lock().remove(key).is_some()
    }

    pub fn keys(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn observer_marks_entry_active_until_dropped() {
        let cache = QueryCache::new();
        cache.insert("analytics:1", json!({ "contacts": 3 }));

        let observer = cache.observe("analytics:1").unwrap();
        assert_eq!(observer.key(), "analytics:1");
        assert!(cache.lock()["analytics:1"].is_active());

        drop(observer);
        assert!(!cache.lock()["analytics:1"].is_active());
    }

    #[test]
    fn replacing_value_keeps_observers() {
        let cache = QueryCache::new();
        cache.insert("k", json!(1));
        let _observer = cache.observe("k").unwrap();
        cache.insert("k", json!(2));

        assert_eq!(cache.get("k"), Some(json!(2)));
        assert_eq!(cache.lock()["k"].observer_count(), 1);
    }

    #[test]
    fn observe_missing_key_is_none() {
        assert!(QueryCache::new().observe("nope").is_none());
    }
}
