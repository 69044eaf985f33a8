//! Named key/value storage areas (`local` and `session`).

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug)]
pub struct StorageArea {
    name: &'static str,
    items: Mutex<BTreeMap<String, String>>,
}

impl StorageArea {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            items: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, String>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.lock().get(key).cloned()
    }

    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        self.lock().insert(key.into(), value.into());
    }

    pub fn remove(&self, key: &str) -> Option<String> {
        self.lock().remove(key)
    }

    /// Every item whose key starts with `prefix`, in key order.
    pub fn scan_prefix(&self, prefix: &str) -> Vec<(String, String)> {
        self.lock()
            .range(prefix.to_owned()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Remove everything; returns how many items were dropped.
    pub fn clear(&self) -> usize {
        let mut items = self.lock();
        let n = items.len();
        items.clear();
        n
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_prefix_stops_at_boundary() {
        let area = StorageArea::new("local");
        area.set("prefs:a:theme", "dark");
        area.set("prefs:a:lang", "sw");
        area.set("prefs:b:theme", "light");

        let items = area.scan_prefix("prefs:a:");
        assert_eq!(
            items,
            vec![
                ("prefs:a:lang".to_string(), "sw".to_string()),
                ("prefs:a:theme".to_string(), "dark".to_string()),
            ]
        );
    }

    #[test]
    fn clear_reports_count() {
        let area = StorageArea::new("session");
        area.set("a", "1");
        area.set("b", "2");
        assert_eq!(area.clear(), 2);
        assert!(area.is_empty());
        assert_eq!(area.name(), "session");
    }
}
