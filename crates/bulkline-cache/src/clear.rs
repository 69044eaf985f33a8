//! Selective clearing of the cache and both storage areas.
//!
//! Preservation is a plain substring match on the cache key: any key
//! containing `auth` or `user` is kept when `preserve_auth` is set, so
//! unrelated keys that happen to contain those words survive too. Storage
//! areas are always wiped.

use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::PerformanceContext;

pub const PRESERVED_KEY_FRAGMENTS: &[&str] = &["auth", "user"];

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ClearOptions {
    /// Keep entries whose key mentions `auth` or `user`
    #[serde(default)]
    pub preserve_auth: bool,
    /// Keep entries updated within the recent window
    #[serde(default)]
    pub preserve_recent: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ClearReport {
    pub cache_removed: usize,
    pub cache_preserved: usize,
    pub local_removed: usize,
    pub session_removed: usize,
}

pub fn is_auth_key(key: &str) -> bool {
    PRESERVED_KEY_FRAGMENTS.iter().any(|f| key.contains(f))
}

impl PerformanceContext {
    pub fn selective_clear(&self, options: ClearOptions) -> ClearReport {
        self.selective_clear_at(options, Instant::now())
    }

    pub fn selective_clear_at(&self, options: ClearOptions, now: Instant) -> ClearReport {
        let recent_window = self.settings.recent_window;
        let mut report = ClearReport::default();

        {
            let mut entries = self.cache.lock();
            let before = entries.len();
            entries.retain(|key, entry| {
                (options.preserve_auth && is_auth_key(key))
                    || (options.preserve_recent
                        && now.saturating_duration_since(entry.updated_at) <= recent_window)
            });
            report.cache_preserved = entries.len();
            report.cache_removed = before - entries.len();
        }

        report.local_removed = self.local.clear();
        report.session_removed = self.session.clear();

        tracing::info!(
            cache_removed = report.cache_removed,
            cache_preserved = report.cache_preserved,
            local_removed = report.local_removed,
            session_removed = report.session_removed,
            "Performance context cleared"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PerformanceSettings;
    use serde_json::json;
    use std::time::Duration;

    fn seeded(t0: Instant) -> PerformanceContext {
        let ctx = PerformanceContext::new(PerformanceSettings::default());
        ctx.cache.insert_at("auth:session", json!(1), t0);
        ctx.cache.insert_at("user:42:profile", json!(2), t0);
        ctx.cache.insert_at("analytics:42", json!(3), t0);
        ctx.cache.insert_at("services:catalog", json!(4), t0 + Duration::from_secs(100));
        ctx.local.set("prefs:42:theme", "dark");
        ctx.session.set("flag", "1");
        ctx
    }

    #[test]
    fn full_clear_wipes_everything() {
        let t0 = Instant::now();
        let ctx = seeded(t0);
        let report = ctx.selective_clear_at(ClearOptions::default(), t0 + Duration::from_secs(120));
        assert_eq!(report.cache_removed, 4);
        assert!(ctx.cache.is_empty());
        assert!(ctx.local.is_empty());
        assert!(ctx.session.is_empty());
    }

    #[test]
    fn preserves_auth_and_user_keys() {
        let t0 = Instant::now();
        let ctx = seeded(t0);
        let options = ClearOptions {
            preserve_auth: true,
            preserve_recent: false,
        };
        let report = ctx.selective_clear_at(options, t0 + Duration::from_secs(120));

        let mut keys = ctx.cache.keys();
        keys.sort();
        assert_eq!(keys, vec!["auth:session", "user:42:profile"]);
        assert_eq!(report.cache_preserved, 2);
        assert_eq!(report.local_removed, 1);
    }

    #[test]
    fn preserves_recently_updated_entries() {
        let t0 = Instant::now();
        let ctx = seeded(t0);
        let options = ClearOptions {
            preserve_auth: false,
            preserve_recent: true,
        };
        ctx.selective_clear_at(options, t0 + Duration::from_secs(130));
        assert_eq!(ctx.cache.keys(), vec!["services:catalog".to_string()]);
    }

    #[test]
    fn substring_match_is_not_structural() {
        assert!(is_auth_key("reports:superuser-list"));
        assert!(!is_auth_key("campaigns:7"));
    }
}
