//! Fixed-window request counter.
//!
//! Each identifier may make `limit` requests per window. The request that
//! crosses the limit throttles the identifier until the window resets; a
//! reset clears both the counts and the throttled set. State is process-local.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use serde::Serialize;

#[derive(Debug)]
struct Window {
    started: Instant,
    counts: HashMap<String, u32>,
    throttled: HashSet<String>,
}

impl Window {
    fn new(started: Instant) -> Self {
        Self {
            started,
            counts: HashMap::new(),
            throttled: HashSet::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RateStats {
    pub limit: u32,
    pub window_ms: u64,
    pub window_remaining_ms: u64,
    pub tracked_identifiers: usize,
    pub throttled_identifiers: usize,
}

#[derive(Debug)]
pub struct RateTracker {
    limit: u32,
    window: Duration,
    state: Mutex<Window>,
}

impl RateTracker {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            state: Mutex::new(Window::new(Instant::now())),
        }
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    fn lock(&self) -> MutexGuard<'_, Window> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn track_request(&self, identifier: &str) -> bool {
        self.track_request_at(identifier, Instant::now())
    }

    /// Count one request. Returns `false` once the identifier is over its limit.
    pub fn track_request_at(&self, identifier: &str, now: Instant) -> bool {
        let mut state = self.lock();
        self.roll(&mut state, now);

        if state.throttled.contains(identifier) {
            return false;
        }

        let count = state.counts.entry(identifier.to_owned()).or_insert(0);
        *count = count.saturating_add(1);
        if *count > self.limit {
            state.throttled.insert(identifier.to_owned());
            tracing::warn!(identifier, limit = self.limit, "Request rate limit exceeded");
            return false;
        }
        true
    }

    pub fn is_throttled(&self, identifier: &str) -> bool {
        self.lock().throttled.contains(identifier)
    }

    /// Time until the current window ends.
    pub fn retry_after_at(&self, now: Instant) -> Duration {
        let state = self.lock();
        (state.started + self.window).saturating_duration_since(now)
    }

    pub fn retry_after(&self) -> Duration {
        self.retry_after_at(Instant::now())
    }

    /// Start a new window if the current one has elapsed. Returns whether it did.
    pub fn roll_window_at(&self, now: Instant) -> bool {
        let mut state = self.lock();
        self.roll(&mut state, now)
    }

    /// Unconditionally start a new window.
    pub fn reset_at(&self, now: Instant) {
        *self.lock() = Window::new(now);
    }

    fn roll(&self, state: &mut Window, now: Instant) -> bool {
        if now.saturating_duration_since(state.started) < self.window {
            return false;
        }
        *state = Window::new(now);
        true
    }

    pub fn stats_at(&self, now: Instant) -> RateStats {
        let state = self.lock();
        RateStats {
            limit: self.limit,
            window_ms: duration_ms(self.window),
            window_remaining_ms: duration_ms(
                (state.started + self.window).saturating_duration_since(now),
            ),
            tracked_identifiers: state.counts.len(),
            throttled_identifiers: state.throttled.len(),
        }
    }
}

pub(crate) fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_limit_then_throttles() {
        let t0 = Instant::now();
        let tracker = RateTracker::new(500, Duration::from_secs(60));
        tracker.reset_at(t0);

        for i in 1..=500 {
            assert!(tracker.track_request_at("user-1", t0), "request {i} should pass");
        }
        assert!(!tracker.track_request_at("user-1", t0));
        assert!(tracker.is_throttled("user-1"));
        assert!(!tracker.track_request_at("user-1", t0 + Duration::from_secs(30)));

        // Other identifiers are unaffected.
        assert!(tracker.track_request_at("user-2", t0));
    }

    #[test]
    fn window_reset_clears_throttle() {
        let t0 = Instant::now();
        let tracker = RateTracker::new(2, Duration::from_secs(60));
        tracker.reset_at(t0);

        assert!(tracker.track_request_at("ip", t0));
        assert!(tracker.track_request_at("ip", t0));
        assert!(!tracker.track_request_at("ip", t0));

        assert!(tracker.track_request_at("ip", t0 + Duration::from_secs(60)));
        assert!(!tracker.is_throttled("ip"));
    }

    #[test]
    fn retry_after_counts_down() {
        let t0 = Instant::now();
        let tracker = RateTracker::new(1, Duration::from_secs(60));
        tracker.reset_at(t0);
        assert_eq!(
            tracker.retry_after_at(t0 + Duration::from_secs(15)),
            Duration::from_secs(45)
        );
        assert!(!tracker.roll_window_at(t0 + Duration::from_secs(59)));
        assert!(tracker.roll_window_at(t0 + Duration::from_secs(61)));
    }
}
