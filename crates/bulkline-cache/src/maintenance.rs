//! Periodic housekeeping for a [`PerformanceContext`].
//!
//! Each tick evicts cache entries, rolls the rate window if it has elapsed,
//! and takes a throughput sample. Runs until `cancel` is triggered.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::PerformanceContext;

#[derive(Debug, Clone, Serialize)]
pub struct MaintenanceReport {
    pub evicted: usize,
    pub window_rolled: bool,
    pub requests_per_sec: f64,
}

pub fn run_tick(ctx: &PerformanceContext, now: Instant) -> MaintenanceReport {
    let eviction = ctx.evict_at(now);
    let window_rolled = ctx.rate.roll_window_at(now);
    let sample = ctx.metrics.sample_throughput_at(now);

    MaintenanceReport {
        evicted: eviction.evicted.len(),
        window_rolled,
        requests_per_sec: sample.requests_per_sec,
    }
}

pub async fn run(ctx: Arc<PerformanceContext>, every: Duration, cancel: CancellationToken) {
    tracing::info!(interval_secs = every.as_secs(), "Cache maintenance started");

    let mut interval = tokio::time::interval(every);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Cache maintenance stopping");
                break;
            }
            _ = interval.tick() => {
                let report = run_tick(&ctx, Instant::now());
                if report.evicted > 0 || report.window_rolled {
                    tracing::debug!(
                        evicted = report.evicted,
                        window_rolled = report.window_rolled,
                        rps = report.requests_per_sec,
                        "Cache maintenance tick"
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PerformanceSettings;
    use serde_json::json;

    #[test]
    fn tick_evicts_and_rolls_window() {
        let ctx = PerformanceContext::new(PerformanceSettings {
            stale_after: Duration::from_secs(300),
            rate_limit: 1,
            rate_window: Duration::from_secs(60),
            ..PerformanceSettings::default()
        });
        let t0 = Instant::now();
        ctx.rate.reset_at(t0);
        ctx.cache.insert_at("analytics:1", json!(1), t0);
        assert!(ctx.rate.track_request_at("u", t0));
        assert!(!ctx.rate.track_request_at("u", t0));

        let report = run_tick(&ctx, t0 + Duration::from_secs(301));
        assert_eq!(report.evicted, 1);
        assert!(report.window_rolled);
        assert!(!ctx.rate.is_throttled("u"));
    }

    #[tokio::test]
    async fn stops_on_cancel() {
        let ctx = Arc::new(PerformanceContext::new(PerformanceSettings::default()));
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run(ctx, Duration::from_millis(10), cancel.clone()));
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("maintenance loop should stop")
            .unwrap();
    }
}
