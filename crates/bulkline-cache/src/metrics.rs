//! Request latency, cache hit/miss, and throughput metrics.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use serde::Serialize;

const MAX_LATENCY_SAMPLES: usize = 1_000;
const MAX_THROUGHPUT_SAMPLES: usize = 120;

#[derive(Debug, Clone, Copy, Serialize)]
pub struct ThroughputSample {
    pub requests: u64,
    pub elapsed_ms: u64,
    pub requests_per_sec: f64,
}

#[derive(Debug)]
struct Samples {
    latencies_ms: VecDeque<u64>,
    throughput: VecDeque<ThroughputSample>,
    last_sample_at: Instant,
    requests_at_last_sample: u64,
}

impl Samples {
    fn new(now: Instant) -> Self {
        Self {
            latencies_ms: VecDeque::with_capacity(MAX_LATENCY_SAMPLES),
            throughput: VecDeque::with_capacity(MAX_THROUGHPUT_SAMPLES),
            last_sample_at: now,
            requests_at_last_sample: 0,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MetricsSnapshot {
    pub requests_total: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub cache_hit_rate: f64,
    pub latency_avg_ms: f64,
    pub latency_p95_ms: u64,
    pub latency_max_ms: u64,
    pub throughput_rps: f64,
    pub throughput_samples: Vec<ThroughputSample>,
}

#[derive(Debug)]
pub struct MetricsRecorder {
    requests: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    samples: Mutex<Samples>,
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self {
            requests: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            samples: Mutex::new(Samples::new(Instant::now())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Samples> {
        self.samples.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record one completed request and its latency.
    pub fn record_request(&self, latency: Duration) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        let ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
        let mut samples = self.lock();
        if samples.latencies_ms.len() == MAX_LATENCY_SAMPLES {
            samples.latencies_ms.pop_front();
        }
        samples.latencies_ms.push_back(ms);
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Take a throughput sample covering the time since the previous one.
    pub fn sample_throughput_at(&self, now: Instant) -> ThroughputSample {
        let total = self.requests.load(Ordering::Relaxed);
        let mut samples = self.lock();

        let elapsed = now.saturating_duration_since(samples.last_sample_at);
        let requests = total.saturating_sub(samples.requests_at_last_sample);
        let secs = elapsed.as_secs_f64();
        let sample = ThroughputSample {
            requests,
            elapsed_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            requests_per_sec: if secs > 0.0 { requests as f64 / secs } else { 0.0 },
        };

        samples.last_sample_at = now;
        samples.requests_at_last_sample = total;
        if samples.throughput.len() == MAX_THROUGHPUT_SAMPLES {
            samples.throughput.pop_front();
        }
        samples.throughput.push_back(sample);
        sample
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let samples = self.lock();

        let mut sorted: Vec<u64> = samples.latencies_ms.iter().copied().collect();
        sorted.sort_unstable();
        let latency_avg_ms = if sorted.is_empty() {
            0.0
        } else {
            sorted.iter().sum::<u64>() as f64 / sorted.len() as f64
        };
        let latency_p95_ms = percentile(&sorted, 95);
        let lookups = hits + misses;

        MetricsSnapshot {
            requests_total: self.requests.load(Ordering::Relaxed),
            cache_hits: hits,
            cache_misses: misses,
            cache_hit_rate: if lookups == 0 { 0.0 } else { hits as f64 / lookups as f64 },
            latency_avg_ms,
            latency_p95_ms,
            latency_max_ms: sorted.last().copied().unwrap_or(0),
            throughput_rps: samples.throughput.back().map(|s| s.requests_per_sec).unwrap_or(0.0),
            throughput_samples: samples.throughput.iter().copied().collect(),
        }
    }

    pub fn reset(&self) {
        self.requests.store(0, Ordering::Relaxed);
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        *self.lock() = Samples::new(Instant::now());
    }
}

/// Nearest-rank percentile over sorted samples.
fn percentile(sorted: &[u64], pct: usize) -> u64 {
    if sorted.is_empty() {
        return 0;
    }
    let rank = (pct * sorted.len()).div_ceil(100).max(1);
    sorted[rank.min(sorted.len()) - 1]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_rate_and_latency_stats() {
        let m = MetricsRecorder::new();
        m.record_hit();
        m.record_hit();
        m.record_hit();
        m.record_miss();
        for ms in 1..=100 {
            m.record_request(Duration::from_millis(ms));
        }

        let snap = m.snapshot();
        assert_eq!(snap.requests_total, 100);
        assert!((snap.cache_hit_rate - 0.75).abs() < f64::EPSILON);
        assert_eq!(snap.latency_p95_ms, 95);
        assert_eq!(snap.latency_max_ms, 100);
        assert!((snap.latency_avg_ms - 50.5).abs() < 1e-9);
    }

    #[test]
    fn throughput_covers_interval_since_last_sample() {
        let m = MetricsRecorder::new();
        let t0 = Instant::now();
        m.sample_throughput_at(t0);
        for _ in 0..20 {
            m.record_request(Duration::from_millis(1));
        }
        let s = m.sample_throughput_at(t0 + Duration::from_secs(10));
        assert_eq!(s.requests, 20);
        assert!((s.requests_per_sec - 2.0).abs() < 1e-9);
        assert!((m.snapshot().throughput_rps - 2.0).abs() < 1e-9);
    }

    #[test]
    fn empty_snapshot_is_zeroed() {
        let snap = MetricsRecorder::new().snapshot();
        assert_eq!(snap.requests_total, 0);
        assert_eq!(snap.cache_hit_rate, 0.0);
        assert_eq!(snap.latency_p95_ms, 0);
    }
}
