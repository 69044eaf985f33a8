//! Exponential backoff with jitter.

use std::time::Duration;

use rand::Rng;

pub const BASE_DELAY_MS: u64 = 1_000;
pub const MAX_JITTER_MS: u64 = 1_000;
pub const MAX_DELAY_MS: u64 = 30_000;

/// `BASE_DELAY_MS * 2^retry` plus random jitter in `[0, MAX_JITTER_MS)`, capped.
pub fn backoff_delay(retry: u32) -> Duration {
    let jitter = rand::rng().random_range(0..MAX_JITTER_MS);
    backoff_delay_with_jitter(retry, jitter)
}

/// Deterministic form of [`backoff_delay`].
pub fn backoff_delay_with_jitter(retry: u32, jitter_ms: u64) -> Duration {
    let exp = 1u64.checked_shl(retry).unwrap_or(u64::MAX);
    let ms = BASE_DELAY_MS
        .saturating_mul(exp)
        .saturating_add(jitter_ms.min(MAX_JITTER_MS - 1))
        .min(MAX_DELAY_MS);
    Duration::from_millis(ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_retry_is_base_plus_jitter() {
        let d = backoff_delay(0);
        assert!(d >= Duration::from_millis(1_000));
        assert!(d < Duration::from_millis(2_000));
    }

    #[test]
    fn doubles_then_caps() {
        assert_eq!(backoff_delay_with_jitter(0, 0), Duration::from_millis(1_000));
        assert_eq!(backoff_delay_with_jitter(1, 0), Duration::from_millis(2_000));
        assert_eq!(backoff_delay_with_jitter(3, 250), Duration::from_millis(8_250));
        assert_eq!(backoff_delay_with_jitter(5, 0), Duration::from_millis(30_000));
        assert_eq!(backoff_delay_with_jitter(64, 999), Duration::from_millis(30_000));
    }

    #[test]
    fn non_decreasing_even_with_random_jitter() {
        let mut prev = Duration::ZERO;
        for retry in 0..40 {
            let d = backoff_delay(retry);
            assert!(d >= prev, "retry {retry}: {d:?} < {prev:?}");
            prev = d;
        }
    }
}
