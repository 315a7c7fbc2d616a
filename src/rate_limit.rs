//! Rate limiting for diagnostic log bursts

use std::time::Duration;
use tokio::time::Instant;

/// Gate for error messages that could otherwise flood the log.
///
/// At most one message is permitted per interval. Every refused attempt is
/// counted, and the count is handed to the next permitted caller so it can
/// say how many messages were swallowed in between.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    interval: Duration,
    last_permitted: Option<Instant>,
    suppressed: u32,
}

impl RateLimiter {
    pub fn new(interval: Duration) -> Self {
        Self { interval, last_permitted: None, suppressed: 0 }
    }

    /// Ask whether a message may be logged now.
    ///
    /// Returns:
    /// - `Some(n)` - log it; `n` attempts were suppressed since the last permitted one
    /// - `None` - suppressed, the caller must not log
    pub fn try_log(&mut self) -> Option<u32> {
        self.try_log_at(Instant::now())
    }

    /// [`try_log`](Self::try_log) against an explicit clock reading.
    pub fn try_log_at(&mut self, now: Instant) -> Option<u32> {
        if let Some(last) = self.last_permitted {
            if now.saturating_duration_since(last) < self.interval {
                self.suppressed = self.suppressed.saturating_add(1);
                return None;
            }
        }
        self.last_permitted = Some(now);
        Some(std::mem::take(&mut self.suppressed))
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Attempts refused since the last permitted one.
    pub fn suppressed(&self) -> u32 {
        self.suppressed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn first_call_is_permitted_with_zero_skipped() {
        let mut limiter = RateLimiter::new(Duration::from_secs(1));
        assert_eq!(limiter.try_log_at(Instant::now()), Some(0));
    }

    #[test]
    fn burst_is_suppressed_then_reported() {
        let start = Instant::now();
        let mut limiter = RateLimiter::new(Duration::from_millis(100));

        assert_eq!(limiter.try_log_at(start), Some(0));
        assert_eq!(limiter.try_log_at(start + Duration::from_millis(10)), None);
        assert_eq!(limiter.try_log_at(start + Duration::from_millis(99)), None);
        assert_eq!(limiter.suppressed(), 2);

        assert_eq!(limiter.try_log_at(start + Duration::from_millis(100)), Some(2));
        assert_eq!(limiter.suppressed(), 0);
    }

    #[test]
    fn interval_restarts_from_last_permitted_call() {
        let start = Instant::now();
        let mut limiter = RateLimiter::new(Duration::from_millis(100));

        assert_eq!(limiter.try_log_at(start), Some(0));
        assert_eq!(limiter.try_log_at(start + Duration::from_millis(150)), Some(0));
        // 200ms after start but only 50ms after the last permitted call
        assert_eq!(limiter.try_log_at(start + Duration::from_millis(200)), None);
    }

    proptest! {
        #[test]
        fn n_calls_within_interval_report_n_minus_one(
            n in 1u32..200,
            interval_ms in 1u64..10_000,
        ) {
            let start = Instant::now();
            let interval = Duration::from_millis(interval_ms);
            let mut limiter = RateLimiter::new(interval);

            prop_assert_eq!(limiter.try_log_at(start), Some(0));
            for i in 1..n {
                // Spread the remaining calls strictly inside the interval
                let offset = interval.mul_f64(f64::from(i) / f64::from(n));
                let at = start + offset.min(interval - Duration::from_nanos(1));
                prop_assert_eq!(limiter.try_log_at(at), None);
            }
            prop_assert_eq!(limiter.try_log_at(start + interval), Some(n - 1));
        }
    }
}
