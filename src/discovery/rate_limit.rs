//! Per-caller token bucket rate limiting, the discovery engine's
//! backpressure mechanism.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::types::CoreError;

struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// A token bucket per caller id. Default capacity admits 30 requests per
/// rolling 60-second window, refilled continuously rather than in
/// discrete windows (so a caller that sends one request every two seconds
/// never gets rejected, matching the spirit of "30 requests/minute").
pub struct RateLimiter {
    capacity: f64,
    refill_per_sec: f64,
    buckets: Mutex<HashMap<String, Bucket>>,
}

impl RateLimiter {
    pub fn new(capacity: u32, window: Duration) -> Self {
        Self {
            capacity: capacity as f64,
            refill_per_sec: capacity as f64 / window.as_secs_f64(),
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// Default: 30 requests / 60 seconds, `discovery.recommend`'s default.
    pub fn default_limiter() -> Self {
        Self::new(30, Duration::from_secs(60))
    }

    /// Admit one request for `caller`, or reject with `CoreError::RateLimited`
    /// carrying a millisecond retry-after estimate.
    pub fn try_acquire(&self, caller: &str) -> Result<(), CoreError> {
        let mut buckets = self.buckets.lock();
        let now = Instant::now();
        let bucket = buckets.entry(caller.to_string()).or_insert_with(|| Bucket {
            tokens: self.capacity,
            last_refill: now,
        });

        let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        bucket.last_refill = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            Ok(())
        } else {
            let deficit = 1.0 - bucket.tokens;
            let retry_after_ms = ((deficit / self.refill_per_sec) * 1000.0).ceil() as u64;
            Err(CoreError::rate_limited(retry_after_ms))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admits_up_to_capacity_then_rejects() {
        let limiter = RateLimiter::new(3, Duration::from_secs(60));
        assert!(limiter.try_acquire("caller").is_ok());
        assert!(limiter.try_acquire("caller").is_ok());
        assert!(limiter.try_acquire("caller").is_ok());
        assert!(limiter.try_acquire("caller").is_err());
    }

    #[test]
    fn callers_are_independent() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        assert!(limiter.try_acquire("a").is_ok());
        assert!(limiter.try_acquire("b").is_ok());
        assert!(limiter.try_acquire("a").is_err());
    }
}
