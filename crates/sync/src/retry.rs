//! Retry policy for outbound requests.

use std::time::Duration;

/// Bounded retry with exponential backoff.
///
/// Attempts are 1-indexed. The first attempt fires immediately; the delay
/// slept before attempt `k` (k >= 2) is `base_delay * 2^(k-1)`, so with a
/// one second base the waits run 2s, 4s, 8s. There is no delay cap: the
/// attempt bound is what limits total wait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first. Minimum 1.
    pub max_attempts: u32,
    /// Unit of the exponential curve.
    pub base_delay: Duration,
    /// Per-attempt timeout. A timed-out attempt counts toward `max_attempts`.
    pub request_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, request_timeout: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            request_timeout,
        }
    }

    /// Delay to sleep before the given attempt. Zero for the first.
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        let factor = 2_u32.saturating_pow(attempt - 1);
        self.base_delay.saturating_mul(factor)
    }

    /// Whether another attempt may follow the given (failed) one.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}
