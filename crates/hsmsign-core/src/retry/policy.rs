use std::time::Duration;

/// Decision returned by the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Do not retry this error.
    NoRetry,
    /// Retry after the given delay.
    RetryAfter(Duration),
}

/// Exponential backoff without jitter.
///
/// Delay before retry `n` (0 = first retry) is
/// `min(max_delay, min_delay + delta_delay * (2^n - 1))`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExponentialBackoff {
    pub min_delay: Duration,
    pub max_delay: Duration,
    pub delta_delay: Duration,
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self {
            min_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(30),
            delta_delay: Duration::from_secs(3),
        }
    }
}

impl ExponentialBackoff {
    pub fn new(min_delay: Duration, max_delay: Duration, delta_delay: Duration) -> Self {
        Self {
            min_delay,
            max_delay,
            delta_delay,
        }
    }

    /// Delay before the `retry`-th retry (0-based). Saturates at `max_delay`.
    pub fn delay(&self, retry: u32) -> Duration {
        let factor = 1u32.checked_shl(retry).map_or(u32::MAX, |p| p - 1);
        self.delta_delay
            .checked_mul(factor)
            .and_then(|grown| self.min_delay.checked_add(grown))
            .map_or(self.max_delay, |d| d.min(self.max_delay))
    }
}

/// Bounded retry policy: attempt budget plus backoff schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first).
    pub max_attempts: u32,
    pub backoff: ExponentialBackoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: ExponentialBackoff::default(),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: ExponentialBackoff) -> Self {
        Self {
            max_attempts,
            backoff,
        }
    }

    /// Policy that never retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            backoff: ExponentialBackoff::default(),
        }
    }

    /// Decide what to do after attempt `attempt` (1-based) failed.
    pub fn decide(&self, attempt: u32, transient: bool) -> RetryDecision {
        if !transient || attempt >= self.max_attempts {
            return RetryDecision::NoRetry;
        }
        RetryDecision::RetryAfter(self.backoff.delay(attempt.saturating_sub(1)))
    }
}
