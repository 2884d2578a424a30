use std::time::Duration;

use super::Attempt;
use crate::failure::Failure;

/// Decision returned by the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Terminal: classify and surface the failure.
    NoRetry,
    /// Dispatch again after the given delay.
    RetryAfter(Duration),
}

/// Exponential backoff policy: `base_delay * 2^(count - 1)`, no jitter.
///
/// `max_delay` is a ceiling on a single delay. With the defaults (3 attempts,
/// 1s base) it is never reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of dispatches (including the first).
    pub max_attempts: u32,
    /// Delay before the second dispatch.
    pub base_delay: Duration,
    /// Upper bound on a single backoff delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Same policy with a different base delay (per call site override).
    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// True for failures that may succeed on a later dispatch: no response,
    /// timeout, or a 5xx status. Cancelled and malformed requests never are.
    pub fn is_transient(failure: &Failure) -> bool {
        if failure.is_cancelled() || failure.is_invalid_request() {
            return false;
        }
        match failure.status_code() {
            None => true,
            Some(code) => code >= 500,
        }
    }

    /// Whether the attempt's last failure should be dispatched again.
    pub fn should_retry(&self, attempt: &Attempt) -> bool {
        if attempt.count() >= attempt.max_attempts() {
            return false;
        }
        attempt.failure().is_some_and(Self::is_transient)
    }

    /// Delay before the next dispatch, given `count` dispatches so far.
    pub fn next_delay(&self, attempt: &Attempt) -> Duration {
        self.delay_for(attempt.base_delay(), attempt.count())
    }

    pub fn decide(&self, attempt: &Attempt) -> RetryDecision {
        if self.should_retry(attempt) {
            RetryDecision::RetryAfter(self.next_delay(attempt))
        } else {
            RetryDecision::NoRetry
        }
    }

    fn delay_for(&self, base: Duration, count: u32) -> Duration {
        let shift = count.saturating_sub(1).min(31);
        let raw = base.saturating_mul(1u32 << shift);
        raw.min(self.max_delay)
    }
}
