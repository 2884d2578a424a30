//! Per-call attempt state, mutated in place across retries.

use std::fmt;
use std::time::Duration;

use crate::failure::Failure;
use crate::retry::RetryPolicy;
use crate::transport::Method;

/// Target of a call: method plus fully resolved URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub method: Method,
    pub url: String,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

/// One bounded retry sequence for a single call.
///
/// `count` starts at 0 and is incremented once per dispatch; it never exceeds
/// `max_attempts`.
#[derive(Debug, Clone)]
pub struct Attempt {
    endpoint: Endpoint,
    count: u32,
    max_attempts: u32,
    base_delay: Duration,
    failure: Option<Failure>,
}

impl Attempt {
    pub fn new(endpoint: Endpoint, policy: &RetryPolicy) -> Self {
        Self {
            endpoint,
            count: 0,
            max_attempts: policy.max_attempts.max(1),
            base_delay: policy.base_delay,
            failure: None,
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Number of dispatches performed so far.
    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    /// Failure of the most recent dispatch, if it failed.
    pub fn failure(&self) -> Option<&Failure> {
        self.failure.as_ref()
    }

    pub fn is_exhausted(&self) -> bool {
        self.count >= self.max_attempts
    }

    /// Marks the start of a dispatch. Clears the previous outcome.
    pub(crate) fn begin_dispatch(&mut self) {
        self.count = (self.count + 1).min(self.max_attempts);
        self.failure = None;
    }

    pub(crate) fn record_failure(&mut self, failure: Failure) {
        self.failure = Some(failure);
    }

    /// Consumes the attempt, yielding its final failure.
    pub(crate) fn into_failure(self) -> Option<Failure> {
        self.failure
    }
}
