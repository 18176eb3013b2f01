//! Retry policy

use std::time::Duration;

/// How many times a failed task may be re-published, and how long to wait
/// before each attempt.
///
/// The interval is the same for every attempt; there is no backoff curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    fail_times: u32,
    retry_attempts: u32,
    retry_interval: Duration,
}

impl RetryPolicy {
    pub fn new(retry_attempts: u32, retry_interval: Duration) -> Self {
        Self {
            fail_times: 0,
            retry_attempts,
            retry_interval,
        }
    }

    /// Same policy with `fail_times` attempts already made
    pub fn with_fail_times(mut self, fail_times: u32) -> Self {
        self.fail_times = fail_times;
        self
    }

    pub fn fail_times(&self) -> u32 {
        self.fail_times
    }

    pub fn retry_attempts(&self) -> u32 {
        self.retry_attempts
    }

    pub fn retry_interval(&self) -> Duration {
        self.retry_interval
    }

    /// A policy retries only with at least one attempt and a non-zero interval
    /// (payloads store the interval in whole milliseconds).
    pub fn is_enabled(&self) -> bool {
        self.retry_attempts >= 1 && self.retry_interval >= Duration::from_millis(1)
    }

    pub fn is_exhausted(&self) -> bool {
        self.fail_times > self.retry_attempts
    }

    /// Policy to publish with after one more failure, or `None` when the task
    /// must be dropped.
    pub fn next_attempt(&self) -> Option<Self> {
        if !self.is_enabled() {
            return None;
        }
        let next = self.with_fail_times(self.fail_times.saturating_add(1));
        (!next.is_exhausted()).then_some(next)
    }
}
