//! Retry policy with capped exponential backoff.

use std::time::Duration;

use crate::config::{
    AirbyteConfig, DEFAULT_MAX_RETRIES, DEFAULT_RETRY_BASE_DELAY, DEFAULT_RETRY_MAX_DELAY,
};

/// Retry configuration shared by all calls of a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_RETRIES,
            base_delay: DEFAULT_RETRY_BASE_DELAY,
            max_delay: DEFAULT_RETRY_MAX_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Creates a retry policy.
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay: max_delay.max(base_delay),
        }
    }

    /// Creates a retry policy from client configuration.
    pub fn from_config(config: &AirbyteConfig) -> Self {
        Self::new(
            config.max_retries,
            config.retry_base_delay,
            config.retry_max_delay,
        )
    }

    /// Starts tracking a new call.
    ///
    /// Non-idempotent calls get a budget of exactly one attempt.
    pub fn context(&self, idempotent: bool) -> RetryContext {
        RetryContext {
            attempt: 0,
            max_attempts: if idempotent { self.max_attempts } else { 1 },
            base_delay: self.base_delay,
            max_delay: self.max_delay,
        }
    }

    /// Backoff before retry number `retry` (zero-based): `min(max, base * 2^retry)`.
    pub fn backoff(&self, retry: u32) -> Duration {
        2u32.checked_pow(retry)
            .and_then(|factor| self.base_delay.checked_mul(factor))
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }
}

/// Per-call retry state. Created when a call starts and dropped when it ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryContext {
    attempt: u32,
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
}

impl RetryContext {
    /// Marks the start of an attempt and returns its 1-based number.
    pub fn begin_attempt(&mut self) -> u32 {
        self.attempt += 1;
        self.attempt
    }

    /// Attempts made so far.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Attempt budget for this call.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Returns true once the attempt budget is used up.
    pub fn is_exhausted(&self) -> bool {
        self.attempt >= self.max_attempts
    }

    /// Delay before the next attempt.
    ///
    /// A server-provided `retry_after` replaces the computed backoff but is
    /// still capped at the maximum delay.
    pub fn next_delay(&self, retry_after: Option<Duration>) -> Duration {
        match retry_after {
            Some(delay) => delay.min(self.max_delay),
            None => {
                let policy = RetryPolicy {
                    max_attempts: self.max_attempts,
                    base_delay: self.base_delay,
                    max_delay: self.max_delay,
                };
                policy.backoff(self.attempt.saturating_sub(1))
            }
        }
    }
}
