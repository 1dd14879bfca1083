//! Rate limiter using token bucket algorithm.
//!
//! The bucket holds at most one second's worth of tokens. Callers that find
//! it empty suspend until a token is refilled; waiters are served in arrival
//! order because the bucket lock is held across the wait.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Refill drift below this counts as a whole token.
const TOKEN_EPSILON: f64 = 1e-9;

/// Shortest sleep while waiting for a token.
const MIN_WAIT: Duration = Duration::from_millis(1);

/// Token bucket state
#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    capacity: f64,
    refill_rate: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn new(rate_per_second: u32) -> Self {
        let capacity = f64::from(rate_per_second.max(1));
        Self {
            tokens: capacity,
            capacity,
            refill_rate: capacity,
            last_refill: Instant::now(),
        }
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.capacity);
        self.last_refill = now;
    }

    fn try_take(&mut self) -> bool {
        self.refill();
        if self.tokens + TOKEN_EPSILON >= 1.0 {
            self.tokens = (self.tokens - 1.0).max(0.0);
            true
        } else {
            false
        }
    }

    fn time_until_available(&self) -> Duration {
        let needed = (1.0 - self.tokens).max(0.0);
        Duration::from_secs_f64(needed / self.refill_rate).max(MIN_WAIT)
    }
}

/// Throttles outgoing calls to a fixed number per second.
#[derive(Debug)]
pub struct RateLimiter {
    bucket: Option<Mutex<TokenBucket>>,
}

impl RateLimiter {
    /// Creates a limiter allowing `rate_per_second` calls per second.
    pub fn new(rate_per_second: u32) -> Self {
        Self {
            bucket: Some(Mutex::new(TokenBucket::new(rate_per_second))),
        }
    }

    /// Creates a limiter that never waits.
    pub fn unlimited() -> Self {
        Self { bucket: None }
    }

    /// Waits until a slot is available and takes it.
    pub async fn acquire(&self) {
        let Some(bucket) = &self.bucket else {
            return;
        };

        let mut bucket = bucket.lock().await;
        while !bucket.try_take() {
            let wait = bucket.time_until_available();
            debug!(wait_ms = wait.as_millis() as u64, "Waiting for rate limit");
            tokio::time::sleep(wait).await;
        }
    }

    /// Takes a slot if one is immediately available.
    pub fn try_acquire(&self) -> bool {
        match &self.bucket {
            None => true,
            Some(bucket) => match bucket.try_lock() {
                Ok(mut bucket) => bucket.try_take(),
                Err(_) => false,
            },
        }
    }
}
