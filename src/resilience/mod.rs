//! Resilience patterns for the Airbyte client.
//!
//! Provides retry logic, circuit breaker, rate limiting, response caching,
//! and the executor that composes them around every API call.

mod cache;
mod circuit_breaker;
mod executor;
mod rate_limiter;
mod retry;

pub use cache::{CacheStats, ResponseCache};
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitPermit, CircuitState};
pub use executor::{ExecuteOptions, RequestExecutor};
pub use rate_limiter::RateLimiter;
pub use retry::{RetryContext, RetryPolicy};
