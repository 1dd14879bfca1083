//! Request executor: the single path every API call goes through.
//!
//! Order of operations for one logical call:
//! cache lookup, circuit permit, then per attempt a rate-limit slot and a
//! transport call. The outcome is recorded once per call in the circuit
//! breaker and the metrics collector.

use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{trace, warn};

use super::cache::ResponseCache;
use super::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use super::rate_limiter::RateLimiter;
use super::retry::RetryPolicy;
use crate::config::AirbyteConfig;
use crate::errors::{AirbyteError, AirbyteResult};
use crate::observability::{DefaultMetricsCollector, MetricsCollector};
use crate::transport::HttpTransport;
use crate::types::LogicalOperation;

/// Per-call options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecuteOptions {
    /// Serve from and populate the response cache.
    pub use_cache: bool,
    /// Per-attempt timeout; the executor default when `None`.
    pub timeout: Option<Duration>,
    /// Whether the call may be retried on transient failure.
    pub idempotent: bool,
    /// Cache lifetime override; the executor default when `None`.
    pub cache_ttl: Option<Duration>,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self::read()
    }
}

impl ExecuteOptions {
    /// Cached, retryable read.
    pub fn read() -> Self {
        Self {
            use_cache: true,
            timeout: None,
            idempotent: true,
            cache_ttl: None,
        }
    }

    /// Uncached, retryable read. Used where staleness is unacceptable.
    pub fn fresh() -> Self {
        Self {
            use_cache: false,
            ..Self::read()
        }
    }

    /// Uncached call that is attempted exactly once.
    pub fn write() -> Self {
        Self {
            use_cache: false,
            idempotent: false,
            ..Self::read()
        }
    }

    /// Sets the per-attempt timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the cache lifetime for this call.
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = Some(ttl);
        self
    }
}

/// Composes caching, circuit breaking, rate limiting and retries around a transport.
pub struct RequestExecutor {
    transport: Arc<dyn HttpTransport>,
    cache: ResponseCache,
    circuit_breaker: CircuitBreaker,
    rate_limiter: RateLimiter,
    retry_policy: RetryPolicy,
    metrics: Arc<dyn MetricsCollector>,
    default_timeout: Duration,
    default_cache_ttl: Duration,
}

impl RequestExecutor {
    /// Creates an executor with limits taken from client configuration.
    pub fn new(transport: Arc<dyn HttpTransport>, config: &AirbyteConfig) -> Self {
        Self {
            transport,
            cache: ResponseCache::new(config.cache_capacity),
            circuit_breaker: CircuitBreaker::with_config(CircuitBreakerConfig::from_config(config)),
            rate_limiter: RateLimiter::new(config.rate_limit_per_second),
            retry_policy: RetryPolicy::from_config(config),
            metrics: Arc::new(DefaultMetricsCollector::new()),
            default_timeout: config.timeout,
            default_cache_ttl: config.cache_ttl,
        }
    }

    /// Replaces the metrics collector.
    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsCollector>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Replaces the rate limiter.
    pub fn with_rate_limiter(mut self, rate_limiter: RateLimiter) -> Self {
        self.rate_limiter = rate_limiter;
        self
    }

    /// Replaces the retry policy.
    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// Returns the response cache.
    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    /// Returns the circuit breaker.
    pub fn circuit_breaker(&self) -> &CircuitBreaker {
        &self.circuit_breaker
    }

    /// Returns the metrics collector.
    pub fn metrics(&self) -> &Arc<dyn MetricsCollector> {
        &self.metrics
    }

    /// Executes one logical operation.
    ///
    /// # Errors
    ///
    /// - [`AirbyteError::CircuitOpen`] if the endpoint's circuit rejects the call.
    /// - [`AirbyteError::RequestFailed`] when an idempotent call exhausts its
    ///   attempts on transient failures.
    /// - [`AirbyteError::TransientTransport`] when a non-idempotent call fails transiently.
    /// - Any non-retryable error from the transport, unchanged.
    pub async fn execute(
        &self,
        operation: LogicalOperation,
        options: ExecuteOptions,
    ) -> AirbyteResult<Value> {
        let signature = options.use_cache.then(|| operation.signature());

        if let Some(signature) = &signature {
            let cached = self.cache.get(signature);
            self.metrics.record_cache_lookup(cached.is_some());
            if let Some(value) = cached {
                return Ok(value);
            }
        }

        let endpoint = operation.endpoint();
        let permit = match self.circuit_breaker.try_acquire(endpoint) {
            Ok(permit) => permit,
            Err(error) => {
                self.metrics.record_circuit_rejection(endpoint);
                self.metrics.record_error(error.kind());
                return Err(error);
            }
        };

        let started = Instant::now();
        let outcome = self.send_with_retry(&operation, options).await;
        self.metrics
            .record_request(endpoint, outcome.is_ok(), started.elapsed());

        match &outcome {
            Ok(value) => {
                permit.record_success();
                if let Some(signature) = signature {
                    let ttl = options.cache_ttl.unwrap_or(self.default_cache_ttl);
                    self.cache.put(signature, value.clone(), ttl);
                }
            }
            Err(error) => {
                self.metrics.record_error(error.kind());
                if error.trips_circuit() {
                    permit.record_failure();
                } else {
                    // The endpoint answered; a client error is not an outage.
                    permit.record_success();
                }
            }
        }

        outcome
    }

    async fn send_with_retry(
        &self,
        operation: &LogicalOperation,
        options: ExecuteOptions,
    ) -> AirbyteResult<Value> {
        let timeout = options.timeout.unwrap_or(self.default_timeout);
        let mut context = self.retry_policy.context(options.idempotent);

        loop {
            self.rate_limiter.acquire().await;
            let attempt = context.begin_attempt();
            trace!(endpoint = operation.endpoint(), attempt, "Sending request");

            let result = match tokio::time::timeout(timeout, self.transport.send(operation, timeout))
                .await
            {
                Ok(result) => result,
                Err(_) => Err(AirbyteError::transient(format!(
                    "Request timed out after {:?}",
                    timeout
                ))),
            };

            let error = match result {
                Ok(value) => return Ok(value),
                Err(error) if !error.is_retryable() || !options.idempotent => return Err(error),
                Err(error) => error,
            };

            if context.is_exhausted() {
                return Err(AirbyteError::RequestFailed {
                    attempts: attempt,
                    source: Box::new(error),
                });
            }

            let delay = context.next_delay(error.retry_after());
            warn!(
                endpoint = operation.endpoint(),
                attempt,
                max_attempts = context.max_attempts(),
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Retrying request"
            );
            self.metrics.record_retry(operation.endpoint(), attempt);
            tokio::time::sleep(delay).await;
        }
    }
}

impl std::fmt::Debug for RequestExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestExecutor")
            .field("retry_policy", &self.retry_policy)
            .field("circuit_breaker", &self.circuit_breaker)
            .field("cache", &self.cache)
            .field("default_timeout", &self.default_timeout)
            .finish_non_exhaustive()
    }
}
