//! Per-endpoint circuit breaker.
//!
//! Each endpoint identifier gets its own `Closed -> Open -> HalfOpen` state
//! machine. The open-to-half-open transition is evaluated lazily when a call
//! asks for a permit; there is no background timer.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::{
    AirbyteConfig, DEFAULT_CIRCUIT_FAILURE_THRESHOLD, DEFAULT_CIRCUIT_RECOVERY_TIMEOUT,
};
use crate::errors::{AirbyteError, AirbyteResult};

/// Circuit breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Requests pass through.
    Closed,
    /// Requests are rejected.
    Open,
    /// A single trial is allowed to test the endpoint.
    HalfOpen,
}

/// Configuration for the circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before the circuit opens.
    pub failure_threshold: u32,
    /// How long an open circuit waits before allowing a trial.
    pub recovery_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: DEFAULT_CIRCUIT_FAILURE_THRESHOLD,
            recovery_timeout: DEFAULT_CIRCUIT_RECOVERY_TIMEOUT,
        }
    }
}

impl CircuitBreakerConfig {
    /// Create a new configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set failure threshold
    pub fn failure_threshold(mut self, n: u32) -> Self {
        self.failure_threshold = n.max(1);
        self
    }

    /// Set recovery timeout
    pub fn recovery_timeout(mut self, timeout: Duration) -> Self {
        self.recovery_timeout = timeout;
        self
    }

    /// Creates a configuration from client configuration.
    pub fn from_config(config: &AirbyteConfig) -> Self {
        Self::new()
            .failure_threshold(config.circuit_failure_threshold)
            .recovery_timeout(config.circuit_recovery_timeout)
    }
}

#[derive(Debug)]
struct EndpointCircuit {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    trial_in_flight: bool,
}

impl Default for EndpointCircuit {
    fn default() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            opened_at: None,
            trial_in_flight: false,
        }
    }
}

impl EndpointCircuit {
    fn recovery_elapsed(&self, recovery_timeout: Duration) -> bool {
        self.opened_at
            .map_or(true, |opened| opened.elapsed() >= recovery_timeout)
    }
}

/// Circuit breaker tracking consecutive failures per endpoint.
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    circuits: Mutex<HashMap<String, EndpointCircuit>>,
    total_rejections: AtomicU64,
}

impl CircuitBreaker {
    /// Create a new circuit breaker with default configuration
    pub fn new() -> Self {
        Self::with_config(CircuitBreakerConfig::default())
    }

    /// Create a new circuit breaker with custom configuration
    pub fn with_config(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            circuits: Mutex::new(HashMap::new()),
            total_rejections: AtomicU64::new(0),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Asks permission to call `endpoint`.
    ///
    /// Fails with [`AirbyteError::CircuitOpen`] while the circuit is open, or
    /// while it is half-open and the trial is already in flight. The returned
    /// permit must be settled with [`CircuitPermit::record_success`] or
    /// [`CircuitPermit::record_failure`]; dropping it unsettled releases a
    /// trial slot without changing state.
    pub fn try_acquire(&self, endpoint: &str) -> AirbyteResult<CircuitPermit<'_>> {
        let mut circuits = self.circuits.lock();
        let circuit = circuits.entry(endpoint.to_string()).or_default();

        if circuit.state == CircuitState::Open
            && circuit.recovery_elapsed(self.config.recovery_timeout)
        {
            info!(endpoint, "Circuit breaker transitioning to HALF_OPEN");
            circuit.state = CircuitState::HalfOpen;
            circuit.trial_in_flight = false;
        }

        let trial = match circuit.state {
            CircuitState::Closed => false,
            CircuitState::HalfOpen if !circuit.trial_in_flight => {
                circuit.trial_in_flight = true;
                debug!(endpoint, "Circuit breaker allowing trial");
                true
            }
            CircuitState::HalfOpen | CircuitState::Open => {
                self.total_rejections.fetch_add(1, Ordering::Relaxed);
                return Err(AirbyteError::CircuitOpen {
                    endpoint: endpoint.to_string(),
                });
            }
        };

        Ok(CircuitPermit {
            breaker: self,
            endpoint: endpoint.to_string(),
            trial,
            settled: false,
        })
    }

    /// Returns the effective state of an endpoint's circuit.
    ///
    /// An open circuit whose recovery timeout has elapsed reports
    /// `HalfOpen` even before the next call performs the transition.
    pub fn state(&self, endpoint: &str) -> CircuitState {
        let circuits = self.circuits.lock();
        match circuits.get(endpoint) {
            None => CircuitState::Closed,
            Some(circuit)
                if circuit.state == CircuitState::Open
                    && circuit.recovery_elapsed(self.config.recovery_timeout) =>
            {
                CircuitState::HalfOpen
            }
            Some(circuit) => circuit.state,
        }
    }

    /// Returns the consecutive failure count for an endpoint.
    pub fn consecutive_failures(&self, endpoint: &str) -> u32 {
        self.circuits
            .lock()
            .get(endpoint)
            .map_or(0, |circuit| circuit.consecutive_failures)
    }

    /// Get total rejection count
    pub fn total_rejections(&self) -> u64 {
        self.total_rejections.load(Ordering::Relaxed)
    }

    /// Reset every circuit to closed.
    pub fn reset(&self) {
        self.circuits.lock().clear();
        debug!("Circuit breaker reset to CLOSED");
    }

    fn on_success(&self, endpoint: &str, trial: bool) {
        let mut circuits = self.circuits.lock();
        let circuit = circuits.entry(endpoint.to_string()).or_default();

        match circuit.state {
            CircuitState::Closed => {
                circuit.consecutive_failures = 0;
            }
            CircuitState::HalfOpen if !trial => {
                // Only the trial decides a half-open circuit.
                debug!(endpoint, "Ignoring non-trial success while half-open");
            }
            CircuitState::HalfOpen => {
                info!(endpoint, "Circuit breaker transitioning to CLOSED");
                *circuit = EndpointCircuit::default();
            }
            CircuitState::Open => {
                // A call admitted before the circuit opened; it does not close it.
                debug!(endpoint, "Success recorded while circuit is open");
            }
        }
    }

    fn on_failure(&self, endpoint: &str, trial: bool) {
        let mut circuits = self.circuits.lock();
        let circuit = circuits.entry(endpoint.to_string()).or_default();

        match circuit.state {
            CircuitState::HalfOpen if !trial => {
                debug!(endpoint, "Ignoring non-trial failure while half-open");
            }
            CircuitState::Closed => {
                circuit.consecutive_failures += 1;
                if circuit.consecutive_failures >= self.config.failure_threshold {
                    warn!(
                        endpoint,
                        failure_count = circuit.consecutive_failures,
                        "Circuit breaker transitioning to OPEN"
                    );
                    circuit.state = CircuitState::Open;
                    circuit.opened_at = Some(Instant::now());
                }
            }
            CircuitState::HalfOpen => {
                warn!(endpoint, "Circuit breaker returning to OPEN from half-open");
                circuit.state = CircuitState::Open;
                circuit.opened_at = Some(Instant::now());
                circuit.trial_in_flight = false;
                circuit.consecutive_failures += 1;
            }
            CircuitState::Open => {
                circuit.consecutive_failures += 1;
            }
        }
    }

    fn release_trial(&self, endpoint: &str) {
        if let Some(circuit) = self.circuits.lock().get_mut(endpoint) {
            if circuit.state == CircuitState::HalfOpen {
                circuit.trial_in_flight = false;
            }
        }
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("config", &self.config)
            .field("endpoints", &self.circuits.lock().len())
            .field("total_rejections", &self.total_rejections())
            .finish()
    }
}

/// Permission to issue one call through the circuit breaker.
#[derive(Debug)]
#[must_use = "a permit must be settled with record_success or record_failure"]
pub struct CircuitPermit<'a> {
    breaker: &'a CircuitBreaker,
    endpoint: String,
    trial: bool,
    settled: bool,
}

impl CircuitPermit<'_> {
    /// Returns true if this permit is the half-open trial.
    pub fn is_trial(&self) -> bool {
        self.trial
    }

    /// Records that the endpoint answered.
    pub fn record_success(mut self) {
        self.settled = true;
        self.breaker.on_success(&self.endpoint, self.trial);
    }

    /// Records a failure that counts against the endpoint.
    pub fn record_failure(mut self) {
        self.settled = true;
        self.breaker.on_failure(&self.endpoint, self.trial);
    }
}

impl Drop for CircuitPermit<'_> {
    fn drop(&mut self) {
        if !self.settled && self.trial {
            self.breaker.release_trial(&self.endpoint);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(threshold: u32, recovery: Duration) -> CircuitBreaker {
        CircuitBreaker::with_config(
            CircuitBreakerConfig::new()
                .failure_threshold(threshold)
                .recovery_timeout(recovery),
        )
    }

    fn fail(breaker: &CircuitBreaker, endpoint: &str, times: u32) {
        for _ in 0..times {
            breaker.try_acquire(endpoint).unwrap().record_failure();
        }
    }

    #[test]
    fn test_opens_after_threshold_consecutive_failures() {
        let cb = breaker(3, Duration::from_secs(60));

        fail(&cb, "sources/list", 2);
        assert_eq!(cb.state("sources/list"), CircuitState::Closed);

        fail(&cb, "sources/list", 1);
        assert_eq!(cb.state("sources/list"), CircuitState::Open);

        let err = cb.try_acquire("sources/list").unwrap_err();
        assert!(matches!(err, AirbyteError::CircuitOpen { ref endpoint } if endpoint == "sources/list"));
        assert_eq!(cb.total_rejections(), 1);
    }

    #[test]
    fn test_success_resets_consecutive_count() {
        let cb = breaker(3, Duration::from_secs(60));

        fail(&cb, "jobs/get", 2);
        cb.try_acquire("jobs/get").unwrap().record_success();
        fail(&cb, "jobs/get", 2);

        assert_eq!(cb.state("jobs/get"), CircuitState::Closed);
        assert_eq!(cb.consecutive_failures("jobs/get"), 2);
    }

    #[test]
    fn test_circuits_are_scoped_per_endpoint() {
        let cb = breaker(1, Duration::from_secs(60));

        fail(&cb, "connections/sync", 1);

        assert!(cb.try_acquire("connections/sync").is_err());
        assert!(cb.try_acquire("sources/list").is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_allows_exactly_one_trial() {
        let cb = breaker(1, Duration::from_secs(60));
        fail(&cb, "health", 1);

        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(cb.state("health"), CircuitState::HalfOpen);

        let trial = cb.try_acquire("health").unwrap();
        assert!(trial.is_trial());
        assert!(matches!(
            cb.try_acquire("health"),
            Err(AirbyteError::CircuitOpen { .. })
        ));

        trial.record_success();
        assert_eq!(cb.state("health"), CircuitState::Closed);
        assert!(cb.try_acquire("health").is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_trial_reopens_and_restarts_timer() {
        let cb = breaker(1, Duration::from_secs(60));
        fail(&cb, "health", 1);

        tokio::time::advance(Duration::from_secs(60)).await;
        cb.try_acquire("health").unwrap().record_failure();
        assert_eq!(cb.state("health"), CircuitState::Open);

        tokio::time::advance(Duration::from_secs(30)).await;
        assert!(cb.try_acquire("health").is_err());

        tokio::time::advance(Duration::from_secs(30)).await;
        assert!(cb.try_acquire("health").unwrap().is_trial());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_trial_releases_slot() {
        let cb = breaker(1, Duration::from_secs(10));
        fail(&cb, "health", 1);
        tokio::time::advance(Duration::from_secs(10)).await;

        let trial = cb.try_acquire("health").unwrap();
        drop(trial);

        assert_eq!(cb.state("health"), CircuitState::HalfOpen);
        assert!(cb.try_acquire("health").unwrap().is_trial());
    }

    #[tokio::test(start_paused = true)]
    async fn test_only_trial_settles_half_open_circuit() {
        let cb = breaker(1, Duration::from_secs(60));
        let slow_success = cb.try_acquire("health").unwrap();
        let slow_failure = cb.try_acquire("health").unwrap();
        fail(&cb, "health", 1);

        tokio::time::advance(Duration::from_secs(60)).await;
        let trial = cb.try_acquire("health").unwrap();
        assert!(trial.is_trial());

        slow_success.record_success();
        assert_eq!(cb.state("health"), CircuitState::HalfOpen);
        assert!(cb.try_acquire("health").is_err());

        slow_failure.record_failure();
        assert_eq!(cb.state("health"), CircuitState::HalfOpen);
        assert!(cb.try_acquire("health").is_err());

        trial.record_success();
        assert_eq!(cb.state("health"), CircuitState::Closed);
    }

    #[test]
    fn test_reset() {
        let cb = breaker(1, Duration::from_secs(60));
        fail(&cb, "health", 1);
        cb.reset();
        assert_eq!(cb.state("health"), CircuitState::Closed);
    }
}
