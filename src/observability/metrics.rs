//! Metrics collection for the Airbyte client.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Metrics collector interface.
pub trait MetricsCollector: Send + Sync {
    /// Records one executed call: its latency and its outcome.
    fn record_request(&self, endpoint: &str, success: bool, duration: Duration);

    /// Records a retry attempt.
    fn record_retry(&self, endpoint: &str, attempt: u32);

    /// Records a cache lookup.
    fn record_cache_lookup(&self, hit: bool);

    /// Records a call rejected by an open circuit.
    fn record_circuit_rejection(&self, endpoint: &str);

    /// Records an error by kind.
    fn record_error(&self, kind: &str);

    /// Gets a metrics snapshot.
    fn get_metrics(&self) -> ClientMetrics;

    /// Resets all metrics.
    fn reset(&self);
}

/// Metrics snapshot.
#[derive(Debug, Clone, Default)]
pub struct ClientMetrics {
    /// Total executed calls.
    pub total_requests: u64,
    /// Successful calls.
    pub successful_requests: u64,
    /// Failed calls.
    pub failed_requests: u64,
    /// Total latency in milliseconds.
    pub total_latency_ms: u64,
    /// Retry attempts.
    pub retries: u64,
    /// Cache hits.
    pub cache_hits: u64,
    /// Cache misses.
    pub cache_misses: u64,
    /// Calls rejected by open circuits.
    pub circuit_rejections: u64,
    /// Calls per endpoint.
    pub endpoints: HashMap<String, u64>,
    /// Error counts by kind.
    pub errors: HashMap<String, u64>,
}

impl ClientMetrics {
    /// Calculates average latency in milliseconds.
    pub fn average_latency_ms(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.total_latency_ms as f64 / self.total_requests as f64
        }
    }

    /// Calculates success rate as a percentage.
    pub fn success_rate(&self) -> f64 {
        if self.total_requests == 0 {
            100.0
        } else {
            (self.successful_requests as f64 / self.total_requests as f64) * 100.0
        }
    }

    /// Calculates the cache hit rate as a fraction in `[0, 1]`.
    pub fn cache_hit_rate(&self) -> f64 {
        let lookups = self.cache_hits + self.cache_misses;
        if lookups == 0 {
            0.0
        } else {
            self.cache_hits as f64 / lookups as f64
        }
    }
}

/// Default metrics collector implementation.
#[derive(Default)]
pub struct DefaultMetricsCollector {
    total_requests: AtomicU64,
    successful_requests: AtomicU64,
    failed_requests: AtomicU64,
    total_latency_ms: AtomicU64,
    retries: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    circuit_rejections: AtomicU64,
    endpoints: RwLock<HashMap<String, u64>>,
    errors: RwLock<HashMap<String, u64>>,
}

impl DefaultMetricsCollector {
    /// Creates a new metrics collector.
    pub fn new() -> Self {
        Self::default()
    }
}

impl MetricsCollector for DefaultMetricsCollector {
    fn record_request(&self, endpoint: &str, success: bool, duration: Duration) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);

        if success {
            self.successful_requests.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed_requests.fetch_add(1, Ordering::Relaxed);
        }

        self.total_latency_ms
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);

        *self
            .endpoints
            .write()
            .entry(endpoint.to_string())
            .or_insert(0) += 1;
    }

    fn record_retry(&self, _endpoint: &str, _attempt: u32) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    fn record_cache_lookup(&self, hit: bool) {
        if hit {
            self.cache_hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.cache_misses.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn record_circuit_rejection(&self, _endpoint: &str) {
        self.circuit_rejections.fetch_add(1, Ordering::Relaxed);
    }

    fn record_error(&self, kind: &str) {
        *self.errors.write().entry(kind.to_string()).or_insert(0) += 1;
    }

    fn get_metrics(&self) -> ClientMetrics {
        ClientMetrics {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            successful_requests: self.successful_requests.load(Ordering::Relaxed),
            failed_requests: self.failed_requests.load(Ordering::Relaxed),
            total_latency_ms: self.total_latency_ms.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            circuit_rejections: self.circuit_rejections.load(Ordering::Relaxed),
            endpoints: self.endpoints.read().clone(),
            errors: self.errors.read().clone(),
        }
    }

    fn reset(&self) {
        self.total_requests.store(0, Ordering::Relaxed);
        self.successful_requests.store(0, Ordering::Relaxed);
        self.failed_requests.store(0, Ordering::Relaxed);
        self.total_latency_ms.store(0, Ordering::Relaxed);
        self.retries.store(0, Ordering::Relaxed);
        self.cache_hits.store(0, Ordering::Relaxed);
        self.cache_misses.store(0, Ordering::Relaxed);
        self.circuit_rejections.store(0, Ordering::Relaxed);
        self.endpoints.write().clear();
        self.errors.write().clear();
    }
}

impl std::fmt::Debug for DefaultMetricsCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefaultMetricsCollector")
            .field("total_requests", &self.total_requests.load(Ordering::Relaxed))
            .field("failed_requests", &self.failed_requests.load(Ordering::Relaxed))
            .field("cache_hits", &self.cache_hits.load(Ordering::Relaxed))
            .finish()
    }
}

/// Metrics collector that discards everything.
#[derive(Debug, Default)]
pub struct NoopMetricsCollector;

impl MetricsCollector for NoopMetricsCollector {
    fn record_request(&self, _endpoint: &str, _success: bool, _duration: Duration) {}
    fn record_retry(&self, _endpoint: &str, _attempt: u32) {}
    fn record_cache_lookup(&self, _hit: bool) {}
    fn record_circuit_rejection(&self, _endpoint: &str) {}
    fn record_error(&self, _kind: &str) {}

    fn get_metrics(&self) -> ClientMetrics {
        ClientMetrics::default()
    }

    fn reset(&self) {}
}
