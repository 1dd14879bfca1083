//! Observability module for metrics and logging.

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, LogFormat, LogLevel, LoggingConfig};
pub use metrics::{ClientMetrics, DefaultMetricsCollector, MetricsCollector, NoopMetricsCollector};
