//! Error types for the Airbyte client.
//!
//! The taxonomy separates faults the client recovers from locally
//! (transient transport failures) from structural faults that are always
//! surfaced to the caller (open circuits, missing entitlements, exhausted
//! retry or polling budgets).

use std::time::Duration;
use thiserror::Error;

/// Result type alias for Airbyte operations.
pub type AirbyteResult<T> = Result<T, AirbyteError>;

/// Error type for Airbyte client operations.
#[derive(Debug, Error)]
pub enum AirbyteError {
    /// Configuration error (missing credentials, invalid base URL, etc.)
    #[error("Configuration error: {message}")]
    Configuration {
        /// Error message describing the configuration issue.
        message: String,
    },

    /// Transport-level or server-side failure that may succeed when retried.
    #[error("Transient transport error: {message}")]
    TransientTransport {
        /// Error message.
        message: String,
        /// HTTP status code, when a response was received.
        status: Option<u16>,
        /// Server-requested delay before retrying.
        retry_after: Option<Duration>,
    },

    /// The circuit for this endpoint is open; the call was not attempted.
    #[error("Circuit open for endpoint '{endpoint}'")]
    CircuitOpen {
        /// Endpoint whose circuit rejected the call.
        endpoint: String,
    },

    /// The retry budget was exhausted.
    #[error("Request failed after {attempts} attempt(s): {source}")]
    RequestFailed {
        /// Number of attempts made.
        attempts: u32,
        /// The last failure observed.
        #[source]
        source: Box<AirbyteError>,
    },

    /// The caller is not entitled to a premium operation.
    #[error("Entitlement error: {message}")]
    Entitlement {
        /// Error message.
        message: String,
    },

    /// A job did not reach a terminal state within the polling budget.
    #[error("Polling '{operation_id}' timed out after {elapsed:?}")]
    PollTimeout {
        /// Identifier of the job being polled.
        operation_id: String,
        /// Wall-clock time spent polling.
        elapsed: Duration,
    },

    /// Authentication or authorization failure.
    #[error("Authentication failed: {message}")]
    Authentication {
        /// Error message from the API.
        message: String,
    },

    /// Resource not found.
    #[error("Not found: {message}")]
    NotFound {
        /// Error message.
        message: String,
    },

    /// Non-retryable client-side API error.
    #[error("API error (HTTP {status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error message.
        message: String,
    },

    /// Request validation failed before anything was sent.
    #[error("Validation error: {message}")]
    Validation {
        /// Error message describing the validation issue.
        message: String,
    },

    /// Serialization/deserialization error.
    #[error("Serialization error: {message}")]
    Serialization {
        /// Error message.
        message: String,
    },

    /// Internal client error.
    #[error("Internal error: {message}")]
    Internal {
        /// Error message.
        message: String,
    },
}

impl AirbyteError {
    /// Returns true if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AirbyteError::TransientTransport { .. })
    }

    /// Returns the retry-after duration if available.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            AirbyteError::TransientTransport { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    /// Returns true if this error counts as a failure for the circuit breaker.
    ///
    /// Client-side errors (4xx) mean the endpoint answered, so they do not.
    pub fn trips_circuit(&self) -> bool {
        match self {
            AirbyteError::TransientTransport { .. } => true,
            AirbyteError::RequestFailed { source, .. } => source.trips_circuit(),
            _ => false,
        }
    }

    /// Returns a stable label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            AirbyteError::Configuration { .. } => "configuration",
            AirbyteError::TransientTransport { .. } => "transient_transport",
            AirbyteError::CircuitOpen { .. } => "circuit_open",
            AirbyteError::RequestFailed { .. } => "request_failed",
            AirbyteError::Entitlement { .. } => "entitlement",
            AirbyteError::PollTimeout { .. } => "poll_timeout",
            AirbyteError::Authentication { .. } => "authentication",
            AirbyteError::NotFound { .. } => "not_found",
            AirbyteError::Api { .. } => "api",
            AirbyteError::Validation { .. } => "validation",
            AirbyteError::Serialization { .. } => "serialization",
            AirbyteError::Internal { .. } => "internal",
        }
    }

    /// Creates a transient transport error without a status code.
    pub fn transient(message: impl Into<String>) -> Self {
        AirbyteError::TransientTransport {
            message: message.into(),
            status: None,
            retry_after: None,
        }
    }

    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        AirbyteError::Validation {
            message: message.into(),
        }
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        AirbyteError::Configuration {
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for AirbyteError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() || err.is_request() || err.is_body() {
            AirbyteError::TransientTransport {
                message: err.to_string(),
                status: err.status().map(|s| s.as_u16()),
                retry_after: None,
            }
        } else if err.is_decode() {
            AirbyteError::Serialization {
                message: err.to_string(),
            }
        } else {
            AirbyteError::Internal {
                message: err.to_string(),
            }
        }
    }
}

impl From<serde_json::Error> for AirbyteError {
    fn from(err: serde_json::Error) -> Self {
        AirbyteError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<url::ParseError> for AirbyteError {
    fn from(err: url::ParseError) -> Self {
        AirbyteError::Configuration {
            message: format!("Invalid URL: {}", err),
        }
    }
}
