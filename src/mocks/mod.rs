//! Mock implementations for testing.
//!
//! `MockTransport` replays scripted responses per endpoint and records every
//! request it receives, so resilience behavior can be asserted without a
//! network.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use crate::errors::{AirbyteError, AirbyteResult};
use crate::transport::{error_for_status, HttpTransport};
use crate::types::{LogicalOperation, Method};

/// A recorded request for verification.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    /// HTTP method.
    pub method: Method,
    /// Endpoint identifier.
    pub endpoint: String,
    /// Request parameters.
    pub params: Map<String, Value>,
    /// Timeout the caller passed to the transport.
    pub timeout: Duration,
}

/// A mock response to return.
#[derive(Debug, Clone)]
pub enum MockResponse {
    /// Successful JSON body.
    Json(Value),
    /// Non-2xx HTTP status.
    Status {
        /// HTTP status code.
        status: u16,
        /// Error message.
        message: String,
        /// Retry-After header value.
        retry_after: Option<Duration>,
    },
    /// Connection-level failure with no response.
    ConnectionError(String),
    /// Waits before producing the inner response.
    Delayed(Duration, Box<MockResponse>),
}

impl MockResponse {
    /// Creates a successful JSON response.
    pub fn json(body: impl serde::Serialize) -> Self {
        MockResponse::Json(serde_json::to_value(body).unwrap_or(Value::Null))
    }

    /// Creates an error response.
    pub fn error(status: u16, message: &str) -> Self {
        MockResponse::Status {
            status,
            message: message.to_string(),
            retry_after: None,
        }
    }

    /// Creates a 503 Service Unavailable response.
    pub fn unavailable() -> Self {
        Self::error(503, "Service unavailable")
    }

    /// Creates a rate limit error response.
    pub fn rate_limited(retry_after: Duration) -> Self {
        MockResponse::Status {
            status: 429,
            message: "Rate limit exceeded".to_string(),
            retry_after: Some(retry_after),
        }
    }

    /// Delays this response.
    pub fn delayed(self, delay: Duration) -> Self {
        MockResponse::Delayed(delay, Box::new(self))
    }

    async fn resolve(self) -> AirbyteResult<Value> {
        let mut response = self;
        loop {
            match response {
                MockResponse::Json(value) => return Ok(value),
                MockResponse::Status {
                    status,
                    message,
                    retry_after,
                } => return Err(error_for_status(status, message, retry_after)),
                MockResponse::ConnectionError(message) => {
                    return Err(AirbyteError::transient(message))
                }
                MockResponse::Delayed(delay, inner) => {
                    tokio::time::sleep(delay).await;
                    response = *inner;
                }
            }
        }
    }
}

/// Mock transport for testing.
#[derive(Debug, Default)]
pub struct MockTransport {
    scripted: Mutex<HashMap<String, VecDeque<MockResponse>>>,
    defaults: Mutex<HashMap<String, MockResponse>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl MockTransport {
    /// Creates a new mock transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a one-shot response for an endpoint.
    pub fn enqueue(&self, endpoint: &str, response: MockResponse) -> &Self {
        self.scripted
            .lock()
            .entry(endpoint.to_string())
            .or_default()
            .push_back(response);
        self
    }

    /// Sets the response used once an endpoint's queue is empty.
    pub fn set_default(&self, endpoint: &str, response: MockResponse) -> &Self {
        self.defaults.lock().insert(endpoint.to_string(), response);
        self
    }

    /// Gets all recorded requests.
    pub fn get_requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().clone()
    }

    /// Gets the last recorded request.
    pub fn last_request(&self) -> Option<RecordedRequest> {
        self.requests.lock().last().cloned()
    }

    /// Returns the number of requests made.
    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// Returns the number of requests made to one endpoint.
    pub fn request_count_for(&self, endpoint: &str) -> usize {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.endpoint == endpoint)
            .count()
    }

    /// Clears all recorded requests.
    pub fn clear_requests(&self) {
        self.requests.lock().clear();
    }

    fn next_response(&self, endpoint: &str) -> Option<MockResponse> {
        let scripted = self
            .scripted
            .lock()
            .get_mut(endpoint)
            .and_then(VecDeque::pop_front);
        scripted.or_else(|| self.defaults.lock().get(endpoint).cloned())
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(&self, operation: &LogicalOperation, timeout: Duration) -> AirbyteResult<Value> {
        self.requests.lock().push(RecordedRequest {
            method: operation.method(),
            endpoint: operation.endpoint().to_string(),
            params: operation.params().clone(),
            timeout,
        });

        match self.next_response(operation.endpoint()) {
            Some(response) => response.resolve().await,
            None => Err(AirbyteError::NotFound {
                message: format!("No mock response for '{}'", operation.endpoint()),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_scripted_then_default() {
        let transport = MockTransport::new();
        transport
            .enqueue("health", MockResponse::unavailable())
            .set_default("health", MockResponse::json(json!({"available": true})));

        let op = LogicalOperation::get("health");
        let timeout = Duration::from_secs(1);

        assert!(transport.send(&op, timeout).await.unwrap_err().is_retryable());
        assert_eq!(
            transport.send(&op, timeout).await.unwrap(),
            json!({"available": true})
        );
        assert_eq!(
            transport.send(&op, timeout).await.unwrap(),
            json!({"available": true})
        );
        assert_eq!(transport.request_count_for("health"), 3);
    }

    #[tokio::test]
    async fn test_unscripted_endpoint_is_not_found() {
        let transport = MockTransport::new();
        let result = transport
            .send(&LogicalOperation::get("sources/list"), Duration::from_secs(1))
            .await;

        assert!(matches!(result, Err(AirbyteError::NotFound { .. })));
        assert_eq!(transport.last_request().unwrap().endpoint, "sources/list");
    }
}
