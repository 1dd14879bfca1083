//! HTTP transport module for the Airbyte client.
//!
//! The transport turns a [`LogicalOperation`] into one HTTP exchange and maps
//! the response status onto the error taxonomy. It does not retry, throttle
//! or cache; that is the executor's job.

mod http_transport;

pub use http_transport::{ReqwestTransport, TransportConfig};
#[cfg(any(test, feature = "mocks"))]
pub(crate) use http_transport::error_for_status;

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

use crate::errors::AirbyteResult;
use crate::types::LogicalOperation;

/// Trait for HTTP transport implementations.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Sends one request and returns the decoded JSON body.
    ///
    /// An empty success body (e.g. `204`) decodes to an empty object.
    async fn send(&self, operation: &LogicalOperation, timeout: Duration) -> AirbyteResult<Value>;
}
