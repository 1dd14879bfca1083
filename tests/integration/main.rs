//! Integration tests using WireMock
//!
//! These tests drive the client against a mock HTTP server and cover the
//! full request/response cycle: authentication headers, JSON bodies, error
//! mapping, retries, circuit breaking, caching and bulk sync polling.

mod bulk_sync;
mod resilience;
mod services;

use std::time::Duration;

use airbyte_client::{AirbyteClient, AirbyteConfig};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockBuilder, MockServer, ResponseTemplate};

/// Basic auth header for `airbyte:password`.
pub const BASIC_AUTH_HEADER: &str = "Basic YWlyYnl0ZTpwYXNzd29yZA==";

/// Starts a mock server.
pub async fn setup_mock_server() -> MockServer {
    MockServer::start().await
}

/// Configuration pointing at the mock server with fast retries and polling.
pub fn test_config(server: &MockServer) -> AirbyteConfig {
    AirbyteConfig::builder()
        .base_url(server.uri())
        .basic_auth("airbyte", "password")
        .retry_delays(Duration::from_millis(10), Duration::from_millis(50))
        .rate_limit_per_second(1000)
        .polling(Duration::from_millis(20), Duration::from_secs(5))
        .build()
        .expect("valid test config")
}

/// Client over the reqwest transport pointing at the mock server.
pub fn test_client(server: &MockServer) -> AirbyteClient {
    AirbyteClient::new(test_config(server)).expect("Failed to build client")
}

/// POST mock that requires the basic auth header.
pub fn mock_post_with_auth(endpoint: &str) -> MockBuilder {
    Mock::given(method("POST"))
        .and(path(format!("/{}", endpoint)))
        .and(header("Authorization", BASIC_AUTH_HEADER))
}

/// Success response template.
pub fn success_response(body: serde_json::Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(body)
}

/// Error response template with an Airbyte-style message body.
pub fn error_response(status: u16, message: &str) -> ResponseTemplate {
    ResponseTemplate::new(status).set_body_json(serde_json::json!({ "message": message }))
}
