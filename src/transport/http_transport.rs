//! HTTP transport implementation using reqwest.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

use super::HttpTransport;
use crate::auth::{AuthManager, CredentialsAuthManager};
use crate::config::AirbyteConfig;
use crate::errors::{AirbyteError, AirbyteResult};
use crate::types::LogicalOperation;

/// Configuration for ReqwestTransport.
pub struct TransportConfig {
    /// Base URL for the API.
    pub base_url: String,
    /// Default request timeout.
    pub timeout: Duration,
}

impl TransportConfig {
    /// Creates a transport configuration from client configuration.
    pub fn from_config(config: &AirbyteConfig) -> Self {
        Self {
            base_url: config.base_url.clone(),
            timeout: config.timeout,
        }
    }
}

/// Reqwest-based HTTP transport implementation.
pub struct ReqwestTransport {
    client: reqwest::Client,
    base_url: String,
    auth: Arc<dyn AuthManager>,
}

impl ReqwestTransport {
    /// Creates a transport with credentials and headers taken from client configuration.
    pub fn from_config(config: &AirbyteConfig) -> AirbyteResult<Self> {
        let auth = CredentialsAuthManager::new(config.credentials().clone())
            .with_custom_headers(config.custom_headers.clone());
        Self::with_config(TransportConfig::from_config(config), Arc::new(auth))
    }

    /// Creates a new transport with configuration.
    pub fn with_config(config: TransportConfig, auth: Arc<dyn AuthManager>) -> AirbyteResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .pool_max_idle_per_host(10)
            .build()
            .map_err(|e| {
                AirbyteError::configuration(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self::with_client(client, config.base_url, auth))
    }

    /// Creates a new transport with a custom client.
    pub fn with_client(
        client: reqwest::Client,
        base_url: impl Into<String>,
        auth: Arc<dyn AuthManager>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            auth,
        }
    }

    /// Builds a full URL from an endpoint.
    fn build_url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint)
    }

    /// Maps HTTP status codes to Airbyte errors.
    fn map_http_error(status: u16, body: &[u8], headers: &HeaderMap) -> AirbyteError {
        let message = extract_message(body).unwrap_or_else(|| format!("HTTP {} error", status));
        error_for_status(status, message, extract_retry_after(headers))
    }
}

/// Maps a non-2xx status onto the error taxonomy.
pub(crate) fn error_for_status(
    status: u16,
    message: String,
    retry_after: Option<Duration>,
) -> AirbyteError {
    match status {
        401 | 403 => AirbyteError::Authentication { message },
        404 => AirbyteError::NotFound { message },
        429 | 500..=599 => AirbyteError::TransientTransport {
            message,
            status: Some(status),
            retry_after,
        },
        _ => AirbyteError::Api { status, message },
    }
}

/// Pulls a human-readable message out of an error body.
fn extract_message(body: &[u8]) -> Option<String> {
    let value: Value = serde_json::from_slice(body).ok()?;
    ["message", "detail", "error"]
        .iter()
        .find_map(|key| value.get(*key).and_then(Value::as_str))
        .map(str::to_string)
}

/// Extracts retry-after duration from headers.
fn extract_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| parse_retry_after(v, Utc::now()))
}

/// Parses `Retry-After` as delta-seconds or an HTTP-date. A date in the
/// past means "retry now".
fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }

    let at = DateTime::parse_from_rfc2822(value).ok()?.with_timezone(&Utc);
    Some((at - now).to_std().unwrap_or(Duration::ZERO))
}

/// Flattens parameters into query pairs. Nulls are dropped; strings are
/// sent bare and everything else as its JSON text.
fn query_pairs(params: &Map<String, Value>) -> Vec<(String, String)> {
    params
        .iter()
        .filter(|(_, value)| !value.is_null())
        .map(|(key, value)| {
            let value = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (key.clone(), value)
        })
        .collect()
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, operation: &LogicalOperation, timeout: Duration) -> AirbyteResult<Value> {
        let url = self.build_url(operation.endpoint());
        let request_id = Uuid::new_v4().to_string();

        let mut request = self
            .client
            .request(operation.method().into(), &url)
            .timeout(timeout)
            .header("X-Request-Id", &request_id);

        for (key, value) in self.auth.get_headers() {
            request = request.header(key, value);
        }

        request = if operation.method().uses_query() {
            request.query(&query_pairs(operation.params()))
        } else {
            request.json(&Value::Object(operation.params().clone()))
        };

        let response = request.send().await?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.bytes().await?;

        debug!(
            request_id = %request_id,
            method = %operation.method(),
            endpoint = operation.endpoint(),
            status,
            "Airbyte API response"
        );

        if !(200..300).contains(&status) {
            return Err(Self::map_http_error(status, &body, &headers));
        }

        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Object(Map::new()));
        }

        Ok(serde_json::from_slice(&body)?)
    }
}

impl std::fmt::Debug for ReqwestTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReqwestTransport")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}
