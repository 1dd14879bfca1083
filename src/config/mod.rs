//! Configuration module for the Airbyte client.
//!
//! Provides configuration management including credentials, base URL,
//! timeouts, and the limits used by the resilience layer.

use secrecy::SecretString;
use std::str::FromStr;
use std::time::Duration;

use crate::auth::Credentials;
use crate::errors::{AirbyteError, AirbyteResult};

/// Default base URL for the Airbyte API.
pub const DEFAULT_BASE_URL: &str = "https://api.airbyte.com/v1";

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default total attempts for idempotent calls.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default outgoing request rate.
pub const DEFAULT_RATE_LIMIT_PER_SECOND: u32 = 10;

/// Default cache entry lifetime.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// Default maximum number of cached responses.
pub const DEFAULT_CACHE_CAPACITY: usize = 100;

/// Default consecutive failures before a circuit opens.
pub const DEFAULT_CIRCUIT_FAILURE_THRESHOLD: u32 = 5;

/// Default time an open circuit waits before allowing a trial.
pub const DEFAULT_CIRCUIT_RECOVERY_TIMEOUT: Duration = Duration::from_secs(60);

/// Default fan-out for bulk operations.
pub const DEFAULT_MAX_CONCURRENT: usize = 5;

/// Default interval between job status polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Default wall-clock budget for waiting on a job.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(3600);

/// Default first retry delay.
pub const DEFAULT_RETRY_BASE_DELAY: Duration = Duration::from_secs(1);

/// Default retry delay cap.
pub const DEFAULT_RETRY_MAX_DELAY: Duration = Duration::from_secs(10);

/// Configuration for the Airbyte client.
#[derive(Clone)]
pub struct AirbyteConfig {
    /// Credentials carried to the transport.
    pub(crate) credentials: Credentials,
    /// Base URL for API requests.
    pub base_url: String,
    /// Request timeout.
    pub timeout: Duration,
    /// Total attempts for idempotent calls.
    pub max_retries: u32,
    /// First retry delay.
    pub retry_base_delay: Duration,
    /// Retry delay cap.
    pub retry_max_delay: Duration,
    /// Outgoing request rate.
    pub rate_limit_per_second: u32,
    /// Cache entry lifetime.
    pub cache_ttl: Duration,
    /// Maximum cached responses.
    pub cache_capacity: usize,
    /// Consecutive failures before a circuit opens.
    pub circuit_failure_threshold: u32,
    /// Time an open circuit waits before a trial.
    pub circuit_recovery_timeout: Duration,
    /// Fan-out for bulk operations.
    pub max_concurrent: usize,
    /// Interval between job status polls.
    pub poll_interval: Duration,
    /// Budget for waiting on a job.
    pub poll_timeout: Duration,
    /// Signed license token for premium features.
    pub(crate) license_key: Option<SecretString>,
    /// Secret used to verify the license token.
    pub(crate) license_secret: Option<SecretString>,
    /// Custom headers to include in requests.
    pub custom_headers: Vec<(String, String)>,
}

impl AirbyteConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> AirbyteConfigBuilder {
        AirbyteConfigBuilder::new()
    }

    /// Creates a configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `AIRBYTE_API_TOKEN`, or `BASIC_AUTH_USERNAME` and `BASIC_AUTH_PASSWORD` (required)
    /// - `AIRBYTE_BASE_URL`
    /// - `AIRBYTE_TIMEOUT_SECONDS`
    /// - `AIRBYTE_MAX_RETRIES`
    /// - `AIRBYTE_RATE_LIMIT_PER_SECOND`
    /// - `AIRBYTE_CACHE_TTL_SECONDS`
    /// - `AIRBYTE_CIRCUIT_FAILURE_THRESHOLD`
    /// - `AIRBYTE_CIRCUIT_RECOVERY_TIMEOUT_SECONDS`
    /// - `AIRBYTE_MAX_CONCURRENT`
    /// - `AIRBYTE_LICENSE_KEY` and `AIRBYTE_LICENSE_SECRET`
    pub fn from_env() -> AirbyteResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Creates a configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> AirbyteResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut builder = AirbyteConfigBuilder::new();

        if let Some(token) = lookup("AIRBYTE_API_TOKEN") {
            builder = builder.credentials(Credentials::bearer(token));
        } else {
            match (lookup("BASIC_AUTH_USERNAME"), lookup("BASIC_AUTH_PASSWORD")) {
                (Some(username), Some(password)) => {
                    builder = builder.credentials(Credentials::basic(username, password));
                }
                _ => {
                    return Err(AirbyteError::configuration(
                        "Set AIRBYTE_API_TOKEN or BASIC_AUTH_USERNAME and BASIC_AUTH_PASSWORD",
                    ))
                }
            }
        }

        if let Some(base_url) = lookup("AIRBYTE_BASE_URL") {
            builder = builder.base_url(base_url);
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, "AIRBYTE_TIMEOUT_SECONDS")? {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        if let Some(retries) = parse_var(&lookup, "AIRBYTE_MAX_RETRIES")? {
            builder = builder.max_retries(retries);
        }
        if let Some(rate) = parse_var(&lookup, "AIRBYTE_RATE_LIMIT_PER_SECOND")? {
            builder = builder.rate_limit_per_second(rate);
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, "AIRBYTE_CACHE_TTL_SECONDS")? {
            builder = builder.cache_ttl(Duration::from_secs(secs));
        }
        if let Some(threshold) = parse_var(&lookup, "AIRBYTE_CIRCUIT_FAILURE_THRESHOLD")? {
            builder = builder.circuit_failure_threshold(threshold);
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, "AIRBYTE_CIRCUIT_RECOVERY_TIMEOUT_SECONDS")? {
            builder = builder.circuit_recovery_timeout(Duration::from_secs(secs));
        }
        if let Some(max) = parse_var(&lookup, "AIRBYTE_MAX_CONCURRENT")? {
            builder = builder.max_concurrent(max);
        }
        if let Some(license) = lookup("AIRBYTE_LICENSE_KEY") {
            builder = builder.license_key(license);
        }
        if let Some(secret) = lookup("AIRBYTE_LICENSE_SECRET") {
            builder = builder.license_secret(secret);
        }

        builder.build()
    }

    /// Returns the credentials.
    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Returns the license token and its verification secret, if both are set.
    pub(crate) fn license(&self) -> Option<(&SecretString, &SecretString)> {
        match (&self.license_key, &self.license_secret) {
            (Some(key), Some(secret)) => Some((key, secret)),
            _ => None,
        }
    }

    /// Returns the full URL for an endpoint.
    pub fn endpoint_url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'))
    }
}

fn parse_var<T, F>(lookup: &F, name: &str) -> AirbyteResult<Option<T>>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => Ok(None),
        Some(raw) => raw.trim().parse::<T>().map(Some).map_err(|_| {
            AirbyteError::configuration(format!("{} has an invalid value: '{}'", name, raw))
        }),
    }
}

impl std::fmt::Debug for AirbyteConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AirbyteConfig")
            .field("credentials", &self.credentials)
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .field("rate_limit_per_second", &self.rate_limit_per_second)
            .field("cache_ttl", &self.cache_ttl)
            .field("cache_capacity", &self.cache_capacity)
            .field("circuit_failure_threshold", &self.circuit_failure_threshold)
            .field("circuit_recovery_timeout", &self.circuit_recovery_timeout)
            .field("max_concurrent", &self.max_concurrent)
            .field("license_key", &self.license_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Builder for `AirbyteConfig`.
#[derive(Default)]
pub struct AirbyteConfigBuilder {
    credentials: Option<Credentials>,
    base_url: Option<String>,
    timeout: Option<Duration>,
    max_retries: Option<u32>,
    retry_base_delay: Option<Duration>,
    retry_max_delay: Option<Duration>,
    rate_limit_per_second: Option<u32>,
    cache_ttl: Option<Duration>,
    cache_capacity: Option<usize>,
    circuit_failure_threshold: Option<u32>,
    circuit_recovery_timeout: Option<Duration>,
    max_concurrent: Option<usize>,
    poll_interval: Option<Duration>,
    poll_timeout: Option<Duration>,
    license_key: Option<String>,
    license_secret: Option<String>,
    custom_headers: Vec<(String, String)>,
}

impl AirbyteConfigBuilder {
    /// Creates a new configuration builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the credentials.
    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Uses HTTP basic authentication.
    pub fn basic_auth(self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials(Credentials::basic(username, password))
    }

    /// Uses bearer token authentication.
    pub fn bearer_token(self, token: impl Into<String>) -> Self {
        self.credentials(Credentials::bearer(token))
    }

    /// Sets the base URL.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Sets the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the total attempts for idempotent calls.
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Sets the first retry delay and the delay cap.
    pub fn retry_delays(mut self, base: Duration, max: Duration) -> Self {
        self.retry_base_delay = Some(base);
        self.retry_max_delay = Some(max);
        self
    }

    /// Sets the outgoing request rate.
    pub fn rate_limit_per_second(mut self, rate: u32) -> Self {
        self.rate_limit_per_second = Some(rate);
        self
    }

    /// Sets the cache entry lifetime. Zero disables caching.
    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = Some(ttl);
        self
    }

    /// Sets the maximum number of cached responses.
    pub fn cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = Some(capacity);
        self
    }

    /// Sets the consecutive failures before a circuit opens.
    pub fn circuit_failure_threshold(mut self, threshold: u32) -> Self {
        self.circuit_failure_threshold = Some(threshold);
        self
    }

    /// Sets the time an open circuit waits before a trial.
    pub fn circuit_recovery_timeout(mut self, timeout: Duration) -> Self {
        self.circuit_recovery_timeout = Some(timeout);
        self
    }

    /// Sets the fan-out for bulk operations.
    pub fn max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent = Some(max);
        self
    }

    /// Sets the job polling interval and budget.
    pub fn polling(mut self, interval: Duration, timeout: Duration) -> Self {
        self.poll_interval = Some(interval);
        self.poll_timeout = Some(timeout);
        self
    }

    /// Sets the signed license token.
    pub fn license_key(mut self, license: impl Into<String>) -> Self {
        self.license_key = Some(license.into());
        self
    }

    /// Sets the secret used to verify the license token.
    pub fn license_secret(mut self, secret: impl Into<String>) -> Self {
        self.license_secret = Some(secret.into());
        self
    }

    /// Adds a custom header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.custom_headers.push((name.into(), value.into()));
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> AirbyteResult<AirbyteConfig> {
        let credentials = self
            .credentials
            .ok_or_else(|| AirbyteError::configuration("Credentials are required"))?;

        if credentials.is_empty() {
            return Err(AirbyteError::configuration("Credentials cannot be empty"));
        }

        let base_url = self
            .base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(AirbyteError::configuration(
                "Base URL must start with http:// or https://",
            ));
        }
        url::Url::parse(&base_url)?;

        let max_retries = self.max_retries.unwrap_or(DEFAULT_MAX_RETRIES);
        let rate_limit_per_second = self
            .rate_limit_per_second
            .unwrap_or(DEFAULT_RATE_LIMIT_PER_SECOND);
        let cache_capacity = self.cache_capacity.unwrap_or(DEFAULT_CACHE_CAPACITY);
        let circuit_failure_threshold = self
            .circuit_failure_threshold
            .unwrap_or(DEFAULT_CIRCUIT_FAILURE_THRESHOLD);
        let max_concurrent = self.max_concurrent.unwrap_or(DEFAULT_MAX_CONCURRENT);

        for (name, value) in [
            ("max_retries", max_retries as usize),
            ("rate_limit_per_second", rate_limit_per_second as usize),
            ("cache_capacity", cache_capacity),
            ("circuit_failure_threshold", circuit_failure_threshold as usize),
            ("max_concurrent", max_concurrent),
        ] {
            if value == 0 {
                return Err(AirbyteError::configuration(format!(
                    "{} must be greater than zero",
                    name
                )));
            }
        }

        let retry_base_delay = self.retry_base_delay.unwrap_or(DEFAULT_RETRY_BASE_DELAY);
        let retry_max_delay = self.retry_max_delay.unwrap_or(DEFAULT_RETRY_MAX_DELAY);
        if retry_max_delay < retry_base_delay {
            return Err(AirbyteError::configuration(
                "Retry max delay must not be below the base delay",
            ));
        }

        Ok(AirbyteConfig {
            credentials,
            base_url,
            timeout: self.timeout.unwrap_or(DEFAULT_TIMEOUT),
            max_retries,
            retry_base_delay,
            retry_max_delay,
            rate_limit_per_second,
            cache_ttl: self.cache_ttl.unwrap_or(DEFAULT_CACHE_TTL),
            cache_capacity,
            circuit_failure_threshold,
            circuit_recovery_timeout: self
                .circuit_recovery_timeout
                .unwrap_or(DEFAULT_CIRCUIT_RECOVERY_TIMEOUT),
            max_concurrent,
            poll_interval: self.poll_interval.unwrap_or(DEFAULT_POLL_INTERVAL),
            poll_timeout: self.poll_timeout.unwrap_or(DEFAULT_POLL_TIMEOUT),
            license_key: self.license_key.map(SecretString::new),
            license_secret: self.license_secret.map(SecretString::new),
            custom_headers: self.custom_headers,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_config_builder_defaults() {
        let config = AirbyteConfig::builder()
            .basic_auth("user", "pass")
            .build()
            .unwrap();

        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
        assert_eq!(config.max_retries, DEFAULT_MAX_RETRIES);
        assert_eq!(config.rate_limit_per_second, DEFAULT_RATE_LIMIT_PER_SECOND);
        assert_eq!(config.cache_ttl, DEFAULT_CACHE_TTL);
        assert_eq!(config.circuit_failure_threshold, DEFAULT_CIRCUIT_FAILURE_THRESHOLD);
        assert_eq!(config.circuit_recovery_timeout, DEFAULT_CIRCUIT_RECOVERY_TIMEOUT);
        assert_eq!(config.max_concurrent, DEFAULT_MAX_CONCURRENT);
        assert!(config.license().is_none());
    }

    #[test]
    fn test_config_builder_missing_credentials() {
        assert!(AirbyteConfig::builder().build().is_err());
        assert!(AirbyteConfig::builder().bearer_token("").build().is_err());
    }

    #[test]
    fn test_config_builder_invalid_base_url() {
        let result = AirbyteConfig::builder()
            .bearer_token("t")
            .base_url("ftp://airbyte.local")
            .build();
        assert!(matches!(result, Err(AirbyteError::Configuration { .. })));
    }

    #[test]
    fn test_config_rejects_zero_limits() {
        let result = AirbyteConfig::builder()
            .bearer_token("t")
            .max_concurrent(0)
            .build();
        assert!(result.is_err());

        let result = AirbyteConfig::builder()
            .bearer_token("t")
            .rate_limit_per_second(0)
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_endpoint_url() {
        let config = AirbyteConfig::builder()
            .bearer_token("t")
            .base_url("http://localhost:8000/api/v1/")
            .build()
            .unwrap();

        assert_eq!(
            config.endpoint_url("/connections/get"),
            "http://localhost:8000/api/v1/connections/get"
        );
    }

    #[test]
    fn test_from_lookup_basic_auth_and_limits() {
        let config = AirbyteConfig::from_lookup(lookup_from(&[
            ("BASIC_AUTH_USERNAME", "airbyte"),
            ("BASIC_AUTH_PASSWORD", "password"),
            ("AIRBYTE_BASE_URL", "http://localhost:8000/api/v1"),
            ("AIRBYTE_MAX_RETRIES", "5"),
            ("AIRBYTE_RATE_LIMIT_PER_SECOND", "2"),
            ("AIRBYTE_CACHE_TTL_SECONDS", "60"),
            ("AIRBYTE_CIRCUIT_FAILURE_THRESHOLD", "3"),
            ("AIRBYTE_CIRCUIT_RECOVERY_TIMEOUT_SECONDS", "15"),
            ("AIRBYTE_MAX_CONCURRENT", "8"),
        ]))
        .unwrap();

        assert!(matches!(config.credentials(), Credentials::Basic { .. }));
        assert_eq!(config.base_url, "http://localhost:8000/api/v1");
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.rate_limit_per_second, 2);
        assert_eq!(config.cache_ttl, Duration::from_secs(60));
        assert_eq!(config.circuit_failure_threshold, 3);
        assert_eq!(config.circuit_recovery_timeout, Duration::from_secs(15));
        assert_eq!(config.max_concurrent, 8);
    }

    #[test]
    fn test_from_lookup_duration_variables() {
        let config = AirbyteConfig::from_lookup(lookup_from(&[
            ("AIRBYTE_API_TOKEN", "tok"),
            ("AIRBYTE_TIMEOUT_SECONDS", " 45 "),
            ("AIRBYTE_CACHE_TTL_SECONDS", "0"),
        ]))
        .unwrap();

        assert_eq!(config.timeout, Duration::from_secs(45));
        assert_eq!(config.cache_ttl, Duration::ZERO);
        assert_eq!(config.circuit_recovery_timeout, DEFAULT_CIRCUIT_RECOVERY_TIMEOUT);

        let err = AirbyteConfig::from_lookup(lookup_from(&[
            ("AIRBYTE_API_TOKEN", "tok"),
            ("AIRBYTE_TIMEOUT_SECONDS", "-1"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("AIRBYTE_TIMEOUT_SECONDS"));
    }

    #[test]
    fn test_from_lookup_prefers_bearer_token() {
        let config = AirbyteConfig::from_lookup(lookup_from(&[
            ("AIRBYTE_API_TOKEN", "tok"),
            ("BASIC_AUTH_USERNAME", "airbyte"),
            ("BASIC_AUTH_PASSWORD", "password"),
        ]))
        .unwrap();

        assert!(matches!(config.credentials(), Credentials::Bearer { .. }));
    }

    #[test]
    fn test_from_lookup_rejects_unparseable_numbers() {
        let result = AirbyteConfig::from_lookup(lookup_from(&[
            ("AIRBYTE_API_TOKEN", "tok"),
            ("AIRBYTE_MAX_RETRIES", "three"),
        ]));

        let err = result.unwrap_err();
        assert!(err.to_string().contains("AIRBYTE_MAX_RETRIES"));
    }

    #[test]
    fn test_from_lookup_requires_credentials() {
        let result = AirbyteConfig::from_lookup(lookup_from(&[("BASIC_AUTH_USERNAME", "u")]));
        assert!(matches!(result, Err(AirbyteError::Configuration { .. })));
    }

    #[test]
    fn test_config_debug_redacts_secrets() {
        let config = AirbyteConfig::builder()
            .basic_auth("user", "secret-password")
            .license_key("license-jwt")
            .build()
            .unwrap();

        let debug_str = format!("{:?}", config);
        assert!(debug_str.contains("[REDACTED]"));
        assert!(!debug_str.contains("secret-password"));
        assert!(!debug_str.contains("license-jwt"));
    }
}
