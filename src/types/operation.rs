//! Logical operations and their cache signatures.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::fmt;

/// HTTP method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    /// GET request.
    Get,
    /// POST request.
    Post,
    /// PUT request.
    Put,
    /// PATCH request.
    Patch,
    /// DELETE request.
    Delete,
}

impl Method {
    /// Returns the method name as sent on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }

    /// Returns true if parameters travel in the query string.
    pub fn uses_query(&self) -> bool {
        matches!(self, Method::Get | Method::Delete)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

/// An opaque unit of work against the remote API: an endpoint plus parameters.
///
/// Operations are immutable once built; the `param` methods consume and
/// return the value so construction reads as a chain.
#[derive(Debug, Clone, PartialEq)]
pub struct LogicalOperation {
    method: Method,
    endpoint: String,
    params: Map<String, Value>,
}

impl LogicalOperation {
    /// Creates an operation with no parameters.
    pub fn new(method: Method, endpoint: impl Into<String>) -> Self {
        Self {
            method,
            endpoint: endpoint.into().trim_matches('/').to_string(),
            params: Map::new(),
        }
    }

    /// Shorthand for a GET operation.
    pub fn get(endpoint: impl Into<String>) -> Self {
        Self::new(Method::Get, endpoint)
    }

    /// Shorthand for a POST operation.
    pub fn post(endpoint: impl Into<String>) -> Self {
        Self::new(Method::Post, endpoint)
    }

    /// Adds a parameter.
    pub fn param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Replaces all parameters.
    pub fn with_params(mut self, params: Map<String, Value>) -> Self {
        self.params = params;
        self
    }

    /// Returns the HTTP method.
    pub fn method(&self) -> Method {
        self.method
    }

    /// Returns the endpoint identifier, e.g. `connections/get`.
    ///
    /// Circuit breaker state is scoped by this value.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Returns the parameters.
    pub fn params(&self) -> &Map<String, Value> {
        &self.params
    }

    /// Computes the cache signature for this operation.
    pub fn signature(&self) -> RequestSignature {
        RequestSignature::compute(self)
    }
}

/// Deterministic cache key for a [`LogicalOperation`].
///
/// Equal for operations that differ only in parameter ordering or in
/// top-level parameters explicitly set to `null`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestSignature(String);

impl RequestSignature {
    /// Computes the signature of an operation.
    pub fn compute(operation: &LogicalOperation) -> Self {
        let params: Map<String, Value> = operation
            .params
            .iter()
            .filter(|(_, v)| !v.is_null())
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let mut canonical = String::new();
        write_canonical(&Value::Object(params), &mut canonical);

        let mut hasher = Sha256::new();
        hasher.update(operation.method.as_str().as_bytes());
        hasher.update(b" ");
        hasher.update(operation.endpoint.as_bytes());
        hasher.update(b" ");
        hasher.update(canonical.as_bytes());

        Self(hex::encode(hasher.finalize()))
    }

    /// Returns the hex digest.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Writes JSON with object keys sorted at every depth, independent of how
/// `serde_json::Map` orders its entries.
fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                if let Some(inner) = map.get(key) {
                    write_canonical(inner, out);
                }
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}
