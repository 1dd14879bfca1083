//! Authentication module for the Airbyte client.
//!
//! Credentials are opaque to the rest of the client: they are turned into
//! request headers here and carried through to the transport.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use secrecy::{ExposeSecret, SecretString};
use std::collections::HashMap;

/// Credentials for the Airbyte API.
#[derive(Clone)]
pub enum Credentials {
    /// HTTP basic authentication.
    Basic {
        /// Username.
        username: String,
        /// Password (stored securely).
        password: SecretString,
    },
    /// Bearer token authentication.
    Bearer {
        /// Access token (stored securely).
        token: SecretString,
    },
}

impl Credentials {
    /// Creates basic credentials.
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Credentials::Basic {
            username: username.into(),
            password: SecretString::new(password.into()),
        }
    }

    /// Creates bearer credentials.
    pub fn bearer(token: impl Into<String>) -> Self {
        Credentials::Bearer {
            token: SecretString::new(token.into()),
        }
    }

    /// Returns the `Authorization` header value.
    pub fn authorization_header(&self) -> String {
        match self {
            Credentials::Basic { username, password } => {
                let raw = format!("{}:{}", username, password.expose_secret());
                format!("Basic {}", STANDARD.encode(raw))
            }
            Credentials::Bearer { token } => format!("Bearer {}", token.expose_secret()),
        }
    }

    /// Returns true if the secret part is empty.
    pub fn is_empty(&self) -> bool {
        match self {
            Credentials::Basic { username, password } => {
                username.is_empty() || password.expose_secret().is_empty()
            }
            Credentials::Bearer { token } => token.expose_secret().is_empty(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credentials::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"[REDACTED]")
                .finish(),
            Credentials::Bearer { .. } => f
                .debug_struct("Bearer")
                .field("token", &"[REDACTED]")
                .finish(),
        }
    }
}

/// Trait for authentication managers.
pub trait AuthManager: Send + Sync {
    /// Returns the authentication headers.
    fn get_headers(&self) -> HashMap<String, String>;
}

/// Auth manager backed by static credentials.
pub struct CredentialsAuthManager {
    credentials: Credentials,
    custom_headers: Vec<(String, String)>,
}

impl CredentialsAuthManager {
    /// Creates a new auth manager.
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            custom_headers: Vec::new(),
        }
    }

    /// Adds headers sent with every request.
    pub fn with_custom_headers(mut self, headers: Vec<(String, String)>) -> Self {
        self.custom_headers = headers;
        self
    }
}

impl AuthManager for CredentialsAuthManager {
    fn get_headers(&self) -> HashMap<String, String> {
        let mut headers = HashMap::new();

        headers.insert(
            "Authorization".to_string(),
            self.credentials.authorization_header(),
        );
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        headers.insert("Accept".to_string(), "application/json".to_string());

        for (key, value) in &self.custom_headers {
            headers.insert(key.clone(), value.clone());
        }

        headers
    }
}

impl std::fmt::Debug for CredentialsAuthManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialsAuthManager")
            .field("credentials", &self.credentials)
            .field("custom_headers", &self.custom_headers.len())
            .finish()
    }
}
