//! Premium feature gating.
//!
//! An [`Entitlement`] is a premium flag plus an expiry. [`FeatureGate`]
//! re-checks it against the current time on every call; the decision is
//! never cached.

use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use std::future::Future;
use tracing::warn;

use crate::errors::{AirbyteError, AirbyteResult};

/// Claims carried by a signed license token.
#[derive(Debug, Deserialize)]
struct LicenseClaims {
    is_premium: bool,
    exp: i64,
}

/// What the holder of a license may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Entitlement {
    premium: bool,
    expires_at: DateTime<Utc>,
}

impl Entitlement {
    /// Creates an entitlement.
    pub fn new(premium: bool, expires_at: DateTime<Utc>) -> Self {
        Self {
            premium,
            expires_at,
        }
    }

    /// Entitlement of a client without a license: never premium.
    pub fn community() -> Self {
        Self::new(false, DateTime::<Utc>::MIN_UTC)
    }

    /// Verifies an HS256-signed license token and reads its claims.
    ///
    /// The token must carry `is_premium` and `exp`. Expiry is not enforced
    /// here; [`FeatureGate`] compares it with the clock on every call.
    pub fn from_license_token(token: &str, secret: &str) -> AirbyteResult<Self> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;

        let data = decode::<LicenseClaims>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &validation,
        )
        .map_err(|e| AirbyteError::Entitlement {
            message: format!("Invalid license: {}", e),
        })?;

        let expires_at = Utc
            .timestamp_opt(data.claims.exp, 0)
            .single()
            .ok_or_else(|| AirbyteError::Entitlement {
                message: format!("Invalid license expiry: {}", data.claims.exp),
            })?;

        Ok(Self::new(data.claims.is_premium, expires_at))
    }

    /// Returns true if the license grants premium features.
    pub fn is_premium(&self) -> bool {
        self.premium
    }

    /// Returns when the license expires.
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }
}

/// Guards premium-only operations.
#[derive(Debug, Clone)]
pub struct FeatureGate {
    entitlement: Entitlement,
}

impl FeatureGate {
    /// Creates a gate for an entitlement.
    pub fn new(entitlement: Entitlement) -> Self {
        Self { entitlement }
    }

    /// Returns the entitlement being enforced.
    pub fn entitlement(&self) -> &Entitlement {
        &self.entitlement
    }

    /// Fails unless the entitlement is premium and unexpired right now.
    pub fn require_entitlement(&self) -> AirbyteResult<()> {
        self.require_entitlement_at(Utc::now())
    }

    /// Fails unless the entitlement is premium and unexpired at `now`.
    pub fn require_entitlement_at(&self, now: DateTime<Utc>) -> AirbyteResult<()> {
        if !self.entitlement.premium {
            return Err(AirbyteError::Entitlement {
                message: "A premium license is required".to_string(),
            });
        }
        if now >= self.entitlement.expires_at {
            return Err(AirbyteError::Entitlement {
                message: format!("License expired at {}", self.entitlement.expires_at),
            });
        }
        Ok(())
    }

    /// Checks the entitlement, then runs `f`.
    pub async fn guard<F, Fut, T>(&self, feature: &str, f: F) -> AirbyteResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = AirbyteResult<T>>,
    {
        if let Err(error) = self.require_entitlement() {
            warn!(feature, error = %error, "Premium feature rejected");
            return Err(error);
        }
        f().await
    }
}

impl Default for FeatureGate {
    fn default() -> Self {
        Self::new(Entitlement::community())
    }
}
