//! Access token claims.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Claim names set by the issuer itself. Configured extra claims may not use
/// them.
pub const REGISTERED_CLAIMS: [&str; 6] = ["jti", "iss", "sub", "aud", "iat", "exp"];

/// Claims carried by an issued access token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Unique token identifier.
    pub jti: String,

    /// Issuer.
    pub iss: String,

    /// Subject.
    pub sub: String,

    /// Intended audiences.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aud: Vec<String>,

    /// Issued-at time, seconds since the Unix epoch.
    pub iat: i64,

    /// Expiration time, seconds since the Unix epoch.
    pub exp: i64,

    /// Additional configured claims.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Claims {
    /// Returns the expiration time.
    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }

    /// Returns the issued-at time.
    #[must_use]
    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.iat, 0)
    }

    /// Returns `true` if the token has expired at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now.timestamp() >= self.exp
    }
}
