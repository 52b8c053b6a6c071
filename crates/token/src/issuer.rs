//! Access token claim issuance.
//!
//! An [`Issuer`] stamps out fresh claim sets from static configuration: a
//! random `jti`, the configured `iss`/`sub`/`aud` and extra claims, and an
//! `exp` one token lifetime after `iat`. Signing is a separate step handled by
//! [`Signer`](crate::Signer).

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utu_keys::RandomSource;

use crate::{
    claims::{Claims, REGISTERED_CLAIMS},
    error::{TokenError, TokenResult},
};

/// Default `iss` and `sub` value.
pub const DEFAULT_ISSUER: &str = "utu";

/// Default token lifetime (24 hours).
pub const DEFAULT_TOKEN_EXPIRES: Duration = Duration::from_secs(86_400);

/// Number of random bytes in a token identifier.
pub const JTI_ENTROPY_BYTES: usize = 32;

/// Issuer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IssuerConfig {
    /// `iss` claim.
    #[serde(default = "default_issuer")]
    pub(crate) issuer: String,

    /// `sub` claim.
    #[serde(default = "default_issuer")]
    pub(crate) subject: String,

    /// `aud` claim.
    #[serde(default)]
    pub(crate) audience: Vec<String>,

    /// Extra claims added to every token.
    #[serde(default)]
    pub(crate) claims: Map<String, Value>,

    /// Token lifetime.
    #[serde(with = "humantime_serde", default = "default_expires")]
    pub(crate) expires: Duration,
}

fn default_issuer() -> String {
    DEFAULT_ISSUER.to_owned()
}

fn default_expires() -> Duration {
    DEFAULT_TOKEN_EXPIRES
}

#[bon::bon]
impl IssuerConfig {
    /// Creates a new issuer configuration, validating every field.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Configuration`] if `expires` is zero or an extra
    /// claim reuses a registered claim name.
    #[builder]
    pub fn new(
        #[builder(into, default = DEFAULT_ISSUER.to_owned())] issuer: String,
        #[builder(into, default = DEFAULT_ISSUER.to_owned())] subject: String,
        #[builder(default)] audience: Vec<String>,
        #[builder(default)] claims: Map<String, Value>,
        #[builder(default = DEFAULT_TOKEN_EXPIRES)] expires: Duration,
    ) -> TokenResult<Self> {
        let config = Self { issuer, subject, audience, claims, expires };
        config.validate()?;
        Ok(config)
    }

    /// Checks a configuration obtained by deserialization.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Configuration`] if `expires` is zero or an extra
    /// claim reuses a registered claim name.
    pub fn validate(&self) -> TokenResult<()> {
        if self.expires.is_zero() {
            return Err(TokenError::Configuration("expires must be greater than zero".into()));
        }
        if let Some(name) = self.claims.keys().find(|k| REGISTERED_CLAIMS.contains(&k.as_str())) {
            return Err(TokenError::Configuration(format!(
                "extra claim {name:?} collides with a registered claim"
            )));
        }
        Ok(())
    }

    /// Returns the `iss` claim.
    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Returns the `sub` claim.
    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Returns the `aud` claim.
    #[must_use]
    pub fn audience(&self) -> &[String] {
        &self.audience
    }

    /// Returns the token lifetime.
    #[must_use]
    pub fn expires(&self) -> Duration {
        self.expires
    }
}

impl Default for IssuerConfig {
    fn default() -> Self {
        Self {
            issuer: default_issuer(),
            subject: default_issuer(),
            audience: Vec::new(),
            claims: Map::new(),
            expires: DEFAULT_TOKEN_EXPIRES,
        }
    }
}

/// Builds claim sets for new access tokens.
#[derive(Debug, Clone)]
pub struct Issuer {
    config: IssuerConfig,
    lifetime: TimeDelta,
    random: RandomSource,
}

impl Issuer {
    /// Creates an issuer using the operating system random source.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Configuration`] if the configuration is invalid.
    pub fn new(config: IssuerConfig) -> TokenResult<Self> {
        Self::with_random(config, RandomSource::default())
    }

    /// Creates an issuer drawing token identifiers from `random`.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Configuration`] if the configuration is invalid.
    pub fn with_random(config: IssuerConfig, random: RandomSource) -> TokenResult<Self> {
        config.validate()?;
        let lifetime = TimeDelta::from_std(config.expires).map_err(|_| {
            TokenError::Configuration(format!("expires {:?} is out of range", config.expires))
        })?;

        tracing::info!(
            iss = %config.issuer,
            sub = %config.subject,
            aud = ?config.audience,
            expires = ?config.expires,
            extra_claims = config.claims.len(),
            "issuer configured"
        );
        Ok(Self { config, lifetime, random })
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &IssuerConfig {
        &self.config
    }

    /// Issues claims stamped with the current time.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Key`] if the random source fails.
    pub fn issue(&self) -> TokenResult<Claims> {
        self.issue_at(Utc::now())
    }

    /// Issues claims stamped with `now`.
    ///
    /// # Errors
    ///
    /// - [`TokenError::Key`] if the random source fails
    /// - [`TokenError::Configuration`] if `exp` is past the representable range
    pub fn issue_at(&self, now: DateTime<Utc>) -> TokenResult<Claims> {
        let exp = now.checked_add_signed(self.lifetime).ok_or_else(|| {
            TokenError::Configuration(format!(
                "expires {:?} overflows the token expiry",
                self.config.expires
            ))
        })?;
        let jti = self.random.generate_id(JTI_ENTROPY_BYTES)?;

        Ok(Claims {
            jti,
            iss: self.config.issuer.clone(),
            sub: self.config.subject.clone(),
            aud: self.config.audience.clone(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
            extra: self.config.claims.clone(),
        })
    }
}
