//! Configuration for key generation and rotation.
//!
//! [`KeyConfig`] carries everything the lifecycle needs at startup: which
//! kind of key to generate, how often to rotate, and how long issued tokens
//! live (which determines how long a superseded key must stay verifiable).
//!
//! Configurations are either built in code with the validating builder or
//! deserialized and then checked with [`KeyConfig::validate`]:
//!
//! ```
//! use std::time::Duration;
//! use utu_keys::{Algorithm, Curve, KeyConfig, KeyType};
//!
//! let config = KeyConfig::builder()
//!     .key_type(KeyType::Ec)
//!     .key_curve(Curve::P384)
//!     .rotation_interval(Duration::from_secs(3600))
//!     .token_ttl(Duration::from_secs(600))
//!     .build()?;
//!
//! assert_eq!(config.algorithm(), Algorithm::ES384);
//! assert_eq!(config.grace_period(), Duration::from_secs(660));
//! # Ok::<(), utu_keys::KeyError>(())
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{
    algorithm::{Algorithm, Curve, KeyParams, KeyType},
    error::{KeyError, KeyResult},
    random::RandomSource,
};

/// Default RSA modulus length in bits.
pub const DEFAULT_KEY_SIZE: usize = 2048;

/// Default interval between rotations (1 hour).
pub const DEFAULT_ROTATION_INTERVAL: Duration = Duration::from_secs(3_600);

/// Default lifetime of issued tokens (24 hours).
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(86_400);

/// Default extra time a superseded key stays verifiable past the token
/// lifetime (1 minute), absorbing clock skew between issuer and verifiers.
pub const DEFAULT_SAFETY_MARGIN: Duration = Duration::from_secs(60);

/// Key lifecycle configuration.
///
/// # Derived values
///
/// - [`algorithm`](Self::algorithm): total function of type, curve and size
/// - [`grace_period`](Self::grace_period): `token_ttl + safety_margin`
/// - [`key_lifetime`](Self::key_lifetime): `rotation_interval + grace_period`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KeyConfig {
    /// Key family (`EC` or `RSA`).
    #[serde(default)]
    pub(crate) key_type: KeyType,

    /// Curve for EC keys. Ignored for RSA.
    #[serde(default)]
    pub(crate) key_curve: Curve,

    /// Modulus length for RSA keys. Ignored for EC.
    #[serde(default = "default_key_size")]
    pub(crate) key_size: usize,

    /// How often the signing key is replaced.
    #[serde(with = "humantime_serde", default = "default_rotation_interval")]
    pub(crate) rotation_interval: Duration,

    /// Lifetime of tokens signed with a key.
    #[serde(with = "humantime_serde", default = "default_token_ttl")]
    pub(crate) token_ttl: Duration,

    /// Extra retention past `token_ttl` before a superseded key is retired.
    #[serde(with = "humantime_serde", default = "default_safety_margin")]
    pub(crate) safety_margin: Duration,

    /// Randomness used for identifiers and key material.
    #[serde(skip)]
    pub(crate) random: RandomSource,
}

fn default_key_size() -> usize {
    DEFAULT_KEY_SIZE
}

fn default_rotation_interval() -> Duration {
    DEFAULT_ROTATION_INTERVAL
}

fn default_token_ttl() -> Duration {
    DEFAULT_TOKEN_TTL
}

fn default_safety_margin() -> Duration {
    DEFAULT_SAFETY_MARGIN
}

#[bon::bon]
impl KeyConfig {
    /// Creates a new configuration, validating every field.
    ///
    /// # Optional Fields
    ///
    /// * `key_type` - default `EC`
    /// * `key_curve` - default `P-256`
    /// * `key_size` - default 2048 bits
    /// * `rotation_interval` - default 1 hour
    /// * `token_ttl` - default 24 hours
    /// * `safety_margin` - default 1 minute
    /// * `random` - default operating system generator
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::Configuration`] if the key parameters are not
    /// supported or a duration is zero.
    #[builder]
    pub fn new(
        #[builder(default)] key_type: KeyType,
        #[builder(default)] key_curve: Curve,
        #[builder(default = DEFAULT_KEY_SIZE)] key_size: usize,
        #[builder(default = DEFAULT_ROTATION_INTERVAL)] rotation_interval: Duration,
        #[builder(default = DEFAULT_TOKEN_TTL)] token_ttl: Duration,
        #[builder(default = DEFAULT_SAFETY_MARGIN)] safety_margin: Duration,
        #[builder(default)] random: RandomSource,
    ) -> KeyResult<Self> {
        let config = Self {
            key_type,
            key_curve,
            key_size,
            rotation_interval,
            token_ttl,
            safety_margin,
            random,
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks a configuration obtained by deserialization.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::Configuration`] if:
    /// - The key type, curve and size do not select a supported algorithm
    /// - `rotation_interval` is zero
    /// - `token_ttl` is zero
    pub fn validate(&self) -> KeyResult<()> {
        KeyParams::select(self.key_type, self.key_curve, self.key_size)?;

        if self.rotation_interval.is_zero() {
            return Err(KeyError::configuration("rotation_interval must be greater than zero"));
        }

        if self.token_ttl.is_zero() {
            return Err(KeyError::configuration("token_ttl must be greater than zero"));
        }

        Ok(())
    }

    /// Replaces the randomness source, typically after deserialization.
    #[must_use]
    pub fn with_random(mut self, random: RandomSource) -> Self {
        self.random = random;
        self
    }

    /// Returns the configured key family.
    #[must_use]
    pub fn key_type(&self) -> KeyType {
        self.key_type
    }

    /// Returns the configured EC curve.
    #[must_use]
    pub fn key_curve(&self) -> Curve {
        self.key_curve
    }

    /// Returns the configured RSA modulus length.
    #[must_use]
    pub fn key_size(&self) -> usize {
        self.key_size
    }

    /// Returns the rotation interval.
    #[must_use]
    pub fn rotation_interval(&self) -> Duration {
        self.rotation_interval
    }

    /// Returns the issued token lifetime.
    #[must_use]
    pub fn token_ttl(&self) -> Duration {
        self.token_ttl
    }

    /// Returns the safety margin.
    #[must_use]
    pub fn safety_margin(&self) -> Duration {
        self.safety_margin
    }

    /// Returns the randomness source.
    #[must_use]
    pub fn random(&self) -> &RandomSource {
        &self.random
    }

    /// How long a superseded key stays in the store before retirement.
    #[must_use]
    pub fn grace_period(&self) -> Duration {
        self.token_ttl.saturating_add(self.safety_margin)
    }

    /// Total verification lifetime of a key: time as the signing key plus the
    /// grace period. Used to stamp `expires` on generated records.
    #[must_use]
    pub fn key_lifetime(&self) -> Duration {
        self.rotation_interval.saturating_add(self.grace_period())
    }

    /// Returns the provider parameters and signing algorithm.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::Configuration`] for unsupported key parameters.
    /// Configurations built through [`KeyConfig::builder`] never fail here.
    pub fn key_params(&self) -> KeyResult<(KeyParams, Algorithm)> {
        KeyParams::select(self.key_type, self.key_curve, self.key_size)
    }

    /// Returns the signing algorithm selected by this configuration.
    ///
    /// Falls back to ES256 only for a configuration that skipped validation;
    /// key generation still rejects such a configuration.
    #[must_use]
    pub fn algorithm(&self) -> Algorithm {
        self.key_params().map(|(_, alg)| alg).unwrap_or(Algorithm::ES256)
    }
}

impl Default for KeyConfig {
    fn default() -> Self {
        Self {
            key_type: KeyType::default(),
            key_curve: Curve::default(),
            key_size: DEFAULT_KEY_SIZE,
            rotation_interval: DEFAULT_ROTATION_INTERVAL,
            token_ttl: DEFAULT_TOKEN_TTL,
            safety_margin: DEFAULT_SAFETY_MARGIN,
            random: RandomSource::default(),
        }
    }
}
