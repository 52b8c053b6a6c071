//! Key material generation.
//!
//! The [`KeyGenerator`] trait is the seam between the lifecycle machinery
//! (store and rotator) and the key provider. [`KeyPairGenerator`] is the
//! production implementation driven by [`KeyConfig`]; tests substitute
//! failing or counting generators.

use std::sync::Arc;

use chrono::{TimeDelta, Utc};

use crate::{
    algorithm::{Algorithm, KeyParams},
    config::KeyConfig,
    error::{KeyError, KeyResult},
    material::PrivateMaterial,
    random::RandomSource,
    record::KeyRecord,
};

/// Produces fresh key records.
///
/// Generation may be CPU-bound (RSA in particular); callers on an async
/// runtime should run it on the blocking pool. Implementations must not
/// retry internally.
pub trait KeyGenerator: Send + Sync {
    /// Generates one new key record.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::Generation`] if key material cannot be produced.
    fn generate(&self) -> KeyResult<KeyRecord>;
}

impl<G: KeyGenerator + ?Sized> KeyGenerator for Arc<G> {
    fn generate(&self) -> KeyResult<KeyRecord> {
        (**self).generate()
    }
}

/// Generates EC or RSA key pairs as selected by a [`KeyConfig`].
#[derive(Debug, Clone)]
pub struct KeyPairGenerator {
    params: KeyParams,
    algorithm: Algorithm,
    lifetime: TimeDelta,
    random: RandomSource,
}

impl KeyPairGenerator {
    /// Creates a generator from validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::Configuration`] if the key parameters are not
    /// supported or the key lifetime is out of range.
    pub fn new(config: &KeyConfig) -> KeyResult<Self> {
        config.validate()?;
        let (params, algorithm) = config.key_params()?;
        let lifetime = TimeDelta::from_std(config.key_lifetime()).map_err(|_| {
            KeyError::configuration(format!(
                "key lifetime {:?} is out of range",
                config.key_lifetime()
            ))
        })?;

        Ok(Self { params, algorithm, lifetime, random: config.random().clone() })
    }

    /// Returns the algorithm of generated keys.
    #[must_use]
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Returns the provider parameters.
    #[must_use]
    pub fn params(&self) -> KeyParams {
        self.params
    }
}

impl KeyGenerator for KeyPairGenerator {
    fn generate(&self) -> KeyResult<KeyRecord> {
        // The identifier is drawn first so a broken random source fails here
        // instead of inside the provider.
        let kid = self.random.generate_kid()?;
        let private = self.random.with_rng(|rng| PrivateMaterial::generate(self.params, rng))?;

        let created = Utc::now();
        let expires = created
            .checked_add_signed(self.lifetime)
            .ok_or_else(|| KeyError::generation("key expiry overflows the calendar"))?;

        let record = KeyRecord::new(kid, private, created, expires)?;
        tracing::debug!(kid = %record.kid(), algorithm = %self.algorithm, "generated key");
        Ok(record)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use std::time::Duration;

    use rstest::rstest;

    use super::*;
    use crate::{
        algorithm::{Curve, KeyType},
        testutil::FailingRng,
    };

    #[rstest]
    #[case(KeyType::Ec, Curve::P256, Algorithm::ES256)]
    #[case(KeyType::Ec, Curve::P384, Algorithm::ES384)]
    #[case(KeyType::Ec, Curve::P521, Algorithm::ES512)]
    fn test_generates_selected_algorithm(
        #[case] key_type: KeyType,
        #[case] curve: Curve,
        #[case] expected: Algorithm,
    ) {
        let config = KeyConfig::builder().key_type(key_type).key_curve(curve).build().unwrap();
        let generator = KeyPairGenerator::new(&config).unwrap();

        let record = generator.generate().unwrap();
        assert_eq!(record.algorithm(), expected);
        assert_eq!(record.kid().len(), 22);
    }

    #[test]
    fn test_rsa_generation() {
        let config = KeyConfig::builder().key_type(KeyType::Rsa).key_size(1024).build().unwrap();
        let record = KeyPairGenerator::new(&config).unwrap().generate().unwrap();
        assert_eq!(record.algorithm(), Algorithm::RS256);
        assert!(record.public_jwk().n.is_some());
    }

    #[test]
    fn test_expiry_covers_rotation_and_grace() {
        let config = KeyConfig::builder()
            .rotation_interval(Duration::from_secs(600))
            .token_ttl(Duration::from_secs(300))
            .safety_margin(Duration::from_secs(60))
            .build()
            .unwrap();
        let record = KeyPairGenerator::new(&config).unwrap().generate().unwrap();

        assert_eq!((record.expires() - record.created()).num_seconds(), 960);
    }

    #[test]
    fn test_distinct_kids() {
        let generator = KeyPairGenerator::new(&KeyConfig::default()).unwrap();
        let a = generator.generate().unwrap();
        let b = generator.generate().unwrap();
        assert_ne!(a.kid(), b.kid());
    }

    #[test]
    fn test_random_failure_is_generation_error() {
        let config =
            KeyConfig::builder().random(RandomSource::new(FailingRng)).build().unwrap();
        let generator = KeyPairGenerator::new(&config).unwrap();

        let err = generator.generate().unwrap_err();
        assert!(matches!(err, KeyError::Generation { .. }), "unexpected error: {err}");
    }

    #[test]
    fn test_rejects_unvalidated_config() {
        let config: KeyConfig = serde_json::from_str(r#"{"key_type": "RSA", "key_size": 0}"#).unwrap();
        let err = KeyPairGenerator::new(&config).unwrap_err();
        assert!(matches!(err, KeyError::Configuration { .. }));
    }

    #[test]
    fn test_generator_through_arc() {
        let generator: Arc<dyn KeyGenerator> =
            Arc::new(KeyPairGenerator::new(&KeyConfig::default()).unwrap());
        assert!(generator.generate().is_ok());
    }
}
