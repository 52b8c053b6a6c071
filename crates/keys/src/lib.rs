//! # utu keys
//!
//! Key lifecycle for a rotating-key token issuer.
//!
//! This crate provides:
//! - **Key generation**: EC (P-256, P-384, P-521) and RSA signing keys with
//!   random URL-safe identifiers
//! - **Key store**: concurrency-safe storage of every key that may still
//!   verify tokens, the current signing key, and a precomputed JWK Set
//! - **Current-key register**: lock-free holder for signing paths that only
//!   need the current key
//! - **Rotator**: scheduled rotation with delayed, cancellable retirement of
//!   superseded keys
//!
//! ## Example
//!
//! ```
//! use utu_keys::{KeyConfig, KeyPairGenerator, KeyStore};
//!
//! let generator = KeyPairGenerator::new(&KeyConfig::default())?;
//! let store = KeyStore::initialize(&generator)?;
//!
//! let jwks = store.snapshot_public();
//! assert!(jwks.starts_with(br#"{"keys":["#));
//! # Ok::<(), utu_keys::KeyError>(())
//! ```
//!
//! # Feature Flags
//!
//! - **`testutil`**: Enables the `testutil` module with failing random
//!   sources, failing and flaky generators, and async wait helpers.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod algorithm;
pub mod config;
pub mod error;
pub mod generator;
pub mod jwk;
pub mod material;
pub mod random;
pub mod record;
pub mod register;
pub mod rotator;
mod snapshot;
pub mod store;
#[cfg(any(test, feature = "testutil"))]
#[allow(clippy::expect_used)]
pub mod testutil;

pub use algorithm::{Algorithm, Curve, KeyParams, KeyType};
pub use config::KeyConfig;
pub use error::{KeyError, KeyResult};
pub use generator::{KeyGenerator, KeyPairGenerator};
pub use jwk::{JWK_CONTENT_TYPE, JWK_SET_CONTENT_TYPE, Jwk, JwkSet};
pub use material::{PrivateMaterial, PublicMaterial};
pub use random::RandomSource;
pub use record::KeyRecord;
pub use register::CurrentKey;
pub use rotator::KeyRotator;
pub use store::{KeyStore, Rotation};
