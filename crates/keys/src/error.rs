//! Key lifecycle error types and result alias.
//!
//! Every fallible operation in this crate returns [`KeyResult<T>`]. The
//! variants map one-to-one onto the ways the lifecycle can refuse or fail:
//!
//! - [`KeyError::Configuration`] - invalid key parameters, fatal at startup
//! - [`KeyError::Generation`] - the key provider could not produce material
//! - [`KeyError::NotFound`] - no key with the requested `kid`
//! - [`KeyError::CannotDeleteCurrent`] - guard against retiring the signing key
//! - [`KeyError::AlreadyStarted`] / [`KeyError::AlreadyStopped`] - rotator state signals
//! - [`KeyError::NoCurrentKey`] - the current-key register was never populated
//!
//! # Example
//!
//! ```
//! use utu_keys::{KeyError, KeyResult};
//!
//! fn lookup(kid: &str) -> KeyResult<()> {
//!     Err(KeyError::not_found(kid))
//! }
//!
//! assert!(matches!(lookup("abc"), Err(KeyError::NotFound { .. })));
//! ```

use std::sync::Arc;

use thiserror::Error;

/// A shareable boxed error used to keep source chains on cloneable errors.
pub type BoxError = Arc<dyn std::error::Error + Send + Sync>;

/// Result type alias for key lifecycle operations.
pub type KeyResult<T> = Result<T, KeyError>;

/// Errors produced by the key lifecycle subsystem.
///
/// # Non-exhaustive
///
/// New variants may be added in minor releases. Downstream match expressions
/// must include a wildcard arm.
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum KeyError {
    /// The configured key parameters do not map to a supported algorithm, or
    /// another configuration value is out of range.
    ///
    /// The process must not start with this error.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the invalid configuration.
        message: String,
    },

    /// The key provider or the randomness source failed to produce key
    /// material.
    ///
    /// Fatal to one generation attempt only.
    #[error("Key generation failed: {message}")]
    Generation {
        /// Description of the failure.
        message: String,
        /// The primitive-level error, if any.
        #[source]
        source: Option<BoxError>,
    },

    /// No key exists with the given identifier.
    #[error("Key not found: {kid}")]
    NotFound {
        /// The key identifier that was not found.
        kid: String,
    },

    /// The key is the current signing key and cannot be deleted.
    ///
    /// State is left unchanged.
    #[error("Cannot delete the current signing key: {kid}")]
    CannotDeleteCurrent {
        /// The current key identifier.
        kid: String,
    },

    /// The rotator is already running.
    #[error("Key rotator has already been started")]
    AlreadyStarted,

    /// The rotator is not running.
    #[error("Key rotator has already been stopped")]
    AlreadyStopped,

    /// No current key has been published to the register yet.
    #[error("The current key has not been initialized")]
    NoCurrentKey,

    /// Public key material could not be encoded.
    #[error("Serialization error: {message}")]
    Serialization {
        /// Description of the serialization failure.
        message: String,
        /// The underlying error.
        #[source]
        source: Option<BoxError>,
    },
}

impl KeyError {
    /// Creates a new `Configuration` error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration { message: message.into() }
    }

    /// Creates a new `Generation` error without a source.
    #[must_use]
    pub fn generation(message: impl Into<String>) -> Self {
        Self::Generation { message: message.into(), source: None }
    }

    /// Creates a new `Generation` error wrapping the primitive-level error.
    #[must_use]
    pub fn generation_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Generation { message: message.into(), source: Some(Arc::new(source)) }
    }

    /// Creates a new `NotFound` error for the given key identifier.
    #[must_use]
    pub fn not_found(kid: impl Into<String>) -> Self {
        Self::NotFound { kid: kid.into() }
    }

    /// Creates a new `CannotDeleteCurrent` error for the given key identifier.
    #[must_use]
    pub fn cannot_delete_current(kid: impl Into<String>) -> Self {
        Self::CannotDeleteCurrent { kid: kid.into() }
    }

    /// Creates a new `Serialization` error wrapping the underlying error.
    #[must_use]
    pub fn serialization_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Serialization { message: message.into(), source: Some(Arc::new(source)) }
    }

    /// Returns `true` for the idempotency signals returned by the rotator.
    ///
    /// These are not failures; callers typically log and continue.
    #[must_use]
    pub fn is_state_signal(&self) -> bool {
        matches!(self, Self::AlreadyStarted | Self::AlreadyStopped)
    }
}

impl From<serde_json::Error> for KeyError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization_with_source("failed to encode public key", err)
    }
}
