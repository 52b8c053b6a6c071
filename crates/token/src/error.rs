//! Token issuance and verification error types.

use thiserror::Error;
use utu_keys::KeyError;

/// Result type alias for token operations.
pub type TokenResult<T> = Result<T, TokenError>;

/// Errors produced while issuing, signing or verifying tokens.
///
/// # Non-exhaustive
///
/// New variants may be added in minor releases. Downstream match expressions
/// must include a wildcard arm.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TokenError {
    /// A key lifecycle operation failed. [`KeyError::NoCurrentKey`] here means
    /// signing was refused because no key has been published yet.
    #[error(transparent)]
    Key(#[from] KeyError),

    /// Issuer configuration is invalid.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Claims or headers could not be encoded.
    #[error("Encoding error: {0}")]
    Encoding(#[source] serde_json::Error),

    /// The token is not a well-formed compact JWS.
    #[error("Invalid token format: {0}")]
    InvalidTokenFormat(String),

    /// The token header has no `kid`.
    #[error("Token header has no key identifier")]
    MissingKeyId,

    /// No live key has the token's `kid`.
    #[error("Signing key not found: {kid}")]
    UnknownKey {
        /// Key identifier from the token header.
        kid: String,
    },

    /// The header's `alg` does not match the key it names.
    #[error("Algorithm mismatch for key {kid}: token says {found}, key signs {expected}")]
    AlgorithmMismatch {
        /// Key identifier from the token header.
        kid: String,
        /// Algorithm of the stored key.
        expected: String,
        /// Algorithm from the token header.
        found: String,
    },

    /// Signature verification failed.
    #[error("Invalid signature")]
    InvalidSignature,

    /// The token's `exp` has passed.
    #[error("Token expired")]
    TokenExpired,
}

impl From<serde_json::Error> for TokenError {
    fn from(err: serde_json::Error) -> Self {
        Self::Encoding(err)
    }
}
