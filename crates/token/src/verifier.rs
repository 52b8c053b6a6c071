//! Verifying issued tokens against the live key set.

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, TimeDelta, Utc};
use utu_keys::{Algorithm, KeyStore};

use crate::{
    claims::Claims,
    error::{TokenError, TokenResult},
    jose::CompactParts,
};

/// Default allowance for clock skew when checking `exp`.
pub const DEFAULT_LEEWAY: Duration = Duration::from_secs(0);

/// Verifies tokens signed by any key still in a [`KeyStore`].
///
/// A token stays verifiable for as long as its signing key is in the store,
/// which the rotator guarantees for at least the token lifetime after the key
/// stops signing.
#[derive(Debug)]
pub struct Verifier {
    store: Arc<KeyStore>,
    leeway: TimeDelta,
}

#[bon::bon]
impl Verifier {
    /// Creates a verifier.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Configuration`] if `leeway` is out of range.
    #[builder]
    pub fn new(
        store: Arc<KeyStore>,
        #[builder(default = DEFAULT_LEEWAY)] leeway: Duration,
    ) -> TokenResult<Self> {
        let leeway = TimeDelta::from_std(leeway)
            .map_err(|_| TokenError::Configuration(format!("leeway {leeway:?} is out of range")))?;
        Ok(Self { store, leeway })
    }
}

impl Verifier {
    /// Verifies `token` at the current time and returns its claims.
    ///
    /// # Errors
    ///
    /// See [`verify_at`](Self::verify_at).
    pub fn verify(&self, token: &str) -> TokenResult<Claims> {
        self.verify_at(token, Utc::now())
    }

    /// Verifies `token` as of `now` and returns its claims.
    ///
    /// # Errors
    ///
    /// - [`TokenError::InvalidTokenFormat`] if the token or its claims are malformed
    /// - [`TokenError::MissingKeyId`] if the header has no `kid`
    /// - [`TokenError::UnknownKey`] if the key was never issued or has been retired
    /// - [`TokenError::AlgorithmMismatch`] if `alg` differs from the key's algorithm
    /// - [`TokenError::InvalidSignature`] if the signature does not verify
    /// - [`TokenError::TokenExpired`] if `exp` has passed
    #[tracing::instrument(skip(self, token))]
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> TokenResult<Claims> {
        let parts = CompactParts::parse(token)?;
        let kid = parts.header.kid.as_deref().ok_or(TokenError::MissingKeyId)?;

        let key = self.store.get(kid).ok_or_else(|| {
            tracing::debug!(kid, "token names an unknown key");
            TokenError::UnknownKey { kid: kid.to_owned() }
        })?;

        if Algorithm::from_name(&parts.header.alg) != Some(key.algorithm()) {
            return Err(TokenError::AlgorithmMismatch {
                kid: kid.to_owned(),
                expected: key.algorithm().to_string(),
                found: parts.header.alg.clone(),
            });
        }

        if !key.verify(parts.signing_input.as_bytes(), &parts.signature) {
            return Err(TokenError::InvalidSignature);
        }

        let claims: Claims = serde_json::from_slice(&parts.payload)
            .map_err(|e| TokenError::InvalidTokenFormat(format!("claims: {e}")))?;
        // A leeway reaching past the earliest representable time accepts any `exp`.
        if let Some(cutoff) = now.checked_sub_signed(self.leeway)
            && claims.is_expired_at(cutoff)
        {
            return Err(TokenError::TokenExpired);
        }

        Ok(claims)
    }
}
