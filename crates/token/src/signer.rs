//! Signing tokens with whatever key is current.

use std::sync::Arc;

use serde::Serialize;
use utu_keys::{CurrentKey, KeyRecord, KeyResult, KeyStore};

use crate::{
    error::TokenResult,
    jose::{CompactJws, JoseEncoder},
};

/// Anything that can report the current signing key.
///
/// Implemented by [`KeyStore`] (full deployments that also serve the key set)
/// and by [`CurrentKey`] (signing paths fed by the rotator's register).
pub trait CurrentKeySource: Send + Sync {
    /// Returns the current signing key.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::NoCurrentKey`](utu_keys::KeyError::NoCurrentKey) if
    /// no key has been published.
    fn current_key(&self) -> KeyResult<Arc<KeyRecord>>;
}

impl CurrentKeySource for KeyStore {
    fn current_key(&self) -> KeyResult<Arc<KeyRecord>> {
        Ok(self.current())
    }
}

impl CurrentKeySource for CurrentKey {
    fn current_key(&self) -> KeyResult<Arc<KeyRecord>> {
        self.load()
    }
}

impl<S: CurrentKeySource + ?Sized> CurrentKeySource for Arc<S> {
    fn current_key(&self) -> KeyResult<Arc<KeyRecord>> {
        (**self).current_key()
    }
}

/// Signs claims with the current key.
pub struct Signer {
    source: Arc<dyn CurrentKeySource>,
    encoder: Arc<dyn JoseEncoder>,
}

#[bon::bon]
impl Signer {
    /// Creates a signer.
    ///
    /// # Arguments
    ///
    /// * `source` - Where the current key comes from
    /// * `encoder` - Token encoding; defaults to [`CompactJws`]
    #[builder]
    pub fn new(
        source: Arc<dyn CurrentKeySource>,
        #[builder(default = Arc::new(CompactJws) as Arc<dyn JoseEncoder>)]
        encoder: Arc<dyn JoseEncoder>,
    ) -> Self {
        Self { source, encoder }
    }
}

impl Signer {
    /// Serializes `claims` as JSON and signs them.
    ///
    /// # Errors
    ///
    /// - [`TokenError::Key`](crate::TokenError::Key) wrapping
    ///   [`KeyError::NoCurrentKey`](utu_keys::KeyError::NoCurrentKey) if there
    ///   is no key to sign with
    /// - [`TokenError::Encoding`](crate::TokenError::Encoding) if the claims
    ///   cannot be serialized
    pub fn sign<C: Serialize>(&self, claims: &C) -> TokenResult<String> {
        let payload = serde_json::to_vec(claims)?;
        self.sign_payload(&payload)
    }

    /// Signs a raw payload.
    ///
    /// # Errors
    ///
    /// Same as [`sign`](Self::sign), minus serialization.
    pub fn sign_payload(&self, payload: &[u8]) -> TokenResult<String> {
        let key = self.source.current_key().inspect_err(|err| {
            tracing::warn!(error = %err, "refusing to sign without a current key");
        })?;
        let token = self.encoder.encode(&key, payload)?;
        tracing::debug!(kid = %key.kid(), algorithm = %key.algorithm(), "signed token");
        Ok(token)
    }
}

impl std::fmt::Debug for Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signer").finish_non_exhaustive()
    }
}
