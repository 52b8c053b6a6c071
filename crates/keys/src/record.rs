//! Immutable key records.

use std::fmt;

use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::{
    algorithm::Algorithm,
    error::{KeyError, KeyResult},
    jwk::Jwk,
    material::{PrivateMaterial, PublicMaterial},
};

/// One generated signing key with its cached public forms.
///
/// Records are created by a [`KeyGenerator`](crate::KeyGenerator) and never
/// mutated afterwards; the store shares them as `Arc<KeyRecord>`. The public
/// JWK and its JSON encoding are computed once here so reads never re-encode.
pub struct KeyRecord {
    kid: String,
    algorithm: Algorithm,
    private: PrivateMaterial,
    public: PublicMaterial,
    public_jwk: Jwk,
    public_json: Bytes,
    created: DateTime<Utc>,
    expires: DateTime<Utc>,
}

impl KeyRecord {
    /// Assembles a record, deriving and caching the public material.
    ///
    /// # Errors
    ///
    /// - [`KeyError::Generation`] if `kid` is empty or `expires` is not after
    ///   `created`
    /// - [`KeyError::Serialization`] if the public key cannot be encoded
    pub fn new(
        kid: String,
        private: PrivateMaterial,
        created: DateTime<Utc>,
        expires: DateTime<Utc>,
    ) -> KeyResult<Self> {
        if kid.is_empty() {
            return Err(KeyError::generation("key identifier must not be empty"));
        }
        if expires <= created {
            return Err(KeyError::generation(format!(
                "key {kid} would expire ({expires}) before it was created ({created})"
            )));
        }

        let public = private.public();
        let public_jwk = public.to_jwk(&kid)?;
        let public_json = Bytes::from(serde_json::to_vec(&public_jwk)?);

        Ok(Self {
            kid,
            algorithm: private.algorithm(),
            private,
            public,
            public_jwk,
            public_json,
            created,
            expires,
        })
    }

    /// Returns the key identifier.
    #[must_use]
    pub fn kid(&self) -> &str {
        &self.kid
    }

    /// Returns the signing algorithm.
    #[must_use]
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Returns the public verification material.
    #[must_use]
    pub fn public(&self) -> &PublicMaterial {
        &self.public
    }

    /// Returns the cached public JWK.
    #[must_use]
    pub fn public_jwk(&self) -> &Jwk {
        &self.public_jwk
    }

    /// Returns the pre-marshaled public JWK, suitable for serving as
    /// `application/jwk+json` without re-encoding.
    #[must_use]
    pub fn public_jwk_json(&self) -> Bytes {
        self.public_json.clone()
    }

    /// Returns when the record was generated.
    #[must_use]
    pub fn created(&self) -> DateTime<Utc> {
        self.created
    }

    /// Returns when tokens signed by this key can no longer be valid.
    #[must_use]
    pub fn expires(&self) -> DateTime<Utc> {
        self.expires
    }

    /// Returns `true` if the key is past its verification lifetime at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires
    }

    /// Signs `message` with the private material.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::Generation`] if the primitive refuses to sign.
    pub fn sign(&self, message: &[u8]) -> KeyResult<Vec<u8>> {
        self.private.sign(message)
    }

    /// Checks a signature against the public material.
    #[must_use]
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> bool {
        self.public.verify(message, signature)
    }
}

impl fmt::Debug for KeyRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyRecord")
            .field("kid", &self.kid)
            .field("algorithm", &self.algorithm)
            .field("created", &self.created)
            .field("expires", &self.expires)
            .finish_non_exhaustive()
    }
}
