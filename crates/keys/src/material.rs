//! Asymmetric key provider: private and public key material.
//!
//! [`PrivateMaterial`] is generated once per key record and never leaves the
//! process. [`PublicMaterial`] is derived from it at creation time and is what
//! verifiers (in-process or via the published JWK) check signatures against.
//!
//! Signatures use the JWS encodings: ECDSA signatures are the fixed-width
//! `r || s` concatenation, RSA signatures are RSASSA-PKCS1-v1_5 over SHA-256.

use std::fmt;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand_core::CryptoRngCore;
use rsa::{RsaPrivateKey, RsaPublicKey, traits::PublicKeyParts};
use sha2::Sha256;
use signature::{SignatureEncoding, Signer, Verifier};

use crate::{
    algorithm::{Algorithm, Curve, KeyParams},
    error::{KeyError, KeyResult},
    jwk::Jwk,
};

/// Private signing material for one key record.
///
/// The underlying key types scrub their secrets on drop. `Debug` output
/// never includes key bytes.
pub enum PrivateMaterial {
    /// ECDSA P-256 signing key.
    P256(p256::ecdsa::SigningKey),
    /// ECDSA P-384 signing key.
    P384(p384::ecdsa::SigningKey),
    /// ECDSA P-521 signing key.
    P521(p521::ecdsa::SigningKey),
    /// RSA private key.
    Rsa(Box<RsaPrivateKey>),
}

impl PrivateMaterial {
    /// Generates fresh private material for the given parameters.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::Generation`] if the primitive cannot produce a key.
    pub fn generate(params: KeyParams, mut rng: &mut dyn CryptoRngCore) -> KeyResult<Self> {
        match params {
            KeyParams::Ec(Curve::P256) => Ok(Self::P256(p256::ecdsa::SigningKey::random(&mut rng))),
            KeyParams::Ec(Curve::P384) => Ok(Self::P384(p384::ecdsa::SigningKey::random(&mut rng))),
            KeyParams::Ec(Curve::P521) => Ok(Self::P521(p521::ecdsa::SigningKey::random(&mut rng))),
            KeyParams::Rsa { bits } => RsaPrivateKey::new(&mut rng, bits)
                .map(|key| Self::Rsa(Box::new(key)))
                .map_err(|e| {
                    KeyError::generation_with_source(format!("unable to generate {bits}-bit RSA key"), e)
                }),
        }
    }

    /// Returns the algorithm this material signs with.
    #[must_use]
    pub fn algorithm(&self) -> Algorithm {
        match self {
            Self::P256(_) => Algorithm::ES256,
            Self::P384(_) => Algorithm::ES384,
            Self::P521(_) => Algorithm::ES512,
            Self::Rsa(_) => Algorithm::RS256,
        }
    }

    /// Derives the public half.
    #[must_use]
    pub fn public(&self) -> PublicMaterial {
        match self {
            Self::P256(key) => PublicMaterial::P256(p256::ecdsa::VerifyingKey::from(key)),
            Self::P384(key) => PublicMaterial::P384(p384::ecdsa::VerifyingKey::from(key)),
            Self::P521(key) => PublicMaterial::P521(p521::ecdsa::VerifyingKey::from(key)),
            Self::Rsa(key) => PublicMaterial::Rsa(key.to_public_key()),
        }
    }

    /// Signs `message`, returning the JWS signature bytes.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::Generation`] if the primitive refuses to sign.
    pub fn sign(&self, message: &[u8]) -> KeyResult<Vec<u8>> {
        let signed = match self {
            Self::P256(key) => Signer::<p256::ecdsa::Signature>::try_sign(key, message)
                .map(|sig| sig.to_bytes().to_vec()),
            Self::P384(key) => Signer::<p384::ecdsa::Signature>::try_sign(key, message)
                .map(|sig| sig.to_bytes().to_vec()),
            Self::P521(key) => Signer::<p521::ecdsa::Signature>::try_sign(key, message)
                .map(|sig| sig.to_bytes().to_vec()),
            Self::Rsa(key) => {
                let signer = rsa::pkcs1v15::SigningKey::<Sha256>::new(key.as_ref().clone());
                signer.try_sign(message).map(|sig| sig.to_vec())
            },
        };
        signed.map_err(|e| KeyError::generation_with_source("unable to sign message", e))
    }
}

impl fmt::Debug for PrivateMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateMaterial")
            .field("algorithm", &self.algorithm())
            .field("key", &"<redacted>")
            .finish()
    }
}

/// Public verification material for one key record.
#[derive(Clone)]
pub enum PublicMaterial {
    /// ECDSA P-256 verifying key.
    P256(p256::ecdsa::VerifyingKey),
    /// ECDSA P-384 verifying key.
    P384(p384::ecdsa::VerifyingKey),
    /// ECDSA P-521 verifying key.
    P521(p521::ecdsa::VerifyingKey),
    /// RSA public key.
    Rsa(RsaPublicKey),
}

impl PublicMaterial {
    /// Returns the algorithm this material verifies.
    #[must_use]
    pub fn algorithm(&self) -> Algorithm {
        match self {
            Self::P256(_) => Algorithm::ES256,
            Self::P384(_) => Algorithm::ES384,
            Self::P521(_) => Algorithm::ES512,
            Self::Rsa(_) => Algorithm::RS256,
        }
    }

    /// Returns `true` if `signature` is a valid JWS signature over `message`.
    ///
    /// Malformed signatures are reported as invalid rather than as errors.
    #[must_use]
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> bool {
        match self {
            Self::P256(key) => p256::ecdsa::Signature::from_slice(signature)
                .is_ok_and(|sig| key.verify(message, &sig).is_ok()),
            Self::P384(key) => p384::ecdsa::Signature::from_slice(signature)
                .is_ok_and(|sig| key.verify(message, &sig).is_ok()),
            Self::P521(key) => p521::ecdsa::Signature::from_slice(signature)
                .is_ok_and(|sig| key.verify(message, &sig).is_ok()),
            Self::Rsa(key) => rsa::pkcs1v15::Signature::try_from(signature).is_ok_and(|sig| {
                rsa::pkcs1v15::VerifyingKey::<Sha256>::new(key.clone()).verify(message, &sig).is_ok()
            }),
        }
    }

    /// Renders the public key as a JWK with the given identifier.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::Serialization`] if an EC point has no affine
    /// coordinates, which cannot happen for generated keys.
    pub fn to_jwk(&self, kid: &str) -> KeyResult<Jwk> {
        match self {
            Self::P256(key) => {
                let point = key.to_encoded_point(false);
                ec_jwk(kid, Curve::P256, point.x().map(|x| &x[..]), point.y().map(|y| &y[..]))
            },
            Self::P384(key) => {
                let point = key.to_encoded_point(false);
                ec_jwk(kid, Curve::P384, point.x().map(|x| &x[..]), point.y().map(|y| &y[..]))
            },
            Self::P521(key) => {
                let point = key.to_encoded_point(false);
                ec_jwk(kid, Curve::P521, point.x().map(|x| &x[..]), point.y().map(|y| &y[..]))
            },
            Self::Rsa(key) => Ok(Jwk::rsa(
                kid,
                URL_SAFE_NO_PAD.encode(key.n().to_bytes_be()),
                URL_SAFE_NO_PAD.encode(key.e().to_bytes_be()),
            )),
        }
    }
}

fn ec_jwk(kid: &str, curve: Curve, x: Option<&[u8]>, y: Option<&[u8]>) -> KeyResult<Jwk> {
    let (Some(x), Some(y)) = (x, y) else {
        return Err(KeyError::Serialization {
            message: format!("{curve} public key is the identity point"),
            source: None,
        });
    };
    Ok(Jwk::ec(kid, curve, pad_coordinate(x, curve), pad_coordinate(y, curve)))
}

/// Encodes a coordinate left-padded with zeros to the curve's field size.
fn pad_coordinate(raw: &[u8], curve: Curve) -> String {
    let width = curve.coordinate_len();
    if raw.len() >= width {
        return URL_SAFE_NO_PAD.encode(raw);
    }
    let mut padded = vec![0u8; width - raw.len()];
    padded.extend_from_slice(raw);
    URL_SAFE_NO_PAD.encode(padded)
}

impl fmt::Debug for PublicMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublicMaterial").field("algorithm", &self.algorithm()).finish_non_exhaustive()
    }
}
