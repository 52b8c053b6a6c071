//! Signing algorithms and the key parameters that select them.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{KeyError, KeyResult};

/// Family of asymmetric keys to generate (JWK `kty`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum KeyType {
    /// Elliptic curve keys.
    #[default]
    #[serde(rename = "EC")]
    Ec,
    /// RSA keys.
    #[serde(rename = "RSA")]
    Rsa,
}

impl KeyType {
    /// Returns the JWK `kty` value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ec => "EC",
            Self::Rsa => "RSA",
        }
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// NIST curve used for EC keys (JWK `crv`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Curve {
    /// NIST P-256.
    #[default]
    #[serde(rename = "P-256")]
    P256,
    /// NIST P-384.
    #[serde(rename = "P-384")]
    P384,
    /// NIST P-521.
    #[serde(rename = "P-521")]
    P521,
}

impl Curve {
    /// Returns the JWK `crv` value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::P256 => "P-256",
            Self::P384 => "P-384",
            Self::P521 => "P-521",
        }
    }

    /// Size in bytes of a field element, and so of each JWK coordinate.
    #[must_use]
    pub fn coordinate_len(&self) -> usize {
        match self {
            Self::P256 => 32,
            Self::P384 => 48,
            Self::P521 => 66,
        }
    }
}

impl fmt::Display for Curve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// JWS signing algorithm (JWA `alg`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Algorithm {
    /// ECDSA using P-256 and SHA-256.
    ES256,
    /// ECDSA using P-384 and SHA-384.
    ES384,
    /// ECDSA using P-521 and SHA-512.
    ES512,
    /// RSASSA-PKCS1-v1_5 using SHA-256.
    RS256,
}

impl Algorithm {
    /// Returns the JWA name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ES256 => "ES256",
            Self::ES384 => "ES384",
            Self::ES512 => "ES512",
            Self::RS256 => "RS256",
        }
    }

    /// Parses a JWA name, returning `None` for anything this crate cannot sign with.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "ES256" => Some(Self::ES256),
            "ES384" => Some(Self::ES384),
            "ES512" => Some(Self::ES512),
            "RS256" => Some(Self::RS256),
            _ => None,
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fully resolved parameters handed to the key provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyParams {
    /// An EC key on the given curve.
    Ec(Curve),
    /// An RSA key with the given modulus length in bits.
    Rsa {
        /// Modulus length in bits.
        bits: usize,
    },
}

impl KeyParams {
    /// Resolves configured key parameters into provider parameters and the
    /// algorithm they sign with.
    ///
    /// The mapping is total over the supported combinations:
    ///
    /// | key type | curve / size | algorithm |
    /// |----------|--------------|-----------|
    /// | EC       | P-256        | ES256     |
    /// | EC       | P-384        | ES384     |
    /// | EC       | P-521        | ES512     |
    /// | RSA      | bits > 0     | RS256     |
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::Configuration`] for any other combination, which
    /// currently means an RSA key with a zero bit length.
    pub fn select(key_type: KeyType, curve: Curve, bits: usize) -> KeyResult<(Self, Algorithm)> {
        match (key_type, curve) {
            (KeyType::Ec, Curve::P256) => Ok((Self::Ec(Curve::P256), Algorithm::ES256)),
            (KeyType::Ec, Curve::P384) => Ok((Self::Ec(Curve::P384), Algorithm::ES384)),
            (KeyType::Ec, Curve::P521) => Ok((Self::Ec(Curve::P521), Algorithm::ES512)),
            (KeyType::Rsa, _) if bits > 0 => Ok((Self::Rsa { bits }, Algorithm::RS256)),
            _ => Err(KeyError::configuration(format!(
                "unsupported key parameters: type={key_type}, size={bits}, curve={curve}"
            ))),
        }
    }
}
