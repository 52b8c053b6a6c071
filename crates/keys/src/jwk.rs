//! JSON Web Key documents for published public keys (RFC 7517).
//!
//! Members are declared in lexicographic order so the serialized form is
//! stable and matches what verifiers have historically cached byte-for-byte.

use serde::{Deserialize, Serialize};

use crate::algorithm::{Curve, KeyType};

/// The `use` value of every published key.
pub const KEY_USE_SIGNATURE: &str = "sig";

/// The `key_ops` value of every published key.
pub const KEY_OPS: [&str; 2] = ["sign", "verify"];

/// Media type of a single public key document.
pub const JWK_CONTENT_TYPE: &str = "application/jwk+json";

/// Media type of the public key set document.
pub const JWK_SET_CONTENT_TYPE: &str = "application/jwk-set+json";

/// Public half of a signing key as a JSON Web Key.
///
/// EC keys carry `crv`, `x` and `y`; RSA keys carry `n` and `e`. Coordinates
/// and integers are unpadded base64url, with EC coordinates left-padded to the
/// curve's field size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwk {
    /// Curve name (EC only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crv: Option<Curve>,

    /// RSA public exponent (RSA only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub e: Option<String>,

    /// Permitted operations.
    pub key_ops: Vec<String>,

    /// Key identifier.
    pub kid: String,

    /// Key family.
    pub kty: KeyType,

    /// RSA modulus (RSA only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n: Option<String>,

    /// Intended use.
    #[serde(rename = "use")]
    pub key_use: String,

    /// EC x coordinate (EC only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<String>,

    /// EC y coordinate (EC only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<String>,
}

impl Jwk {
    /// Builds an EC public key document from encoded coordinates.
    #[must_use]
    pub fn ec(kid: impl Into<String>, crv: Curve, x: String, y: String) -> Self {
        Self {
            crv: Some(crv),
            e: None,
            key_ops: default_key_ops(),
            kid: kid.into(),
            kty: KeyType::Ec,
            n: None,
            key_use: KEY_USE_SIGNATURE.to_owned(),
            x: Some(x),
            y: Some(y),
        }
    }

    /// Builds an RSA public key document from the encoded modulus and exponent.
    #[must_use]
    pub fn rsa(kid: impl Into<String>, n: String, e: String) -> Self {
        Self {
            crv: None,
            e: Some(e),
            key_ops: default_key_ops(),
            kid: kid.into(),
            kty: KeyType::Rsa,
            n: Some(n),
            key_use: KEY_USE_SIGNATURE.to_owned(),
            x: None,
            y: None,
        }
    }
}

fn default_key_ops() -> Vec<String> {
    KEY_OPS.iter().map(|op| (*op).to_owned()).collect()
}

/// A JWK Set document, as served from the public key set endpoint.
///
/// The store renders this document directly from cached per-key bytes; this
/// type exists for consumers that need to parse it back.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct JwkSet {
    /// Published keys, oldest first.
    pub keys: Vec<Jwk>,
}

impl JwkSet {
    /// Finds a key by identifier.
    #[must_use]
    pub fn find(&self, kid: &str) -> Option<&Jwk> {
        self.keys.iter().find(|k| k.kid == kid)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn test_ec_members_are_sorted() {
        let jwk = Jwk::ec("k1", Curve::P256, "xx".into(), "yy".into());
        let json = serde_json::to_string(&jwk).unwrap();
        assert_eq!(
            json,
            r#"{"crv":"P-256","key_ops":["sign","verify"],"kid":"k1","kty":"EC","use":"sig","x":"xx","y":"yy"}"#
        );
    }

    #[test]
    fn test_rsa_members_are_sorted() {
        let jwk = Jwk::rsa("k2", "nn".into(), "AQAB".into());
        let json = serde_json::to_string(&jwk).unwrap();
        assert_eq!(
            json,
            r#"{"e":"AQAB","key_ops":["sign","verify"],"kid":"k2","kty":"RSA","n":"nn","use":"sig"}"#
        );
    }

    #[test]
    fn test_set_find() {
        let set = JwkSet {
            keys: vec![
                Jwk::rsa("a", "n".into(), "e".into()),
                Jwk::ec("b", Curve::P384, "x".into(), "y".into()),
            ],
        };
        assert_eq!(set.find("b").and_then(|k| k.crv), Some(Curve::P384));
        assert!(set.find("c").is_none());
    }

    #[test]
    fn test_parse_set() {
        let set: JwkSet = serde_json::from_str(
            r#"{"keys":[{"crv":"P-521","key_ops":["sign","verify"],"kid":"z","kty":"EC","use":"sig","x":"a","y":"b"}]}"#,
        )
        .unwrap();
        assert_eq!(set.keys.len(), 1);
        assert_eq!(set.keys[0].kty, KeyType::Ec);
        assert_eq!(set.keys[0].key_use, "sig");
    }
}
