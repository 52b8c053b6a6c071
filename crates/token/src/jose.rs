//! Compact JWS encoding and decoding.
//!
//! Tokens are `base64url(header) . base64url(payload) . base64url(signature)`
//! with unpadded base64url throughout. The protected header always names the
//! signing key's `kid` so verifiers can find it in the published key set.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};
use utu_keys::KeyRecord;

use crate::error::{TokenError, TokenResult};

/// `typ` header value for access tokens (RFC 9068).
pub const ACCESS_TOKEN_TYPE: &str = "at+jwt";

/// Media type of an issued token.
pub const JWT_CONTENT_TYPE: &str = "application/jwt";

/// Encodes payloads into signed tokens.
pub trait JoseEncoder: Send + Sync {
    /// Signs `payload` with `key`, returning the compact serialization.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Encoding`] if the header cannot be encoded, or
    /// [`TokenError::Key`] if the key refuses to sign.
    fn encode(&self, key: &KeyRecord, payload: &[u8]) -> TokenResult<String>;
}

/// JOSE protected header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    /// Signing algorithm name.
    pub alg: String,

    /// Key identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,

    /// Token type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typ: Option<String>,
}

/// Compact JWS serialization with an `at+jwt` protected header.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompactJws;

impl JoseEncoder for CompactJws {
    fn encode(&self, key: &KeyRecord, payload: &[u8]) -> TokenResult<String> {
        let header = Header {
            alg: key.algorithm().as_str().to_owned(),
            kid: Some(key.kid().to_owned()),
            typ: Some(ACCESS_TOKEN_TYPE.to_owned()),
        };

        let mut token = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header)?);
        token.push('.');
        URL_SAFE_NO_PAD.encode_string(payload, &mut token);

        let signature = key.sign(token.as_bytes())?;
        token.push('.');
        URL_SAFE_NO_PAD.encode_string(signature, &mut token);
        Ok(token)
    }
}

/// A compact JWS split into its decoded parts.
#[derive(Debug, Clone)]
pub struct CompactParts<'a> {
    /// Decoded protected header.
    pub header: Header,
    /// Decoded payload bytes.
    pub payload: Vec<u8>,
    /// The `header.payload` text the signature covers.
    pub signing_input: &'a str,
    /// Decoded signature bytes.
    pub signature: Vec<u8>,
}

impl<'a> CompactParts<'a> {
    /// Splits and decodes a compact JWS without verifying it.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::InvalidTokenFormat`] if the token does not have
    /// three base64url segments or the header is not valid JSON.
    pub fn parse(token: &'a str) -> TokenResult<Self> {
        let (signing_input, signature) = token
            .rsplit_once('.')
            .ok_or_else(|| TokenError::InvalidTokenFormat("expected three segments".into()))?;
        let (header, payload) = signing_input
            .split_once('.')
            .ok_or_else(|| TokenError::InvalidTokenFormat("expected three segments".into()))?;
        if payload.contains('.') {
            return Err(TokenError::InvalidTokenFormat("expected three segments".into()));
        }

        let header = decode_segment("header", header)?;
        let header: Header = serde_json::from_slice(&header)
            .map_err(|e| TokenError::InvalidTokenFormat(format!("header: {e}")))?;

        Ok(Self {
            header,
            payload: decode_segment("payload", payload)?,
            signing_input,
            signature: decode_segment("signature", signature)?,
        })
    }
}

fn decode_segment(name: &str, segment: &str) -> TokenResult<Vec<u8>> {
    URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|e| TokenError::InvalidTokenFormat(format!("{name}: {e}")))
}
