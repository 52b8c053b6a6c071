//! # utu token
//!
//! Access token issuance on top of the rotating keys in [`utu_keys`].
//!
//! This crate provides:
//! - **Issuer**: builds claim sets with a random `jti` and configured
//!   `iss`/`sub`/`aud`/extra claims
//! - **JOSE encoding**: compact JWS with `kid` and `typ: at+jwt` in the
//!   protected header
//! - **Signer**: signs with whatever key is current, from either the key store
//!   or the current-key register
//! - **Verifier**: checks tokens against every key still in the store
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use utu_keys::{KeyConfig, KeyPairGenerator, KeyStore};
//! use utu_token::{CurrentKeySource, Issuer, IssuerConfig, Signer, Verifier};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let generator = KeyPairGenerator::new(&KeyConfig::default())?;
//! let store = Arc::new(KeyStore::initialize(&generator)?);
//!
//! let issuer = Issuer::new(IssuerConfig::builder().audience(vec!["api".into()]).build()?)?;
//! let signer = Signer::builder().source(Arc::clone(&store) as Arc<dyn CurrentKeySource>).build();
//! let verifier = Verifier::builder().store(store).build()?;
//!
//! let token = signer.sign(&issuer.issue()?)?;
//! let claims = verifier.verify(&token)?;
//! assert_eq!(claims.aud, vec!["api".to_owned()]);
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

/// Access token claims.
pub mod claims;
/// Token error types.
pub mod error;
/// Claim issuance.
pub mod issuer;
/// Compact JWS encoding.
pub mod jose;
/// Current-key signing.
pub mod signer;
/// Token verification.
pub mod verifier;

pub use claims::Claims;
pub use error::{TokenError, TokenResult};
pub use issuer::{Issuer, IssuerConfig};
pub use jose::{ACCESS_TOKEN_TYPE, CompactJws, JWT_CONTENT_TYPE, JoseEncoder};
pub use signer::{CurrentKeySource, Signer};
pub use verifier::Verifier;
