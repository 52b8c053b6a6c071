//! Wire compatibility: tokens signed here verify with `jsonwebtoken` using
//! only the published JWK documents.

#![allow(clippy::expect_used, clippy::panic)]

use std::{sync::Arc, time::Duration};

use jsonwebtoken::{
    Algorithm as JwtAlgorithm, DecodingKey, Validation, decode, decode_header,
    jwk::{Jwk as JwtJwk, JwkSet as JwtJwkSet},
};
use rstest::rstest;
use utu_keys::{Curve, KeyConfig, KeyPairGenerator, KeyStore, KeyType};
use utu_token::{
    ACCESS_TOKEN_TYPE, CurrentKeySource, Issuer, IssuerConfig, Signer, Verifier, jose::CompactParts,
};

const AUDIENCE: &str = "api";

struct Setup {
    store: Arc<KeyStore>,
    generator: Arc<KeyPairGenerator>,
    issuer: Issuer,
    signer: Signer,
}

fn setup(config: &KeyConfig) -> Setup {
    let generator = Arc::new(KeyPairGenerator::new(config).expect("generator"));
    let store = Arc::new(KeyStore::initialize(generator.as_ref()).expect("initialize"));
    let issuer = Issuer::new(
        IssuerConfig::builder()
            .audience(vec![AUDIENCE.to_owned()])
            .expires(Duration::from_secs(600))
            .build()
            .expect("issuer config"),
    )
    .expect("issuer");
    let signer =
        Signer::builder().source(Arc::clone(&store) as Arc<dyn CurrentKeySource>).build();
    Setup { store, generator, issuer, signer }
}

fn validation(alg: JwtAlgorithm) -> Validation {
    let mut validation = Validation::new(alg);
    validation.set_audience(&[AUDIENCE]);
    validation.set_issuer(&["utu"]);
    validation
}

#[rstest]
#[case::es256(KeyType::Ec, Curve::P256, JwtAlgorithm::ES256)]
#[case::es384(KeyType::Ec, Curve::P384, JwtAlgorithm::ES384)]
#[case::rs256(KeyType::Rsa, Curve::P256, JwtAlgorithm::RS256)]
fn verifies_with_published_jwk(
    #[case] key_type: KeyType,
    #[case] curve: Curve,
    #[case] alg: JwtAlgorithm,
) {
    // 2048 bits is the smallest RSA key jsonwebtoken accepts.
    let config =
        KeyConfig::builder().key_type(key_type).key_curve(curve).key_size(2048).build();
    let s = setup(&config.expect("key config"));

    let claims = s.issuer.issue().expect("issue");
    let token = s.signer.sign(&claims).expect("sign");

    let header = decode_header(&token).expect("header");
    assert_eq!(header.alg, alg);
    assert_eq!(header.typ.as_deref(), Some(ACCESS_TOKEN_TYPE));
    assert_eq!(header.kid.as_deref(), Some(s.store.current().kid()));

    let jwk: JwtJwk =
        serde_json::from_slice(&s.store.current().public_jwk_json()).expect("JWK parses");
    let key = DecodingKey::from_jwk(&jwk).expect("decoding key from JWK");
    let decoded =
        decode::<serde_json::Value>(&token, &key, &validation(alg)).expect("jsonwebtoken verifies");

    assert_eq!(decoded.claims["jti"], claims.jti.as_str());
    assert_eq!(decoded.claims["exp"], claims.exp);
}

#[test]
fn superseded_key_stays_in_published_set() {
    let s = setup(&KeyConfig::default());
    let token = s.signer.sign(&s.issuer.issue().expect("issue")).expect("sign");
    let kid = decode_header(&token).expect("header").kid.expect("kid");

    s.store.rotate(s.generator.as_ref()).expect("rotate");

    let set: JwtJwkSet = serde_json::from_slice(&s.store.snapshot_public()).expect("set parses");
    assert_eq!(set.keys.len(), 2);
    let jwk = set.find(&kid).expect("old key still published");
    let key = DecodingKey::from_jwk(jwk).expect("decoding key");
    decode::<serde_json::Value>(&token, &key, &validation(JwtAlgorithm::ES256))
        .expect("token signed before rotation still verifies");
}

#[test]
fn es512_round_trips_through_verifier() {
    let config = KeyConfig::builder().key_curve(Curve::P521).build().expect("key config");
    let s = setup(&config);
    let verifier = Verifier::builder().store(Arc::clone(&s.store)).build().expect("verifier");

    let claims = s.issuer.issue().expect("issue");
    let token = s.signer.sign(&claims).expect("sign");

    // jsonwebtoken has no ES512, so read the header with our own parser.
    let parts = CompactParts::parse(&token).expect("compact JWS");
    assert_eq!(parts.header.alg, "ES512");
    assert_eq!(parts.header.kid.as_deref(), Some(s.store.current().kid()));
    assert_eq!(verifier.verify(&token).expect("verifies"), claims);
}

#[test]
fn jsonwebtoken_rejects_token_after_key_swap() {
    let s = setup(&KeyConfig::default());
    let token = s.signer.sign(&s.issuer.issue().expect("issue")).expect("sign");

    let rotation = s.store.rotate(s.generator.as_ref()).expect("rotate");
    let jwk: JwtJwk =
        serde_json::from_slice(&rotation.current.public_jwk_json()).expect("JWK parses");
    let key = DecodingKey::from_jwk(&jwk).expect("decoding key");

    assert!(decode::<serde_json::Value>(&token, &key, &validation(JwtAlgorithm::ES256)).is_err());
}
