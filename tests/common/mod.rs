use josekit::jwk::alg::rsa::RsaKeyPair;
use josekit::jws::{JwsHeader, RS256};
use josekit::jwt::{self, JwtPayload};
use lazy_static::lazy_static;
use mockito::{Mock, ServerGuard};
use serde_json::{json, Value};
use time::OffsetDateTime;

pub const ISSUER: &'static str = "https://creatorsgarten.org";
pub const AUDIENCE: &'static str = "https://github.com/showdownspace/codeinthewind-editor-shell";
pub const KID: &'static str = "authgarten-test-1";
pub const JWKS_PATH: &'static str = "/.well-known/jwks";

lazy_static! {
    pub static ref PROVIDER_KEY: RsaKeyPair = RS256.generate_key_pair(2048).unwrap();
}

/// The provider's JWKS document with its single RS256 key.
pub fn jwks() -> Value {
    let mut jwk = PROVIDER_KEY.to_jwk_public_key();
    jwk.set_key_id(KID);
    jwk.set_algorithm("RS256");
    jwk.set_key_use("sig");

    json!({ "keys": [Value::Object(jwk.as_ref().clone())] })
}

/// Sign an ID token for `sub` that is valid for the next hour.
pub fn id_token(sub: &str) -> String {
    let now = OffsetDateTime::now_utc().unix_timestamp();
    let claims = json!({
        "iss": ISSUER,
        "aud": AUDIENCE,
        "sub": sub,
        "name": "Ada",
        "iat": now,
        "exp": now + 3600,
    });

    let mut header = JwsHeader::new();
    header.set_token_type("JWT");
    header.set_key_id(KID);

    let payload = JwtPayload::from_map(claims.as_object().unwrap().clone()).unwrap();
    let signer = RS256.signer_from_pem(PROVIDER_KEY.to_pem_private_key()).unwrap();

    jwt::encode_with_signer(&payload, &header, &signer).unwrap()
}

/// Serve the JWKS document, expecting exactly `hits` requests.
pub async fn mock_jwks(server: &mut ServerGuard, hits: usize) -> Mock {
    server
        .mock("GET", JWKS_PATH)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_header("cache-control", "public, max-age=120")
        .with_body(jwks().to_string())
        .expect(hits)
        .create_async()
        .await
}
