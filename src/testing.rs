//! Keys, tokens and fake key sources shared by the unit tests.

use crate::config::BridgeConfig;
use crate::keys::{FetchedKeys, JwksDocument, KeyCache, KeySetSource, RefreshPolicy};
use crate::models::ServiceCredential;
use anyhow::{anyhow, Error};
use async_trait::async_trait;
use josekit::jwk::alg::ec::EcKeyPair;
use josekit::jwk::alg::rsa::RsaKeyPair;
use josekit::jwk::Jwk;
use josekit::jws::{JwsHeader, JwsSigner, ES256, RS256};
use josekit::jwt::{self, JwtPayload};
use lazy_static::lazy_static;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;

pub const ISSUER: &'static str = "https://creatorsgarten.org";
pub const AUDIENCE: &'static str = "https://github.com/showdownspace/codeinthewind-editor-shell";
pub const PROVIDER_KID: &'static str = "provider-key-1";
pub const ROTATED_KID: &'static str = "provider-key-2";
pub const EC_KID: &'static str = "provider-ec-1";
pub const CLIENT_EMAIL: &'static str = "firebase-adminsdk@bridge-test.iam.gserviceaccount.com";

lazy_static! {
    /// The identity provider's current RSA signing key.
    pub static ref PROVIDER_KEY: RsaKeyPair = RS256.generate_key_pair(2048).unwrap();
    /// A key the provider rotates to, or an attacker's key when it is not published.
    pub static ref ROTATED_KEY: RsaKeyPair = RS256.generate_key_pair(2048).unwrap();
    pub static ref EC_KEY: EcKeyPair = ES256.generate_key_pair().unwrap();
    /// The service account key minted tokens are signed with.
    pub static ref CREDENTIAL_KEY: RsaKeyPair = RS256.generate_key_pair(2048).unwrap();
}

pub fn public_jwk(jwk: Jwk, kid: &str, alg: &str) -> Value {
    let mut jwk = jwk;
    jwk.set_key_id(kid);
    jwk.set_algorithm(alg);
    jwk.set_key_use("sig");
    Value::Object(jwk.as_ref().clone())
}

pub fn provider_jwks() -> Value {
    json!({
        "keys": [public_jwk(PROVIDER_KEY.to_jwk_public_key(), PROVIDER_KID, "RS256")]
    })
}

pub fn rotated_jwks() -> Value {
    json!({
        "keys": [
            public_jwk(PROVIDER_KEY.to_jwk_public_key(), PROVIDER_KID, "RS256"),
            public_jwk(ROTATED_KEY.to_jwk_public_key(), ROTATED_KID, "RS256"),
            public_jwk(EC_KEY.to_jwk_public_key(), EC_KID, "ES256"),
        ]
    })
}

/// Claims an Authgarten ID token for the documented example user would carry.
pub fn valid_claims() -> Value {
    let now = OffsetDateTime::now_utc().unix_timestamp();

    json!({
        "iss": ISSUER,
        "aud": AUDIENCE,
        "sub": "abc123",
        "name": "Ada",
        "picture": "https://x/y.png",
        "iat": now,
        "exp": now + 3600,
    })
}

pub fn with_claim(claims: Value, key: &str, value: Value) -> Value {
    let mut claims = claims;
    claims.as_object_mut().unwrap().insert(key.to_string(), value);
    claims
}

pub fn sign_with(signer: &dyn JwsSigner, kid: Option<&str>, claims: &Value) -> String {
    let mut header = JwsHeader::new();
    header.set_token_type("JWT");

    if let Some(kid) = kid {
        header.set_key_id(kid);
    }

    let payload = JwtPayload::from_map(claims.as_object().unwrap().clone()).unwrap();

    jwt::encode_with_signer(&payload, &header, signer).unwrap()
}

pub fn sign_rsa(key: &RsaKeyPair, kid: &str, claims: &Value) -> String {
    let signer = RS256.signer_from_pem(key.to_pem_private_key()).unwrap();
    sign_with(&signer, Some(kid), claims)
}

pub fn test_config() -> BridgeConfig {
    BridgeConfig::new(ISSUER, AUDIENCE, "https://creatorsgarten.org/.well-known/jwks").unwrap()
}

pub fn test_credential() -> ServiceCredential {
    let pem = String::from_utf8(CREDENTIAL_KEY.to_pem_private_key()).unwrap();

    ServiceCredential::from_json(
        &json!({
            "type": "service_account",
            "project_id": "bridge-test",
            "private_key_id": "credential-key-1",
            "private_key": pem,
            "client_email": CLIENT_EMAIL,
        })
        .to_string(),
    )
    .unwrap()
}

/// In-memory key source whose document, latency and availability tests can change.
pub struct FakeKeySource {
    document: Mutex<Value>,
    max_age: Mutex<Option<Duration>>,
    delay: Mutex<Duration>,
    failing: AtomicBool,
    calls: AtomicUsize,
}

impl FakeKeySource {
    pub fn new(document: Value) -> Arc<Self> {
        Arc::new(Self {
            document: Mutex::new(document),
            max_age: Mutex::new(None),
            delay: Mutex::new(Duration::ZERO),
            failing: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn set_document(&self, document: Value) {
        *self.document.lock() = document;
    }

    pub fn set_max_age(&self, max_age: Option<Duration>) {
        *self.max_age.lock() = max_age;
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = delay;
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KeySetSource for FakeKeySource {
    async fn fetch(&self) -> Result<FetchedKeys, Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let delay = { *self.delay.lock() };

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if self.failing.load(Ordering::SeqCst) {
            return Err(anyhow!("connection refused"));
        }

        let bytes = serde_json::to_vec(&*self.document.lock())?;

        Ok(FetchedKeys {
            document: JwksDocument::from_slice(&bytes)?,
            max_age: *self.max_age.lock(),
        })
    }
}

pub fn policy(cooldown: Duration) -> RefreshPolicy {
    RefreshPolicy {
        timeout: Duration::from_secs(5),
        max_age: Duration::from_secs(600),
        cooldown,
    }
}

pub fn cache_with(source: Arc<FakeKeySource>, policy: RefreshPolicy) -> KeyCache {
    KeyCache::new(source, policy)
}
