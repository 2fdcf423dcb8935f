use crate::auth::algorithm::VerificationAlgorithm;
use crate::config::BridgeConfig;
use crate::error::{BridgeError, Result};
use crate::keys::KeyCache;
use crate::models::TrustedClaims;
use josekit::jwt::{self, JwtPayload};
use josekit::JoseError;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;

/// The parts of a JWS protected header needed to pick a verification key.
#[derive(Debug, Deserialize)]
struct TokenHeader {
    alg: Option<String>,
    kid: Option<String>,
}

/// Verifies Authgarten ID tokens against the provider's published keys.
///
/// Checks run in a fixed order: structure, key lookup, signature, then `iss`, `aud` and the
/// validity window. No claim is looked at before the signature has verified.
pub struct JwtVerifier {
    keys: Arc<KeyCache>,
    issuer: String,
    audience: String,
    clock_skew: Duration,
}

impl JwtVerifier {
    pub fn new(config: &BridgeConfig, keys: Arc<KeyCache>) -> Self {
        Self {
            keys,
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
            clock_skew: config.clock_skew,
        }
    }

    pub fn keys(&self) -> &KeyCache {
        self.keys.as_ref()
    }

    /// Verify a compact JWS and return the claims it vouches for.
    pub async fn verify(&self, token: &str) -> Result<TrustedClaims> {
        self.verify_at(token, OffsetDateTime::now_utc()).await
    }

    pub(crate) async fn verify_at(&self, token: &str, now: OffsetDateTime) -> Result<TrustedClaims> {
        let token = token.trim();

        // 1. structure and header
        let (algorithm, key_id) = parse_header(token)?;

        // 2. key resolution, possibly refreshing the provider key set
        let jwk = self.keys.resolve(key_id.as_str()).await?;

        // 3. signature
        let verifier = algorithm.verifier_from_jwk(&jwk).map_err(|e| {
            BridgeError::MalformedToken(format!(
                "declared algorithm {} does not match provider key {:?}: {}",
                algorithm, key_id, e
            ))
        })?;

        let (payload, _header) =
            jwt::decode_with_verifier(token, verifier.as_ref()).map_err(classify_decode_error)?;

        // 4-6. claims, only now that the signature is known to be good
        self.validate_claims(&payload, now)
    }

    fn validate_claims(&self, payload: &JwtPayload, now: OffsetDateTime) -> Result<TrustedClaims> {
        if payload.issuer() != Some(self.issuer.as_str()) {
            return Err(BridgeError::IssuerMismatch {
                found: payload.issuer().map(|s| s.to_string()),
            });
        }

        let audience = payload.audience().unwrap_or_default();

        if !audience.iter().any(|aud| *aud == self.audience) {
            return Err(BridgeError::AudienceMismatch {
                found: audience.iter().map(|s| s.to_string()).collect(),
            });
        }

        let (now, skew) = (now.unix_timestamp(), self.clock_skew.as_secs() as i64);

        let expires_at = timestamp_claim(payload, "exp")?
            .ok_or_else(|| BridgeError::MalformedToken("token has no exp claim".into()))?;

        if expires_at <= now - skew {
            return Err(BridgeError::TokenExpired(expires_at));
        }

        if let Some(not_before) = timestamp_claim(payload, "nbf")? {
            if not_before > now + skew {
                return Err(BridgeError::TokenNotYetValid(not_before));
            }
        }

        // 7. extract, straight from the verified payload
        let subject = payload
            .subject()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| BridgeError::MalformedToken("token has no sub claim".into()))?;

        Ok(TrustedClaims::new(
            subject.to_string(),
            string_claim(payload, "name"),
            string_claim(payload, "picture"),
            timestamp_claim(payload, "iat")?,
            expires_at,
        ))
    }
}

/// Read `alg` and `kid` from the protected header of a compact JWS without trusting anything else.
fn parse_header(token: &str) -> Result<(VerificationAlgorithm, String)> {
    let segments = token.split('.').collect::<Vec<_>>();

    if segments.len() != 3 || segments.iter().any(|s| s.is_empty()) {
        return Err(BridgeError::MalformedToken(format!(
            "expected three non-empty dot-separated segments, found {}",
            segments.len()
        )));
    }

    let header: TokenHeader = base64::decode_config(segments[0], base64::URL_SAFE_NO_PAD)
        .map_err(|e| BridgeError::MalformedToken(format!("header is not base64url: {}", e)))
        .and_then(|bytes| {
            serde_json::from_slice(&bytes).map_err(|e| {
                BridgeError::MalformedToken(format!("header is not a JSON object: {}", e))
            })
        })?;

    let algorithm = header
        .alg
        .as_deref()
        .ok_or_else(|| BridgeError::MalformedToken("header has no alg".into()))
        .and_then(|alg| {
            VerificationAlgorithm::from_name(alg).ok_or_else(|| {
                BridgeError::MalformedToken(format!("algorithm {:?} is not accepted", alg))
            })
        })?;

    let key_id = header
        .kid
        .filter(|s| !s.is_empty())
        .ok_or_else(|| BridgeError::MalformedToken("header has no kid".into()))?;

    Ok((algorithm, key_id))
}

fn classify_decode_error(e: JoseError) -> BridgeError {
    match e {
        JoseError::InvalidSignature(e) => BridgeError::BadSignature(e.to_string()),
        other => BridgeError::MalformedToken(other.to_string()),
    }
}

/// Read a NumericDate claim as whole seconds.
///
/// josekit's typed accessors panic on values past `i64::MAX`, so the raw JSON is read instead.
fn timestamp_claim(payload: &JwtPayload, key: &str) -> Result<Option<i64>> {
    match payload.claim(key) {
        None => Ok(None),
        Some(value) => value
            .as_u64()
            .and_then(|secs| i64::try_from(secs).ok())
            .map(Some)
            .ok_or_else(|| BridgeError::MalformedToken(format!("{} claim is out of range", key))),
    }
}

fn string_claim(payload: &JwtPayload, key: &str) -> Option<String> {
    payload
        .claim(key)
        .and_then(Value::as_str)
        .map(|s| s.to_string())
}
