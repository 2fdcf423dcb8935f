use crate::config::BridgeConfig;
use crate::error::{BridgeError, Result};
use crate::models::{EmbeddedClaims, OutboundToken, ServiceCredential, TrustedClaims};
use josekit::jws::JwsHeader;
use josekit::jwt::{self, JwtPayload};
use josekit::JoseError;
use serde_json::Value;
use std::time::{Duration, SystemTime};
use time::OffsetDateTime;

/// Lifetime of every minted custom token. Firebase rejects custom tokens valid for longer.
pub const TOKEN_LIFETIME: Duration = Duration::from_secs(3600);

/// Mints Firebase custom tokens for verified Authgarten users.
///
/// See Firebase's ["Create custom tokens using a third-party JWT library"](https://firebase.google.com/docs/auth/admin/create-custom-tokens#create_custom_tokens_using_a_third-party_jwt_library)
/// for the expected shape: `iss` and `sub` are the service account, `aud` is the Identity Toolkit,
/// and the user id travels in `uid` alongside optional developer `claims`.
///
/// The display name is only carried inside `claims`; no top-level `name` claim is minted.
pub struct JwtMinter {
    audience: String,
    subject_prefix: String,
}

impl JwtMinter {
    pub fn new(config: &BridgeConfig) -> Self {
        Self {
            audience: config.downstream_audience.clone(),
            subject_prefix: config.subject_prefix.clone(),
        }
    }

    /// The downstream user id for a verified user; the same inbound subject always maps to the
    /// same value.
    pub fn outbound_uid(&self, claims: &TrustedClaims) -> String {
        format!("{}-{}", self.subject_prefix, claims.subject())
    }

    /// Mint a fresh custom token, valid for [`TOKEN_LIFETIME`] from now.
    pub fn mint(&self, claims: &TrustedClaims, credential: &ServiceCredential) -> Result<OutboundToken> {
        self.mint_at(claims, credential, OffsetDateTime::now_utc())
    }

    pub(crate) fn mint_at(
        &self,
        claims: &TrustedClaims,
        credential: &ServiceCredential,
        now: OffsetDateTime,
    ) -> Result<OutboundToken> {
        let uid = self.outbound_uid(claims);

        // whole seconds, so that exp - iat is exactly the lifetime
        let issued_at = now.unix_timestamp();
        let expires_at = issued_at + TOKEN_LIFETIME.as_secs() as i64;

        let mut payload = JwtPayload::new();
        payload.set_issuer(credential.client_email());
        payload.set_subject(credential.client_email());
        payload.set_audience(vec![self.audience.as_str()]);
        payload.set_issued_at(&system_time(issued_at));
        payload.set_expires_at(&system_time(expires_at));

        let embedded = serde_json::to_value(EmbeddedClaims::from(claims))
            .map_err(|e| BridgeError::SigningFailure(format!("unable to encode claims: {}", e)))?;

        payload
            .set_claim("uid", Some(Value::String(uid.clone())))
            .map_err(payload_error)?;
        payload
            .set_claim("claims", Some(embedded))
            .map_err(payload_error)?;

        let header = {
            let mut value = JwsHeader::new();
            value.set_token_type("JWT");
            value.set_algorithm(credential.signer().algorithm().name());

            if let Some(key_id) = credential.key_id() {
                value.set_key_id(key_id);
            }

            value
        };

        let token = jwt::encode_with_signer(&payload, &header, credential.signer())
            .map_err(|e| BridgeError::SigningFailure(format!("unable to sign token: {}", e)))?;

        log::debug!(
            "Minted custom token for {} as {}, expires at {}",
            uid,
            credential.client_email(),
            expires_at
        );

        Ok(OutboundToken::new(token, uid, issued_at, expires_at))
    }
}

fn payload_error(e: JoseError) -> BridgeError {
    BridgeError::SigningFailure(format!("unable to build payload: {}", e))
}

fn system_time(unix_seconds: i64) -> SystemTime {
    SystemTime::UNIX_EPOCH + Duration::from_secs(unix_seconds.max(0) as u64)
}
