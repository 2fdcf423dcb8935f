use crate::auth::{JwtMinter, JwtVerifier};
use crate::config::BridgeConfig;
use crate::error::{BridgeError, Result};
use crate::keys::KeyCache;
use crate::models::{OutboundToken, ServiceCredential};
use anyhow::Error;
use std::sync::Arc;

/// Exchanges Authgarten ID tokens for Firebase custom tokens.
///
/// Only the key cache inside the verifier is shared mutable state; the credential is read-only
/// after startup, so one bridge serves every request concurrently.
pub struct TokenBridge {
    verifier: JwtVerifier,
    minter: JwtMinter,
    credential: Arc<ServiceCredential>,
}

impl TokenBridge {
    pub fn new(verifier: JwtVerifier, minter: JwtMinter, credential: Arc<ServiceCredential>) -> Self {
        Self {
            verifier,
            minter,
            credential,
        }
    }

    /// Wire up a bridge that fetches provider keys from the configured JWKS URL.
    pub fn from_config(config: &BridgeConfig, credential: ServiceCredential) -> std::result::Result<Self, Error> {
        let keys = Arc::new(KeyCache::from_config(config)?);

        Ok(Self::new(
            JwtVerifier::new(config, keys),
            JwtMinter::new(config),
            Arc::new(credential),
        ))
    }

    pub fn verifier(&self) -> &JwtVerifier {
        &self.verifier
    }

    /// Verify `id_token` and, only if that succeeds, mint a custom token for the same user.
    pub async fn exchange(&self, id_token: &str) -> Result<OutboundToken> {
        if id_token.trim().is_empty() {
            return Err(BridgeError::InvalidRequest("idToken is empty".into()));
        }

        let claims = self.verifier.verify(id_token).await.map_err(|e| {
            if e.is_client_error() {
                log::warn!("Rejected identity token: {}", e);
            } else {
                log::error!("Unable to verify identity token: {}", e);
            }
            e
        })?;

        log::info!("Verified identity token for subject {}.", claims.subject());

        self.minter.mint(&claims, &self.credential).map_err(|e| {
            log::error!("{}", e);
            e
        })
    }
}
