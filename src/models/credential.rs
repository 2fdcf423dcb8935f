use crate::error::{BridgeError, Result};
use anyhow::{anyhow, Error};
use josekit::jws::{JwsSigner, RS256};
use serde::Deserialize;
use std::env;
use std::fmt;

/// The environment variable containing the Firebase service account JSON.
pub const SERVICE_ACCOUNT_VAR: &'static str = "FIREBASE_SERVICE_ACCOUNT_JSON";

/// The subset of a Google service account key file needed to mint custom tokens.
///
/// Intentionally not `Debug`: `private_key` must never reach a log.
#[derive(Deserialize)]
pub struct ServiceAccount {
    /// The service account principal, used as both `iss` and `sub` of minted tokens.
    pub client_email: String,
    /// PKCS#8 PEM-encoded RSA private key.
    pub private_key: String,
    /// Id of the key within the service account, published as `kid` when present.
    #[serde(default)]
    pub private_key_id: Option<String>,
}

/// The signing authority for minted tokens: a private key plus the identity it signs as.
///
/// Loaded once at startup and immutable afterwards, so it can be shared between requests without
/// synchronization.
pub struct ServiceCredential {
    client_email: String,
    key_id: Option<String>,
    signer: Box<dyn JwsSigner>,
}

impl ServiceCredential {
    /// Import the RSA private key of a service account as an RS256 signer.
    ///
    /// Fails with [`BridgeError::SigningFailure`] when the key material is unusable.
    pub fn from_service_account(account: ServiceAccount) -> Result<Self> {
        let client_email = account.client_email.trim().to_string();

        if client_email.is_empty() {
            return Err(BridgeError::SigningFailure(
                "service account has an empty client_email".into(),
            ));
        }

        let signer = RS256
            .signer_from_pem(account.private_key.as_bytes())
            .map_err(|e| {
                BridgeError::SigningFailure(format!(
                    "unable to import the service account private key: {}",
                    e
                ))
            })?;

        Ok(Self {
            client_email,
            key_id: account.private_key_id.filter(|s| !s.is_empty()),
            signer: Box::new(signer),
        })
    }

    /// Parse a service account JSON blob as downloaded from the Firebase console.
    pub fn from_json(json: &str) -> Result<Self> {
        let account: ServiceAccount = serde_json::from_str(json).map_err(|e| {
            // serde_json errors carry only a position, never the offending content
            BridgeError::SigningFailure(format!("unable to parse the service account JSON: {}", e))
        })?;

        Self::from_service_account(account)
    }

    /// Load the credential from the `FIREBASE_SERVICE_ACCOUNT_JSON` environment variable.
    pub fn from_env() -> std::result::Result<Self, Error> {
        let json = env::var(SERVICE_ACCOUNT_VAR).map_err(|e| {
            anyhow!(
                "Unable to get the service account from the environment, please set it using the {} environment variable: {}",
                SERVICE_ACCOUNT_VAR,
                e
            )
        })?;

        Ok(Self::from_json(&json)?)
    }

    pub fn client_email(&self) -> &str {
        self.client_email.as_ref()
    }

    pub fn key_id(&self) -> Option<&str> {
        self.key_id.as_ref().map(|s| s.as_ref())
    }

    pub(crate) fn signer(&self) -> &dyn JwsSigner {
        self.signer.as_ref()
    }
}

impl fmt::Debug for ServiceCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceCredential")
            .field("client_email", &self.client_email)
            .field("key_id", &self.key_id)
            .field("signer", &"<redacted>")
            .finish()
    }
}
