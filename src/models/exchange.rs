use serde::{Deserialize, Serialize};

/// Body of `POST /firebase`.
#[derive(Deserialize)]
pub struct ExchangeRequest {
    /// The Authgarten ID token, a compact JWS.
    #[serde(rename = "idToken")]
    pub id_token: String,
}

/// Successful response of `POST /firebase`.
#[derive(Serialize)]
pub struct ExchangeResponse {
    /// A Firebase custom token for `signInWithCustomToken`.
    #[serde(rename = "customToken")]
    pub custom_token: String,
}
