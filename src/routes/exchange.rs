use crate::bridge::TokenBridge;
use crate::error::BridgeError;
use crate::models::{ExchangeRequest, ExchangeResponse};
use rocket::serde::json::{Error as JsonError, Json, Value};
use rocket::{get, post, State};
use serde_json::json;

/// The root URL, a liveness check.
#[get("/")]
pub(crate) fn index() -> Json<Value> {
    Json(json!({ "message": "Welcome." }))
}

/// Exchange an Authgarten ID token for a Firebase custom token.
///
/// Receives a POST request with a JSON body `{ "idToken": <string> }`, where the token is an ID
/// token issued by Authgarten for the editor shell client. The token is verified against
/// Authgarten's published keys, issuer and client ID; if it holds up, a custom token for the user
/// `authgarten-<sub>` is minted and returned as `{ "customToken": <string> }` for the client to
/// pass to Firebase's `signInWithCustomToken`.
///
/// Failures respond with `{ "error", "message" }`:
///
///  - 400 when the body or the token is malformed,
///  - 401 when the token is well-formed but not trustworthy,
///  - 503 when Authgarten's keys could not be fetched (safe to retry),
///  - 500 when the service credential cannot sign.
#[post("/firebase", data = "<body>")]
pub(crate) async fn exchange_handler(
    bridge: &State<TokenBridge>,
    body: Result<Json<ExchangeRequest>, JsonError<'_>>,
) -> Result<Json<ExchangeResponse>, BridgeError> {
    log::info!("Received token exchange request.");

    // the body may contain a token, so only the parser's position information is logged
    let request = body.map_err(|e| {
        let reason = match e {
            JsonError::Io(e) => format!("unable to read body: {}", e),
            JsonError::Parse(_, e) => format!("unable to parse body: {}", e),
        };
        log::warn!("Rejected token exchange request: {}", reason);
        BridgeError::InvalidRequest(reason)
    })?;

    let token = bridge.exchange(&request.id_token).await?;

    log::info!("Issued custom token for {}.", token.uid());

    Ok(Json(ExchangeResponse {
        custom_token: token.into_string(),
    }))
}
