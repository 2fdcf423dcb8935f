use rocket::http::Status;
use rocket::response::{self, Responder};
use rocket::serde::json::Json;
use rocket::Request;
use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, BridgeError>;

/// Every way a token exchange can fail.
///
/// The `Display` output carries diagnostic detail for the server log only. Responses sent to the
/// caller are built from [`ErrorClass`] and never include that detail.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// The request body did not have the `{ "idToken": <string> }` shape.
    #[error("Invalid exchange request: {0}")]
    InvalidRequest(String),
    /// The inbound token is not a well-formed compact JWS, or declares an unusable header.
    #[error("Malformed identity token: {0}")]
    MalformedToken(String),
    /// No key in the provider's key set matches the token's key id, even after a refresh.
    #[error("No signing key with id {0:?} in the provider key set")]
    UnknownKey(String),
    #[error("Identity token signature does not verify: {0}")]
    BadSignature(String),
    #[error("Identity token issuer does not match, found {found:?}")]
    IssuerMismatch { found: Option<String> },
    #[error("Identity token audience does not match, found {found:?}")]
    AudienceMismatch { found: Vec<String> },
    /// Unix timestamp of the token's `exp` claim.
    #[error("Identity token expired at {0}")]
    TokenExpired(i64),
    /// Unix timestamp of the token's `nbf` claim.
    #[error("Identity token is not valid before {0}")]
    TokenNotYetValid(i64),
    /// Fetching the provider key set failed or timed out.
    #[error("Provider key set unavailable: {0}")]
    KeySetUnavailable(String),
    /// The service credential could not be imported or could not sign.
    #[error("Unable to sign custom token: {0}")]
    SigningFailure(String),
}

/// Coarse failure class, the only part of an error that reaches the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    InvalidRequest,
    InvalidToken,
    ServiceUnavailable,
    Internal,
}

impl ErrorClass {
    pub fn code(&self) -> &'static str {
        match self {
            ErrorClass::InvalidRequest => "invalid_request",
            ErrorClass::InvalidToken => "invalid_token",
            ErrorClass::ServiceUnavailable => "service_unavailable",
            ErrorClass::Internal => "internal_error",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            ErrorClass::InvalidRequest => "The request body must be a JSON object with an idToken string.",
            ErrorClass::InvalidToken => "The identity token could not be verified.",
            ErrorClass::ServiceUnavailable => {
                "The identity provider keys are temporarily unavailable, please retry."
            }
            ErrorClass::Internal => "The service was unable to issue a token.",
        }
    }
}

impl BridgeError {
    pub fn class(&self) -> ErrorClass {
        match self {
            BridgeError::InvalidRequest(_) => ErrorClass::InvalidRequest,
            BridgeError::MalformedToken(_)
            | BridgeError::UnknownKey(_)
            | BridgeError::BadSignature(_)
            | BridgeError::IssuerMismatch { .. }
            | BridgeError::AudienceMismatch { .. }
            | BridgeError::TokenExpired(_)
            | BridgeError::TokenNotYetValid(_) => ErrorClass::InvalidToken,
            BridgeError::KeySetUnavailable(_) => ErrorClass::ServiceUnavailable,
            BridgeError::SigningFailure(_) => ErrorClass::Internal,
        }
    }

    /// Whether the same request may succeed if tried again later.
    ///
    /// Only key-set resolution is transient; token and credential problems will not change.
    pub fn is_retryable(&self) -> bool {
        matches!(self, BridgeError::KeySetUnavailable(_))
    }

    /// Whether the failure is attributable to the caller's input rather than to this service.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self.class(),
            ErrorClass::InvalidRequest | ErrorClass::InvalidToken
        )
    }

    pub fn status(&self) -> Status {
        match self {
            BridgeError::InvalidRequest(_) | BridgeError::MalformedToken(_) => Status::BadRequest,
            BridgeError::KeySetUnavailable(_) => Status::ServiceUnavailable,
            BridgeError::SigningFailure(_) => Status::InternalServerError,
            _ => Status::Unauthorized,
        }
    }
}

/// JSON body returned for every failed request.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: &'static str,
}

impl From<ErrorClass> for ErrorBody {
    fn from(class: ErrorClass) -> Self {
        Self {
            error: class.code(),
            message: class.message(),
        }
    }
}

impl<'r> Responder<'r, 'static> for BridgeError {
    fn respond_to(self, request: &'r Request<'_>) -> response::Result<'static> {
        (self.status(), Json(ErrorBody::from(self.class()))).respond_to(request)
    }
}
