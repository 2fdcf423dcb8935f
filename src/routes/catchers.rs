use crate::error::{ErrorBody, ErrorClass};
use rocket::catch;
use rocket::serde::json::Json;

/// Catch a 400 response, usually a body Rocket could not read at all.
#[catch(400)]
pub(crate) fn catch_bad_request() -> Json<ErrorBody> {
    Json(ErrorBody::from(ErrorClass::InvalidRequest))
}

#[catch(404)]
pub(crate) fn catch_not_found() -> Json<ErrorBody> {
    Json(ErrorBody {
        error: "not_found",
        message: "No such endpoint.",
    })
}

/// Catch a 422 response, a body that parsed but did not have the expected shape.
#[catch(422)]
pub(crate) fn catch_unprocessable() -> Json<ErrorBody> {
    Json(ErrorBody::from(ErrorClass::InvalidRequest))
}

/// Catch a 500 response, usually an indication that a handler panicked.
#[catch(500)]
pub(crate) fn catch_server_error() -> Json<ErrorBody> {
    Json(ErrorBody::from(ErrorClass::Internal))
}
