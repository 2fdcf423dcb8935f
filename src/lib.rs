//! Exchanges Authgarten ID tokens for Firebase custom tokens.
//!
//! An inbound ID token is verified against Authgarten's published signing keys
//! ([`auth::JwtVerifier`], backed by [`keys::KeyCache`]); if it holds up, a custom token for the
//! same user is signed with a Firebase service account ([`auth::JwtMinter`]). [`start`] mounts the
//! exchange on a Rocket instance.

pub mod auth;
pub mod bridge;
pub mod config;
pub mod error;
pub mod keys;
pub mod models;
mod routes;

#[cfg(test)]
mod testing;

pub use bridge::TokenBridge;
pub use config::BridgeConfig;
pub use error::{BridgeError, ErrorClass};
pub use models::ServiceCredential;
pub use routes::Cors;

use rocket::{catchers, routes, Build, Rocket};

/// Build the Rocket instance serving `bridge`.
pub fn start(bridge: TokenBridge) -> Rocket<Build> {
    rocket::build()
        .manage(bridge)
        .mount(
            "/",
            routes![
                routes::index,
                routes::exchange_handler,
                routes::preflight
            ],
        )
        .register(
            "/",
            catchers![
                routes::catch_bad_request,
                routes::catch_not_found,
                routes::catch_unprocessable,
                routes::catch_server_error
            ],
        )
        .attach(Cors)
}
