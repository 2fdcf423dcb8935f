//! The two halves of the bridge: [`JwtVerifier`] for inbound Authgarten ID tokens and
//! [`JwtMinter`] for outbound Firebase custom tokens.

mod algorithm;
mod minter;
mod verifier;


pub use algorithm::VerificationAlgorithm;
pub use minter::{JwtMinter, TOKEN_LIFETIME};
pub use verifier::JwtVerifier;
