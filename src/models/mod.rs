mod claims;
mod credential;
mod exchange;

pub use claims::{EmbeddedClaims, OutboundToken, TrustedClaims};
pub use credential::{ServiceAccount, ServiceCredential, SERVICE_ACCOUNT_VAR};
pub use exchange::{ExchangeRequest, ExchangeResponse};
