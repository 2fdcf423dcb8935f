use serde::Serialize;
use std::fmt;

/// Claims taken from an inbound ID token after its signature, issuer, audience and validity
/// window have all been checked.
///
/// There is no public constructor: the only way to obtain a value is
/// [`JwtVerifier::verify`](crate::auth::JwtVerifier::verify).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustedClaims {
    subject: String,
    name: Option<String>,
    picture: Option<String>,
    issued_at: Option<i64>,
    expires_at: i64,
}

impl TrustedClaims {
    pub(crate) fn new(
        subject: String,
        name: Option<String>,
        picture: Option<String>,
        issued_at: Option<i64>,
        expires_at: i64,
    ) -> Self {
        Self {
            subject,
            name,
            picture,
            issued_at,
            expires_at,
        }
    }

    /// The provider-scoped, stable user id (`sub`).
    pub fn subject(&self) -> &str {
        self.subject.as_ref()
    }

    /// The user's display name.
    pub fn name(&self) -> Option<&str> {
        self.name.as_ref().map(|s| s.as_ref())
    }

    /// A URL to the user's picture.
    pub fn picture(&self) -> Option<&str> {
        self.picture.as_ref().map(|s| s.as_ref())
    }

    pub fn issued_at(&self) -> Option<i64> {
        self.issued_at
    }

    pub fn expires_at(&self) -> i64 {
        self.expires_at
    }
}

/// The developer claims embedded in a minted custom token under `claims`.
///
/// Deliberately only the display name and picture; absent values are omitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmbeddedClaims {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
}

impl From<&TrustedClaims> for EmbeddedClaims {
    fn from(claims: &TrustedClaims) -> Self {
        Self {
            name: claims.name.clone(),
            picture: claims.picture.clone(),
        }
    }
}

/// A signed custom token ready to hand back to the caller.
#[derive(Clone)]
pub struct OutboundToken {
    token: String,
    uid: String,
    issued_at: i64,
    expires_at: i64,
}

impl OutboundToken {
    pub(crate) fn new(token: String, uid: String, issued_at: i64, expires_at: i64) -> Self {
        Self {
            token,
            uid,
            issued_at,
            expires_at,
        }
    }

    /// The compact JWS string.
    pub fn as_str(&self) -> &str {
        self.token.as_ref()
    }

    pub fn into_string(self) -> String {
        self.token
    }

    /// The derived downstream user id carried in the `uid` claim.
    pub fn uid(&self) -> &str {
        self.uid.as_ref()
    }

    pub fn issued_at(&self) -> i64 {
        self.issued_at
    }

    pub fn expires_at(&self) -> i64 {
        self.expires_at
    }
}

// the token itself is a bearer credential and stays out of debug output
impl fmt::Debug for OutboundToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutboundToken")
            .field("uid", &self.uid)
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}
