use josekit::jwk::Jwk;
use josekit::jws::{
    JwsVerifier, EdDSA, ES256, ES256K, ES384, ES512, PS256, PS384, PS512, RS256, RS384, RS512,
};
use josekit::JoseError;
use std::fmt;

/// The asymmetric JWS algorithms an inbound token may be signed with.
///
/// `HS*` and `none` have no variant, so a token declaring them can never reach key lookup, which
/// rules out algorithm confusion with a public key used as an HMAC secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VerificationAlgorithm {
    Rs256,
    Rs384,
    Rs512,
    Ps256,
    Ps384,
    Ps512,
    Es256,
    Es256K,
    Es384,
    Es512,
    EdDsa,
}

impl VerificationAlgorithm {
    /// Look up an algorithm by its JWS `alg` name.
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "RS256" => Self::Rs256,
            "RS384" => Self::Rs384,
            "RS512" => Self::Rs512,
            "PS256" => Self::Ps256,
            "PS384" => Self::Ps384,
            "PS512" => Self::Ps512,
            "ES256" => Self::Es256,
            "ES256K" => Self::Es256K,
            "ES384" => Self::Es384,
            "ES512" => Self::Es512,
            "EdDSA" => Self::EdDsa,
            _ => return None,
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Rs256 => "RS256",
            Self::Rs384 => "RS384",
            Self::Rs512 => "RS512",
            Self::Ps256 => "PS256",
            Self::Ps384 => "PS384",
            Self::Ps512 => "PS512",
            Self::Es256 => "ES256",
            Self::Es256K => "ES256K",
            Self::Es384 => "ES384",
            Self::Es512 => "ES512",
            Self::EdDsa => "EdDSA",
        }
    }

    /// Build a verifier for this algorithm from a provider key.
    ///
    /// josekit refuses keys whose `kty`, `crv`, `use` or `alg` are inconsistent with the algorithm.
    pub fn verifier_from_jwk(&self, jwk: &Jwk) -> Result<Box<dyn JwsVerifier>, JoseError> {
        Ok(match self {
            Self::Rs256 => Box::new(RS256.verifier_from_jwk(jwk)?),
            Self::Rs384 => Box::new(RS384.verifier_from_jwk(jwk)?),
            Self::Rs512 => Box::new(RS512.verifier_from_jwk(jwk)?),
            Self::Ps256 => Box::new(PS256.verifier_from_jwk(jwk)?),
            Self::Ps384 => Box::new(PS384.verifier_from_jwk(jwk)?),
            Self::Ps512 => Box::new(PS512.verifier_from_jwk(jwk)?),
            Self::Es256 => Box::new(ES256.verifier_from_jwk(jwk)?),
            Self::Es256K => Box::new(ES256K.verifier_from_jwk(jwk)?),
            Self::Es384 => Box::new(ES384.verifier_from_jwk(jwk)?),
            Self::Es512 => Box::new(ES512.verifier_from_jwk(jwk)?),
            Self::EdDsa => Box::new(EdDSA.verifier_from_jwk(jwk)?),
        })
    }
}

impl fmt::Display for VerificationAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
