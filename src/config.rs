use anyhow::{anyhow, Error};
use rocket::http::uri::{Absolute, Uri};
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Issuer of Authgarten ID tokens.
pub const DEFAULT_ISSUER: &'static str = "https://creatorsgarten.org";

/// Authgarten client ID the inbound tokens must be addressed to.
pub const DEFAULT_AUDIENCE: &'static str =
    "https://github.com/showdownspace/codeinthewind-editor-shell";

/// Where Authgarten publishes its current signing keys.
pub const DEFAULT_JWKS_URL: &'static str = "https://creatorsgarten.org/.well-known/jwks";

/// Audience Firebase expects on custom tokens.
pub const DEFAULT_DOWNSTREAM_AUDIENCE: &'static str =
    "https://identitytoolkit.googleapis.com/google.identity.identitytoolkit.v1.IdentityToolkit";

pub const DEFAULT_SUBJECT_PREFIX: &'static str = "authgarten";

const DEFAULT_JWKS_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_JWKS_MAX_AGE: Duration = Duration::from_secs(600);
const DEFAULT_JWKS_COOLDOWN: Duration = Duration::from_secs(30);

const ISSUER_VAR: &'static str = "BRIDGE_ISSUER";
const AUDIENCE_VAR: &'static str = "BRIDGE_AUDIENCE";
const JWKS_URL_VAR: &'static str = "BRIDGE_JWKS_URL";
const DOWNSTREAM_AUDIENCE_VAR: &'static str = "BRIDGE_DOWNSTREAM_AUDIENCE";
const SUBJECT_PREFIX_VAR: &'static str = "BRIDGE_SUBJECT_PREFIX";
const JWKS_TIMEOUT_VAR: &'static str = "BRIDGE_JWKS_TIMEOUT_SECS";
const JWKS_MAX_AGE_VAR: &'static str = "BRIDGE_JWKS_MAX_AGE_SECS";
const JWKS_COOLDOWN_VAR: &'static str = "BRIDGE_JWKS_COOLDOWN_SECS";
const CLOCK_SKEW_VAR: &'static str = "BRIDGE_CLOCK_SKEW_SECS";

/// Immutable bridge configuration, loaded once at startup and passed down explicitly.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Exact `iss` value inbound tokens must carry.
    pub issuer: String,
    /// Value the inbound token's `aud` must contain.
    pub audience: String,
    pub jwks_url: String,
    /// `aud` placed on minted tokens.
    pub downstream_audience: String,
    /// Prefix of the derived outbound user id, joined to the inbound subject with `-`.
    pub subject_prefix: String,
    /// Upper bound on a single key set fetch.
    pub jwks_timeout: Duration,
    /// A key set older than this is refetched before it is trusted again.
    pub jwks_max_age: Duration,
    /// Minimum spacing between fetch attempts triggered by unknown key ids or failures.
    pub jwks_cooldown: Duration,
    /// Tolerance applied to `exp` and `nbf` checks.
    pub clock_skew: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            issuer: DEFAULT_ISSUER.to_string(),
            audience: DEFAULT_AUDIENCE.to_string(),
            jwks_url: DEFAULT_JWKS_URL.to_string(),
            downstream_audience: DEFAULT_DOWNSTREAM_AUDIENCE.to_string(),
            subject_prefix: DEFAULT_SUBJECT_PREFIX.to_string(),
            jwks_timeout: DEFAULT_JWKS_TIMEOUT,
            jwks_max_age: DEFAULT_JWKS_MAX_AGE,
            jwks_cooldown: DEFAULT_JWKS_COOLDOWN,
            clock_skew: Duration::ZERO,
        }
    }
}

impl BridgeConfig {
    /// Create a configuration from environment variables, falling back to the Authgarten and
    /// Firebase defaults for anything unset.
    pub fn from_env() -> Result<Self, Error> {
        let defaults = Self::default();

        let config = Self {
            issuer: string_var(ISSUER_VAR)?.unwrap_or(defaults.issuer),
            audience: string_var(AUDIENCE_VAR)?.unwrap_or(defaults.audience),
            jwks_url: string_var(JWKS_URL_VAR)?.unwrap_or(defaults.jwks_url),
            downstream_audience: string_var(DOWNSTREAM_AUDIENCE_VAR)?
                .unwrap_or(defaults.downstream_audience),
            subject_prefix: string_var(SUBJECT_PREFIX_VAR)?.unwrap_or(defaults.subject_prefix),
            jwks_timeout: seconds_var(JWKS_TIMEOUT_VAR)?.unwrap_or(defaults.jwks_timeout),
            jwks_max_age: seconds_var(JWKS_MAX_AGE_VAR)?.unwrap_or(defaults.jwks_max_age),
            jwks_cooldown: seconds_var(JWKS_COOLDOWN_VAR)?.unwrap_or(defaults.jwks_cooldown),
            clock_skew: seconds_var(CLOCK_SKEW_VAR)?.unwrap_or(defaults.clock_skew),
        };

        config.validate()?;

        Ok(config)
    }

    /// Create a configuration by providing the trust-domain identifiers directly, with default
    /// cache and timing policy.
    pub fn new<S: Into<String>>(issuer: S, audience: S, jwks_url: S) -> Result<Self, Error> {
        let config = Self {
            issuer: issuer.into().trim().to_string(),
            audience: audience.into().trim().to_string(),
            jwks_url: jwks_url.into().trim().to_string(),
            ..Self::default()
        };

        config.validate()?;

        Ok(config)
    }

    /// Check the invariants the verifier and key cache rely on.
    pub fn validate(&self) -> Result<(), Error> {
        for (name, value) in [
            ("issuer", &self.issuer),
            ("audience", &self.audience),
            ("downstream audience", &self.downstream_audience),
            ("subject prefix", &self.subject_prefix),
        ] {
            if value.is_empty() {
                return Err(anyhow!("The {} must not be empty", name));
            }
        }

        if let Err(e) = Uri::parse::<Absolute>(self.jwks_url.as_ref()) {
            return Err(anyhow!(
                "Unable to parse the JWKS URL as an absolute URI, please pass a legitimate key set location: {}",
                e
            ));
        }

        if self.jwks_timeout.is_zero() {
            return Err(anyhow!("The JWKS fetch timeout must be greater than zero"));
        }

        if self.jwks_max_age < self.jwks_cooldown {
            return Err(anyhow!(
                "The JWKS max age ({:?}) must not be shorter than the refresh cooldown ({:?})",
                self.jwks_max_age,
                self.jwks_cooldown
            ));
        }

        Ok(())
    }
}

fn string_var(name: &str) -> Result<Option<String>, Error> {
    match env::var(name) {
        Ok(value) => {
            // strip whitespace around the value
            let value = value.trim().to_string();

            if value.is_empty() {
                return Err(anyhow!(
                    "The {} environment variable is set but empty, unset it to use the default",
                    name
                ));
            }

            Ok(Some(value))
        }
        Err(env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(anyhow!("Unable to read the {} environment variable: {}", name, e)),
    }
}

fn seconds_var(name: &str) -> Result<Option<Duration>, Error> {
    string_var(name)?
        .map(|s| {
            u64::from_str(&s)
                .map(Duration::from_secs)
                .map_err(|e| anyhow!("The {} environment variable must be a whole number of seconds: {}", name, e))
        })
        .transpose()
}
