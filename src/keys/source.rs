use crate::keys::keyring::JwksDocument;
use anyhow::{anyhow, Error};
use async_trait::async_trait;
use isahc::config::Configurable;
use isahc::http::HeaderMap;
use isahc::{AsyncReadResponseExt, HttpClient};
use lazy_static::lazy_static;
use regex::Regex;
use std::time::Duration;
use time::format_description::FormatItem;
use time::macros::format_description;
use time::OffsetDateTime;

lazy_static! {
    /// Regular expression for replacing `UTC` or `GMT` at the end of a datetime string with the
    /// equivalent hour/minute timezone offset, i.e. `00:00`.
    pub(crate) static ref REGEX_GMT_TRANSPOSER: Regex = Regex::new(r"\b(?:GMT|UTC)\s*$").unwrap();

    /// Extracts the `max-age` directive from a `Cache-Control` header.
    pub(crate) static ref REGEX_MAX_AGE: Regex = Regex::new(r"(?i)\bmax-age\s*=\s*(\d+)").unwrap();
}

/// The time format for parsing a `time::OffsetDateTime` from the `Expires` header after
/// transposition.
///
/// Transposition replaces `/GMT$/` with `00:00` to make parsing possible, as timezone names are not
/// supported by the `time` crate.
pub(crate) static EXPIRES_TIME_FORMAT: &'static [FormatItem<'static>] = format_description!(
    "[weekday repr:short], [day padding:zero] [month repr:short] [year repr:full] \
        [hour repr:24 padding:zero]:[minute padding:zero]:[second padding:zero] \
        [offset_hour padding:zero]:[offset_minute padding:zero]"
);

/// A freshly retrieved key set document plus the provider's caching hint, if it gave one.
#[derive(Debug)]
pub struct FetchedKeys {
    pub document: JwksDocument,
    /// How long the provider says the document may be cached.
    pub max_age: Option<Duration>,
}

/// Somewhere the provider's current signing keys can be retrieved from.
#[async_trait]
pub trait KeySetSource: Send + Sync {
    async fn fetch(&self) -> Result<FetchedKeys, Error>;

    /// Get a description of this source (for logging)
    fn description(&self) -> &str {
        "key set source"
    }
}

/// Fetches a JWKS document over HTTPS.
pub struct HttpKeySetSource {
    url: String,
    client: HttpClient,
}

impl HttpKeySetSource {
    /// Create a source for `url` whose requests are abandoned after `timeout`.
    pub fn new<S: Into<String>>(url: S, timeout: Duration) -> Result<Self, Error> {
        let client = HttpClient::builder()
            .timeout(timeout)
            .default_header("accept", "application/json")
            .build()?;

        Ok(Self {
            url: url.into(),
            client,
        })
    }
}

#[async_trait]
impl KeySetSource for HttpKeySetSource {
    async fn fetch(&self) -> Result<FetchedKeys, Error> {
        let mut resp = self.client.get_async(self.url.as_str()).await.map_err(|e| {
            log::error!("Unable to get provider key set from {}: {}", self.url, e);
            e
        })?;

        if !resp.status().is_success() {
            return Err(anyhow!(
                "Provider key set endpoint {} responded with status {}",
                self.url,
                resp.status()
            ));
        }

        let max_age = cache_lifetime(resp.headers(), OffsetDateTime::now_utc());

        let document: JwksDocument = resp.json().await.map_err(|e| {
            log::error!("Unable to deserialize key set from JSON response: {}", e);
            Into::<Error>::into(e)
        })?;

        Ok(FetchedKeys { document, max_age })
    }

    fn description(&self) -> &str {
        self.url.as_str()
    }
}

/// Determine how long a response may be cached from its `Cache-Control` or `Expires` header.
///
/// `Cache-Control: max-age` wins when both are present, matching HTTP caching semantics.
pub(crate) fn cache_lifetime(headers: &HeaderMap, now: OffsetDateTime) -> Option<Duration> {
    let from_cache_control = headers
        .get("cache-control")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| REGEX_MAX_AGE.captures(s))
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<u64>().ok())
        .map(Duration::from_secs);

    if from_cache_control.is_some() {
        return from_cache_control;
    }

    headers
        .get("expires")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| parse_expires(s))
        .map(|expiry| (expiry - now).try_into().unwrap_or(Duration::ZERO))
}

/// Parse an RFC 7231 `Expires` header value such as `Thu, 06 Jan 2022 02:53:35 GMT`.
pub(crate) fn parse_expires(value: &str) -> Option<OffsetDateTime> {
    let transposed = REGEX_GMT_TRANSPOSER.replace(value.trim(), "00:00");

    OffsetDateTime::parse(transposed.as_ref(), EXPIRES_TIME_FORMAT)
        .map_err(|e| {
            log::debug!("Unable to parse datetime from expires header: {}", e);
            e
        })
        .ok()
}
