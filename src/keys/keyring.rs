use anyhow::Error;
use josekit::jwk::Jwk;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

/// A JWKS document as published at the provider's well-known location.
///
/// Keys stay as raw JSON objects here so that one malformed entry does not reject the whole set.
#[derive(Debug, Deserialize)]
pub struct JwksDocument {
    pub keys: Vec<Map<String, Value>>,
}

impl JwksDocument {
    pub fn from_slice(bytes: &[u8]) -> Result<Self, Error> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// The provider's public signing keys, indexed by key id, as of one fetch.
#[derive(Debug, Clone)]
pub struct SigningKeySet {
    keys: HashMap<String, Jwk>,
    fetched_at: Instant,
    fresh_for: Duration,
}

impl SigningKeySet {
    pub fn new(fetched_at: Instant, fresh_for: Duration) -> Self {
        Self {
            keys: HashMap::new(),
            fetched_at,
            fresh_for,
        }
    }

    /// Index every usable signing key in the document.
    ///
    /// Keys without a `kid` can never be selected and are dropped, as are keys published for
    /// encryption (`use` other than `sig`) and entries josekit refuses to parse.
    pub fn from_document(document: JwksDocument, fetched_at: Instant, fresh_for: Duration) -> Self {
        let mut result = Self::new(fetched_at, fresh_for);

        for map in document.keys.into_iter() {
            let jwk = match Jwk::from_map(map) {
                Ok(jwk) => jwk,
                Err(e) => {
                    log::warn!("Skipping unparseable key in provider key set: {}", e);
                    continue;
                }
            };

            if let Some(key_use) = jwk.key_use() {
                if key_use != "sig" {
                    log::debug!("Skipping provider key with use {:?}.", key_use);
                    continue;
                }
            }

            match jwk.key_id().map(|s| s.to_string()) {
                Some(key_id) => result.insert(key_id, jwk),
                None => log::warn!("Skipping provider key without a key id."),
            }
        }

        result
    }

    pub fn insert<S: Into<String>>(&mut self, key_id: S, key: Jwk) {
        let key_id = key_id.into();

        let key = {
            let mut value = key;
            value.set_key_id(key_id.as_str());
            value
        };

        self.keys.insert(key_id, key);
    }

    /// Exact key-id lookup, with no fallback to another key.
    pub fn get(&self, key_id: &str) -> Option<&Jwk> {
        self.keys.get(key_id)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn key_ids(&self) -> impl Iterator<Item = &str> {
        self.keys.keys().map(|s| s.as_str())
    }

    pub fn fetched_at(&self) -> Instant {
        self.fetched_at
    }

    /// The instant after which this set must be refetched before it is trusted again.
    pub fn stale_at(&self) -> Instant {
        self.fetched_at + self.fresh_for
    }

    pub fn is_fresh(&self, now: Instant) -> bool {
        now < self.stale_at()
    }
}
