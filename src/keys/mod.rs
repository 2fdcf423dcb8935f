//! Resolution of the identity provider's public signing keys.
//!
//! [`KeyCache`] keeps the most recent [`SigningKeySet`] in memory and decides when it has to be
//! fetched again:
//!
//!  1. Lazily, the first time any key is asked for.
//!  2. When the set has outlived its freshness window (the provider's caching hint, clamped to
//!     `[cooldown, max_age]`). A stale set is never used once its window has passed, even if the
//!     refetch fails.
//!  3. When a token names a key id the current set does not contain, to pick up provider key
//!     rotation. This happens at most once per `cooldown`, so a flood of tokens with made-up key
//!     ids cannot turn into a flood of fetches.
//!
//! Fetches are serialized. A caller that finds a fetch already in flight waits for it and reuses
//! its outcome instead of starting another one.

pub mod keyring;
pub mod source;


pub use keyring::{JwksDocument, SigningKeySet};
pub use source::{FetchedKeys, HttpKeySetSource, KeySetSource};

use crate::config::BridgeConfig;
use crate::error::{BridgeError, Result};
use anyhow::Error;
use josekit::jwk::Jwk;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Timing policy for [`KeyCache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshPolicy {
    /// Upper bound on one fetch.
    pub timeout: Duration,
    /// Longest time a fetched set is trusted without refetching.
    pub max_age: Duration,
    /// Minimum spacing between fetch attempts caused by unknown key ids or failed fetches.
    pub cooldown: Duration,
}

impl From<&BridgeConfig> for RefreshPolicy {
    fn from(config: &BridgeConfig) -> Self {
        Self {
            timeout: config.jwks_timeout,
            max_age: config.jwks_max_age,
            cooldown: config.jwks_cooldown,
        }
    }
}

impl RefreshPolicy {
    /// How long a newly fetched set stays fresh given the provider's caching hint.
    fn fresh_for(&self, hint: Option<Duration>) -> Duration {
        match hint {
            Some(hint) => hint.max(self.cooldown).min(self.max_age),
            None => self.max_age,
        }
    }
}

struct CacheState {
    keys: Option<Arc<SigningKeySet>>,
    /// Incremented every time a fetch attempt completes, successfully or not.
    generation: u64,
    last_attempt: Option<Instant>,
    last_failure: Option<String>,
}

impl CacheState {
    /// The outcome of the most recent fetch attempt.
    fn outcome(&self) -> Result<Arc<SigningKeySet>> {
        if let Some(reason) = &self.last_failure {
            return Err(BridgeError::KeySetUnavailable(reason.clone()));
        }

        self.keys
            .clone()
            .ok_or_else(|| BridgeError::KeySetUnavailable("no key set has been fetched".into()))
    }
}

/// Read-mostly cache of the provider's signing keys, shared by all concurrent verifications.
pub struct KeyCache {
    source: Arc<dyn KeySetSource>,
    policy: RefreshPolicy,
    state: RwLock<CacheState>,
    refresh_lock: Mutex<()>,
}

impl KeyCache {
    pub fn new(source: Arc<dyn KeySetSource>, policy: RefreshPolicy) -> Self {
        Self {
            source,
            policy,
            state: RwLock::new(CacheState {
                keys: None,
                generation: 0,
                last_attempt: None,
                last_failure: None,
            }),
            refresh_lock: Mutex::new(()),
        }
    }

    /// Create a cache backed by the configured JWKS URL.
    pub fn from_config(config: &BridgeConfig) -> std::result::Result<Self, Error> {
        let source = HttpKeySetSource::new(config.jwks_url.as_str(), config.jwks_timeout)?;

        Ok(Self::new(Arc::new(source), RefreshPolicy::from(config)))
    }

    pub fn policy(&self) -> RefreshPolicy {
        self.policy
    }

    /// The key set currently held, fresh or not.
    pub fn current(&self) -> Option<Arc<SigningKeySet>> {
        self.state.read().keys.clone()
    }

    /// Drop the cached set; the next resolution fetches again.
    pub fn invalidate(&self) {
        let mut state = self.state.write();
        state.keys = None;
        state.last_failure = None;
    }

    /// Fetch the key set ahead of the first request.
    pub async fn prefetch(&self) -> Result<Arc<SigningKeySet>> {
        let generation = { self.state.read().generation };
        self.refresh(generation).await
    }

    /// Find the public key with exactly `key_id`, fetching or refreshing the set as needed.
    ///
    /// Fails with [`BridgeError::UnknownKey`] when no such key exists even after the one refresh
    /// the policy allows, and with [`BridgeError::KeySetUnavailable`] when the set could not be
    /// fetched in time.
    pub async fn resolve(&self, key_id: &str) -> Result<Jwk> {
        let now = Instant::now();

        // copy out what we need and release the read lock before any await
        let (current, generation, last_attempt, last_failure) = {
            let state = self.state.read();
            (
                state.keys.clone(),
                state.generation,
                state.last_attempt,
                state.last_failure.clone(),
            )
        };

        let cooled_down = last_attempt
            .map(|at| now.saturating_duration_since(at) >= self.policy.cooldown)
            .unwrap_or(true);

        match current {
            Some(keys) if keys.is_fresh(now) => {
                if let Some(jwk) = keys.get(key_id) {
                    return Ok(jwk.clone());
                }

                if !cooled_down {
                    log::warn!(
                        "Key id {:?} is not in the provider key set and a refresh was attempted too recently.",
                        key_id
                    );
                    return Err(BridgeError::UnknownKey(key_id.to_string()));
                }

                log::info!(
                    "Key id {:?} is not in the provider key set, refreshing to pick up rotated keys.",
                    key_id
                );
            }
            Some(_) => {
                if let (Some(reason), false) = (last_failure, cooled_down) {
                    return Err(BridgeError::KeySetUnavailable(reason));
                }

                log::info!("Provider key set is stale, refreshing.");
            }
            None => {
                if let (Some(reason), false) = (last_failure, cooled_down) {
                    return Err(BridgeError::KeySetUnavailable(reason));
                }

                log::info!("Fetching provider key set for the first time.");
            }
        }

        let keys = self.refresh(generation).await?;

        keys.get(key_id)
            .cloned()
            .ok_or_else(|| BridgeError::UnknownKey(key_id.to_string()))
    }

    /// Fetch the key set unless another caller already completed a fetch since `observed`.
    async fn refresh(&self, observed: u64) -> Result<Arc<SigningKeySet>> {
        let _guard = self.refresh_lock.lock().await;

        {
            let state = self.state.read();

            if state.generation != observed {
                log::debug!("Reusing the outcome of a key set fetch that completed while waiting.");
                return state.outcome();
            }
        }

        let started = Instant::now();

        let outcome = match tokio::time::timeout(self.policy.timeout, self.source.fetch()).await {
            Ok(Ok(fetched)) => {
                let fresh_for = self.policy.fresh_for(fetched.max_age);
                let keys = SigningKeySet::from_document(fetched.document, Instant::now(), fresh_for);

                Ok(Arc::new(keys))
            }
            Ok(Err(e)) => Err(format!("{} could not be fetched: {}", self.source.description(), e)),
            Err(_) => Err(format!(
                "{} did not respond within {:?}",
                self.source.description(),
                self.policy.timeout
            )),
        };

        let mut state = self.state.write();
        state.generation += 1;
        state.last_attempt = Some(started);

        match outcome {
            Ok(keys) => {
                log::info!(
                    "Updated provider key set with {} signing keys, fresh for {:?}.",
                    keys.len(),
                    keys.stale_at().saturating_duration_since(keys.fetched_at())
                );

                state.keys = Some(keys.clone());
                state.last_failure = None;

                Ok(keys)
            }
            Err(reason) => {
                log::error!("Unable to update provider key set: {}", reason);

                state.last_failure = Some(reason.clone());

                Err(BridgeError::KeySetUnavailable(reason))
            }
        }
    }
}
