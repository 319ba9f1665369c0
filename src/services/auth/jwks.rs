//! Cached remote JWK set.
//!
//! Keys are fetched lazily on first use and kept for `ttl`. A token naming an
//! unknown `kid` forces a refresh, but never more often than
//! `min_refresh_interval`. Concurrent refreshes are coalesced behind a mutex; if
//! a refresh fails, stale keys keep serving.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use jsonwebtoken::{
    DecodingKey,
    jwk::{Jwk, JwkSet},
};
use tokio::sync::{Mutex, RwLock};
use url::Url;

use super::verifier::VerifyError;

struct Cached {
    keys: Arc<JwkSet>,
    fetched_at: Instant,
}

pub struct JwksCache {
    http: reqwest::Client,
    jwks_uri: Url,
    ttl: Duration,
    min_refresh_interval: Duration,
    state: RwLock<Option<Cached>>,
    refresh: Mutex<()>,
}

impl std::fmt::Debug for JwksCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwksCache")
            .field("jwks_uri", &self.jwks_uri.as_str())
            .field("ttl", &self.ttl)
            .field("min_refresh_interval", &self.min_refresh_interval)
            .finish()
    }
}

fn select<'a>(set: &'a JwkSet, kid: Option<&str>) -> Option<&'a Jwk> {
    match kid {
        Some(kid) => set.find(kid),
        // No kid in the header: only unambiguous with a single key
        None if set.keys.len() == 1 => set.keys.first(),
        None => None,
    }
}

fn decoding_key(jwk: &Jwk) -> Result<DecodingKey, VerifyError> {
    DecodingKey::from_jwk(jwk).map_err(|e| VerifyError::InvalidKey(e.to_string()))
}

impl JwksCache {
    pub fn new(
        http: reqwest::Client,
        jwks_uri: Url,
        ttl: Duration,
        min_refresh_interval: Duration,
    ) -> Self {
        Self {
            http,
            jwks_uri,
            ttl,
            min_refresh_interval,
            state: RwLock::new(None),
            refresh: Mutex::new(()),
        }
    }

    pub fn jwks_uri(&self) -> &Url {
        &self.jwks_uri
    }

    pub async fn key_for(&self, kid: Option<&str>) -> Result<DecodingKey, VerifyError> {
        let (current, fresh) = match self.state.read().await.as_ref() {
            Some(c) => (Some(Arc::clone(&c.keys)), c.fetched_at.elapsed() < self.ttl),
            None => (None, false),
        };

        if fresh
            && let Some(jwk) = current.as_deref().and_then(|set| select(set, kid))
        {
            return decoding_key(jwk);
        }

        let keys = match self.refresh().await {
            Ok(keys) => keys,
            Err(err) => match current {
                Some(stale) => {
                    tracing::warn!(error = %err, jwks_uri = %self.jwks_uri, "jwks refresh failed, using cached keys");
                    stale
                }
                None => return Err(err),
            },
        };

        let jwk = select(&keys, kid).ok_or_else(|| VerifyError::UnknownKey(kid.map(str::to_owned)))?;
        decoding_key(jwk)
    }

    async fn refresh(&self) -> Result<Arc<JwkSet>, VerifyError> {
        let _guard = self.refresh.lock().await;

        // Someone else may have refreshed while we waited for the lock.
        if let Some(cached) = self.state.read().await.as_ref()
            && cached.fetched_at.elapsed() < self.min_refresh_interval
        {
            return Ok(Arc::clone(&cached.keys));
        }

        let keys: JwkSet = self
            .http
            .get(self.jwks_uri.clone())
            .send()
            .await
            .and_then(|res| res.error_for_status())
            .map_err(|e| VerifyError::KeySet(e.to_string()))?
            .json()
            .await
            .map_err(|e| VerifyError::KeySet(e.to_string()))?;

        tracing::debug!(jwks_uri = %self.jwks_uri, keys = keys.keys.len(), "jwks refreshed");

        let keys = Arc::new(keys);
        *self.state.write().await = Some(Cached {
            keys: Arc::clone(&keys),
            fetched_at: Instant::now(),
        });

        Ok(keys)
    }
}
