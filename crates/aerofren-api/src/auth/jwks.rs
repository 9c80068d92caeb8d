//! JWKS client for the identity authority's public keys.
//!
//! Keys are fetched from the authority's JWKS endpoint and cached with a TTL.
//! A token signed with a `kid` the cache does not know triggers a refresh,
//! at most once per `min_refresh_interval`, so key rotation is picked up
//! without letting forged `kid` values hammer the authority.
//!
//! Only keys are cached. Every token is verified on every request.

use crate::errors::ApiError;
use crate::observability::metrics::record_jwks_refresh;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::instrument;

/// Default cache TTL in seconds (5 minutes).
const DEFAULT_CACHE_TTL_SECONDS: u64 = 300;

/// Minimum spacing between unknown-`kid` refreshes.
const DEFAULT_MIN_REFRESH_INTERVAL_SECONDS: u64 = 30;

/// JSON Web Key from the JWKS endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct Jwk {
    /// Key type ("OKP" for Ed25519).
    pub kty: String,

    /// Key ID, matched against the token header.
    pub kid: String,

    #[serde(default)]
    pub crv: Option<String>,

    /// Public key value (base64url encoded).
    #[serde(default)]
    pub x: Option<String>,

    #[serde(default)]
    pub alg: Option<String>,

    #[serde(default, rename = "use")]
    pub key_use: Option<String>,
}

/// JWKS document.
#[derive(Debug, Clone, Deserialize)]
pub struct JwksResponse {
    pub keys: Vec<Jwk>,
}

struct CachedJwks {
    keys: HashMap<String, Jwk>,
    fetched_at: Instant,
    expires_at: Instant,
}

/// Caching JWKS client.
pub struct JwksClient {
    jwks_url: String,
    http_client: reqwest::Client,
    cache: Arc<RwLock<Option<CachedJwks>>>,
    cache_ttl: Duration,
    min_refresh_interval: Duration,
}

impl JwksClient {
    pub fn new(jwks_url: String) -> Self {
        Self::with_ttl(jwks_url, Duration::from_secs(DEFAULT_CACHE_TTL_SECONDS))
    }

    /// Create a JWKS client with a custom cache TTL.
    pub fn with_ttl(jwks_url: String, cache_ttl: Duration) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(target: "api.auth.jwks", error = %e, "Failed to build HTTP client with custom config, using defaults");
                reqwest::Client::new()
            });

        Self {
            jwks_url,
            http_client,
            cache: Arc::new(RwLock::new(None)),
            cache_ttl,
            min_refresh_interval: Duration::from_secs(DEFAULT_MIN_REFRESH_INTERVAL_SECONDS)
                .min(cache_ttl),
        }
    }

    /// Override the minimum spacing between unknown-`kid` refreshes.
    #[must_use]
    pub fn with_min_refresh_interval(mut self, interval: Duration) -> Self {
        self.min_refresh_interval = interval;
        self
    }

    /// Get a JWK by key ID.
    ///
    /// # Errors
    ///
    /// - `ApiError::ServiceUnavailable` if the JWKS cannot be fetched.
    /// - `ApiError::InvalidCredential` if the key ID is unknown after refresh.
    #[instrument(skip_all, name = "api.auth.jwks.get_key")]
    pub async fn get_key(&self, kid: &str) -> Result<Jwk, ApiError> {
        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.as_ref() {
                let now = Instant::now();
                if cached.expires_at > now {
                    if let Some(key) = cached.keys.get(kid) {
                        tracing::debug!(target: "api.auth.jwks", kid = %kid, "JWKS cache hit");
                        return Ok(key.clone());
                    }
                    if now.duration_since(cached.fetched_at) < self.min_refresh_interval {
                        tracing::debug!(target: "api.auth.jwks", kid = %kid, "Key not found in fresh JWKS cache");
                        return Err(unknown_key());
                    }
                }
            }
        }

        self.refresh_cache().await?;

        let cache = self.cache.read().await;
        if let Some(key) = cache.as_ref().and_then(|cached| cached.keys.get(kid)) {
            return Ok(key.clone());
        }

        tracing::warn!(target: "api.auth.jwks", kid = %kid, "Key not found in JWKS after refresh");
        Err(unknown_key())
    }

    #[instrument(skip_all, name = "api.auth.jwks.refresh")]
    async fn refresh_cache(&self) -> Result<(), ApiError> {
        let start = Instant::now();
        let result = self.fetch_keys().await;
        record_jwks_refresh(
            if result.is_ok() { "success" } else { "error" },
            start.elapsed(),
        );
        let keys = result?;

        tracing::info!(
            target: "api.auth.jwks",
            key_count = keys.len(),
            "JWKS cache refreshed"
        );

        let now = Instant::now();
        let mut cache = self.cache.write().await;
        *cache = Some(CachedJwks {
            keys,
            fetched_at: now,
            expires_at: now + self.cache_ttl,
        });

        Ok(())
    }

    async fn fetch_keys(&self) -> Result<HashMap<String, Jwk>, ApiError> {
        tracing::debug!(target: "api.auth.jwks", url = %self.jwks_url, "Fetching JWKS");

        let response = self
            .http_client
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(target: "api.auth.jwks", error = %e, "Failed to fetch JWKS");
                authority_unavailable()
            })?;

        if !response.status().is_success() {
            tracing::error!(
                target: "api.auth.jwks",
                status = %response.status(),
                "JWKS endpoint returned error"
            );
            return Err(authority_unavailable());
        }

        let jwks: JwksResponse = response.json().await.map_err(|e| {
            tracing::error!(target: "api.auth.jwks", error = %e, "Failed to parse JWKS response");
            authority_unavailable()
        })?;

        Ok(jwks
            .keys
            .into_iter()
            .map(|key| (key.kid.clone(), key))
            .collect())
    }

    /// Drop cached keys so the next lookup refetches.
    pub async fn invalidate(&self) {
        let mut cache = self.cache.write().await;
        *cache = None;
    }
}

fn unknown_key() -> ApiError {
    ApiError::InvalidCredential("The access token is invalid or expired".to_string())
}

fn authority_unavailable() -> ApiError {
    ApiError::ServiceUnavailable("Identity authority unavailable".to_string())
}
