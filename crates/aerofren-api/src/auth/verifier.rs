//! The token verification seam.
//!
//! The admission pipeline only knows `TokenVerifier`. Production wires in
//! [`JwtValidator`](super::JwtValidator); a deployment without an identity
//! authority gets [`UnconfiguredVerifier`], and tests substitute their own.

use crate::auth::claims::Claims;
use crate::auth::{JwksClient, JwtValidator};
use crate::config::Config;
use crate::errors::ApiError;
use async_trait::async_trait;
use std::sync::Arc;

/// Verifies a bearer credential against an identity authority.
///
/// Implementations never retry and never cache verification results.
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    /// # Errors
    ///
    /// - `ApiError::InvalidCredential` for malformed, expired, or badly
    ///   signed tokens.
    /// - `ApiError::ServiceUnavailable` when the authority is unreachable
    ///   or not configured.
    async fn verify(&self, token: &str) -> Result<Claims, ApiError>;
}

/// Verifier used when no identity authority is configured.
#[derive(Debug, Default)]
pub struct UnconfiguredVerifier;

#[async_trait]
impl TokenVerifier for UnconfiguredVerifier {
    async fn verify(&self, _token: &str) -> Result<Claims, ApiError> {
        Err(ApiError::ServiceUnavailable(
            "Identity authority is not configured".to_string(),
        ))
    }
}

/// Build the verifier described by `config`.
///
/// Without `AUTH_JWKS_URL` every authenticated route answers 503.
pub fn verifier_from_config(config: &Config) -> Arc<dyn TokenVerifier> {
    match &config.auth_jwks_url {
        Some(jwks_url) => Arc::new(JwtValidator::new(
            Arc::new(JwksClient::new(jwks_url.clone())),
            config.jwt_clock_skew_seconds,
            config.auth_issuer.as_deref(),
            config.auth_audience.as_deref(),
        )),
        None => {
            tracing::warn!(
                target: "api.auth",
                "AUTH_JWKS_URL not set, authenticated routes will be unavailable"
            );
            Arc::new(UnconfiguredVerifier)
        }
    }
}
