//! Identity token validation.
//!
//! Validates bearer tokens using public keys from the identity authority's
//! JWKS endpoint.
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - Only EdDSA (Ed25519) is accepted
//! - `exp` is always validated; `iss` and `aud` when configured
//! - `iat` is validated with clock skew tolerance
//! - All rejections share one generic message

use crate::auth::claims::Claims;
use crate::auth::jwks::{Jwk, JwksClient};
use crate::auth::verifier::TokenVerifier;
use crate::errors::ApiError;
use async_trait::async_trait;
use common::jwt::{decode_ed25519_public_key_jwk, extract_kid, validate_iat};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

const INVALID_TOKEN: &str = "The access token is invalid or expired";

/// JWT validator backed by a [`JwksClient`].
pub struct JwtValidator {
    jwks_client: Arc<JwksClient>,
    clock_skew: Duration,
    validation: Validation,
}

impl JwtValidator {
    /// Create a validator.
    ///
    /// `issuer` and `audience`, when set, must match the token's `iss` and
    /// `aud` claims exactly.
    pub fn new(
        jwks_client: Arc<JwksClient>,
        clock_skew_seconds: i64,
        issuer: Option<&str>,
        audience: Option<&str>,
    ) -> Self {
        let mut validation = Validation::new(Algorithm::EdDSA);
        validation.validate_exp = true;
        validation.set_required_spec_claims(&["exp", "sub"]);

        if let Some(issuer) = issuer {
            validation.set_issuer(&[issuer]);
        }
        match audience {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }

        Self {
            jwks_client,
            clock_skew: Duration::from_secs(clock_skew_seconds.unsigned_abs()),
            validation,
        }
    }

    /// Validate a JWT and return its claims.
    ///
    /// 1. Extract `kid` (includes the size check)
    /// 2. Fetch the public key from the JWKS cache
    /// 3. Verify the EdDSA signature and registered claims
    /// 4. Validate `iat` with clock skew tolerance
    #[instrument(skip_all, name = "api.auth.jwt.validate")]
    pub async fn validate(&self, token: &str) -> Result<Claims, ApiError> {
        let kid = extract_kid(token).map_err(|e| {
            tracing::debug!(target: "api.auth.jwt", error = ?e, "Token kid extraction failed");
            ApiError::InvalidCredential(INVALID_TOKEN.to_string())
        })?;

        let jwk = self.jwks_client.get_key(&kid).await?;
        let claims = verify_token(token, &jwk, &self.validation)?;

        if let Err(e) = validate_iat(claims.iat, self.clock_skew) {
            tracing::debug!(target: "api.auth.jwt", error = ?e, "Token iat validation failed");
            return Err(ApiError::InvalidCredential(INVALID_TOKEN.to_string()));
        }

        tracing::debug!(target: "api.auth.jwt", "Token validated successfully");
        Ok(claims)
    }
}

#[async_trait]
impl TokenVerifier for JwtValidator {
    async fn verify(&self, token: &str) -> Result<Claims, ApiError> {
        self.validate(token).await
    }
}

/// Verify the signature against `jwk` and decode the claims.
fn verify_token(token: &str, jwk: &Jwk, validation: &Validation) -> Result<Claims, ApiError> {
    if jwk.kty != "OKP" {
        tracing::warn!(target: "api.auth.jwt", kty = %jwk.kty, "Unexpected JWK key type");
        return Err(ApiError::InvalidCredential(INVALID_TOKEN.to_string()));
    }

    if let Some(alg) = &jwk.alg {
        if alg != "EdDSA" {
            tracing::warn!(target: "api.auth.jwt", alg = %alg, "Unexpected JWK algorithm");
            return Err(ApiError::InvalidCredential(INVALID_TOKEN.to_string()));
        }
    }

    let public_key_b64 = jwk.x.as_ref().ok_or_else(|| {
        tracing::error!(target: "api.auth.jwt", kid = %jwk.kid, "JWK missing x field");
        ApiError::InvalidCredential(INVALID_TOKEN.to_string())
    })?;

    let public_key_bytes = decode_ed25519_public_key_jwk(public_key_b64).map_err(|e| {
        tracing::error!(target: "api.auth.jwt", error = %e, "Invalid public key encoding");
        ApiError::InvalidCredential(INVALID_TOKEN.to_string())
    })?;

    let decoding_key = DecodingKey::from_ed_der(&public_key_bytes);

    let token_data = decode::<Claims>(token, &decoding_key, validation).map_err(|e| {
        tracing::debug!(target: "api.auth.jwt", error = %e, "Token verification failed");
        ApiError::InvalidCredential(INVALID_TOKEN.to_string())
    })?;

    Ok(token_data.claims)
}
