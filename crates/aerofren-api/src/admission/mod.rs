//! Request admission.
//!
//! Every API request passes through [`AdmissionPipeline::admit`] before its
//! handler runs. Stages run in order and the first failure is terminal:
//!
//! ```text
//! rate limit -> credential extraction -> verification -> authorization
//! ```
//!
//! Public routes stop after the rate limit. Authenticated routes stop after
//! verification. Admin routes also require admin privilege. Each stage runs
//! at most once per request and nothing is retried.

use crate::auth::{AdminResolver, Claims, TokenVerifier};
use crate::errors::ApiError;
use crate::observability::metrics::record_admission_rejection;
use crate::rate_limit::{RateLimitConfig, RateLimiter};
use common::jwt::extract_bearer;
use std::fmt;
use std::sync::Arc;
use tracing::instrument;

/// Rate-limit class of an endpoint. Classes never share counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndpointClass {
    Admin,
    Chat,
    Contact,
}

impl EndpointClass {
    pub fn as_str(self) -> &'static str {
        match self {
            EndpointClass::Admin => "admin",
            EndpointClass::Chat => "chat",
            EndpointClass::Contact => "contact",
        }
    }
}

impl fmt::Display for EndpointClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a route requires of the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Public,
    Authenticated,
    Admin,
}

/// Pipeline stage at which a request was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionStage {
    RateLimit,
    Credential,
    Verification,
    Authorization,
}

impl AdmissionStage {
    pub fn as_str(self) -> &'static str {
        match self {
            AdmissionStage::RateLimit => "rate_limit",
            AdmissionStage::Credential => "credential",
            AdmissionStage::Verification => "verification",
            AdmissionStage::Authorization => "authorization",
        }
    }
}

/// One `RateLimitConfig` per endpoint class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub admin: RateLimitConfig,
    pub chat: RateLimitConfig,
    pub contact: RateLimitConfig,
}

impl RateLimitPolicy {
    pub fn for_class(&self, class: EndpointClass) -> &RateLimitConfig {
        match class {
            EndpointClass::Admin => &self.admin,
            EndpointClass::Chat => &self.chat,
            EndpointClass::Contact => &self.contact,
        }
    }
}

/// Result of a successful admission, handed to the handler.
#[derive(Debug, Clone)]
pub struct Admission {
    pub client_id: String,
    pub class: EndpointClass,
    /// Verified claims; `None` on public routes.
    pub claims: Option<Claims>,
    pub is_admin: bool,
    /// Requests left in the caller's current window.
    pub remaining: u32,
}

impl Admission {
    /// Verified claims of an authenticated route.
    ///
    /// # Errors
    ///
    /// `ApiError::Internal` if the route was mounted as public.
    pub fn claims(&self) -> Result<&Claims, ApiError> {
        self.claims.as_ref().ok_or_else(|| {
            tracing::error!(target: "api.admission", class = %self.class, "Claims requested on a public route");
            ApiError::Internal
        })
    }
}

/// Orchestrates rate limiting, verification and authorization.
pub struct AdmissionPipeline {
    limiter: Arc<RateLimiter>,
    verifier: Arc<dyn TokenVerifier>,
    resolver: AdminResolver,
    policy: RateLimitPolicy,
}

impl AdmissionPipeline {
    pub fn new(
        limiter: Arc<RateLimiter>,
        verifier: Arc<dyn TokenVerifier>,
        resolver: AdminResolver,
        policy: RateLimitPolicy,
    ) -> Self {
        Self {
            limiter,
            verifier,
            resolver,
            policy,
        }
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    pub fn policy(&self) -> &RateLimitPolicy {
        &self.policy
    }

    /// Admit a request or reject it at the first failing stage.
    ///
    /// `authorization` is the raw `Authorization` header value, if any.
    #[instrument(skip_all, name = "api.admission.admit", fields(class = %class))]
    pub async fn admit(
        &self,
        client_id: &str,
        class: EndpointClass,
        access: Access,
        authorization: Option<&str>,
    ) -> Result<Admission, ApiError> {
        let key = format!("{}:{}", class.as_str(), client_id);
        let decision = self.limiter.check(&key, self.policy.for_class(class));
        if !decision.allowed {
            reject(AdmissionStage::RateLimit, class, client_id);
            return Err(ApiError::RateLimited {
                reset_in_ms: decision.reset_in_ms,
            });
        }

        let mut admission = Admission {
            client_id: client_id.to_string(),
            class,
            claims: None,
            is_admin: false,
            remaining: decision.remaining,
        };

        if access == Access::Public {
            return Ok(admission);
        }

        let Some(token) = extract_bearer(authorization) else {
            reject(AdmissionStage::Credential, class, client_id);
            return Err(ApiError::AuthenticationRequired);
        };

        let claims = match self.verifier.verify(token).await {
            Ok(claims) => claims,
            Err(err) => {
                reject(AdmissionStage::Verification, class, client_id);
                return Err(match err {
                    ApiError::ServiceUnavailable(_) => err,
                    other => ApiError::InvalidCredential(other.to_string()),
                });
            }
        };

        let is_admin = self.resolver.is_admin(&claims);
        if access == Access::Admin && !is_admin {
            reject(AdmissionStage::Authorization, class, client_id);
            return Err(ApiError::Forbidden("Admin privileges required".to_string()));
        }

        admission.claims = Some(claims);
        admission.is_admin = is_admin;
        Ok(admission)
    }
}

fn reject(stage: AdmissionStage, class: EndpointClass, client_id: &str) {
    tracing::info!(
        target: "api.admission",
        stage = stage.as_str(),
        class = class.as_str(),
        client_id = %client_id,
        "Request rejected"
    );
    record_admission_rejection(stage.as_str(), class.as_str());
}
