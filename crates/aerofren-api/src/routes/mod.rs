//! HTTP routes for the AEROFREN API.
//!
//! Defines the Axum router and application state.

use crate::admission::{Access, AdmissionPipeline, EndpointClass};
use crate::auth::{AdminResolver, TokenVerifier};
use crate::config::Config;
use crate::errors::ApiError;
use crate::handlers;
use crate::middleware::{admit, http_metrics_middleware, AdmissionLayerState};
use crate::rate_limit::RateLimiter;
use crate::repositories::DocumentStore;
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Service configuration.
    pub config: Config,

    /// Document store; `None` when no database is configured.
    pub store: Option<Arc<dyn DocumentStore>>,

    /// Admission pipeline shared by every route group.
    pub pipeline: Arc<AdmissionPipeline>,
}

impl AppState {
    pub fn new(
        config: Config,
        store: Option<Arc<dyn DocumentStore>>,
        verifier: Arc<dyn TokenVerifier>,
        limiter: Arc<RateLimiter>,
    ) -> Self {
        let resolver = AdminResolver::new(&config.admin_emails);
        let pipeline = Arc::new(AdmissionPipeline::new(
            limiter,
            verifier,
            resolver,
            config.rate_limits,
        ));

        Self {
            config,
            store,
            pipeline,
        }
    }

    /// The configured document store.
    ///
    /// # Errors
    ///
    /// `ApiError::ServiceUnavailable` when no store is configured.
    pub fn store(&self) -> Result<&dyn DocumentStore, ApiError> {
        match &self.store {
            Some(store) => Ok(store.as_ref()),
            None => {
                tracing::error!(target: "api.routes", "Document store requested but DATABASE_URL is not set");
                Err(ApiError::ServiceUnavailable(
                    "Document store not configured".to_string(),
                ))
            }
        }
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        self.pipeline.limiter()
    }
}

/// Build the application routes.
///
/// Creates an Axum router with:
/// - `/health` - Liveness probe (simple "OK") - public, unversioned
/// - `/ready` - Readiness probe (checks the document store) - public
/// - `/metrics` - Prometheus metrics endpoint - public
/// - `/api/admin/*` - admin class, admin privilege required
/// - `/api/chat/*` - chat class, authentication required
/// - `/api/contact` - contact class, rate limited only
/// - TraceLayer for request logging
/// - HTTP metrics middleware
/// - 30 second request timeout
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let trust_forwarded_for = state.config.trust_forwarded_for;
    let layer_state = |class, access| {
        AdmissionLayerState::new(state.pipeline.clone(), class, access, trust_forwarded_for)
    };

    // Operational endpoints, never rate limited
    let operational_routes = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .with_state(state.clone());

    // Metrics route with its own state
    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    let admin_routes = Router::new()
        .route("/api/admin/conversations", get(handlers::list_conversations))
        .route("/api/admin/inquiries", get(handlers::list_inquiries))
        .route("/api/admin/check", get(handlers::admin_check))
        .route_layer(middleware::from_fn_with_state(
            layer_state(EndpointClass::Admin, Access::Admin),
            admit,
        ))
        .with_state(state.clone());

    let chat_routes = Router::new()
        .route("/api/chat/messages", post(handlers::post_message))
        .route(
            "/api/chat/conversations/:id/escalate",
            post(handlers::escalate_conversation),
        )
        .route(
            "/api/chat/conversations/:id/messages",
            get(handlers::list_messages),
        )
        .route_layer(middleware::from_fn_with_state(
            layer_state(EndpointClass::Chat, Access::Authenticated),
            admit,
        ))
        .with_state(state.clone());

    let contact_routes = Router::new()
        .route("/api/contact", post(handlers::submit_inquiry))
        .route_layer(middleware::from_fn_with_state(
            layer_state(EndpointClass::Contact, Access::Public),
            admit,
        ))
        .with_state(state.clone());

    // Layer order (bottom-to-top execution):
    // 1. TimeoutLayer - Timeout the request (innermost)
    // 2. TraceLayer - Log request details
    // 3. http_metrics_middleware - Record ALL responses (outermost)
    operational_routes
        .merge(metrics_routes)
        .merge(admin_routes)
        .merge(chat_routes)
        .merge(contact_routes)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(middleware::from_fn(http_metrics_middleware))
}
