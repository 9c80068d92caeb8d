//! Health check handlers.
//!
//! - `/health`: Liveness probe, returns OK while the process runs
//! - `/ready`: Readiness probe, checks configured dependencies

use crate::models::ReadinessResponse;
use crate::routes::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use std::sync::Arc;

/// Liveness probe handler. Checks no dependencies.
pub async fn health_check() -> &'static str {
    "OK"
}

/// Readiness probe handler.
///
/// Ready when every configured dependency is usable. An unconfigured store
/// or authority does not block readiness (those routes answer 503), but a
/// configured store that fails its ping does.
#[tracing::instrument(skip_all, name = "api.handlers.health.readiness")]
pub async fn readiness_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let identity_authority = if state.config.auth_jwks_url.is_some() {
        "configured"
    } else {
        "unconfigured"
    };

    let store = match &state.store {
        None => "unconfigured",
        Some(store) => match store.ping().await {
            Ok(()) => "healthy",
            Err(e) => {
                tracing::warn!(target: "api.handlers.health", error = %e, "Readiness check failed: store unavailable");
                "unhealthy"
            }
        },
    };

    if store == "unhealthy" {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ReadinessResponse {
                status: "not_ready",
                store,
                identity_authority,
                error: Some("Service dependencies unavailable".to_string()),
            }),
        );
    }

    (
        StatusCode::OK,
        Json(ReadinessResponse {
            status: "ready",
            store,
            identity_authority,
            error: None,
        }),
    )
}
