//! Admission middleware.
//!
//! Derives the client identifier, runs the admission pipeline, and stores
//! the resulting [`Admission`] in request extensions for the handler. Every
//! admitted response carries `X-RateLimit-Remaining`, and error responses
//! from the handler are logged with the client identifier.

use crate::admission::{Access, Admission, AdmissionPipeline, EndpointClass};
use crate::errors::{ApiError, RATE_LIMIT_REMAINING_HEADER};
use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderValue},
    middleware::Next,
    response::Response,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::instrument;

const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

/// Per-route-group admission settings.
#[derive(Clone)]
pub struct AdmissionLayerState {
    pub pipeline: Arc<AdmissionPipeline>,
    pub class: EndpointClass,
    pub access: Access,
    /// Honour `X-Forwarded-For` (only behind a trusted proxy).
    pub trust_forwarded_for: bool,
}

impl AdmissionLayerState {
    pub fn new(
        pipeline: Arc<AdmissionPipeline>,
        class: EndpointClass,
        access: Access,
        trust_forwarded_for: bool,
    ) -> Arc<Self> {
        Arc::new(Self {
            pipeline,
            class,
            access,
            trust_forwarded_for,
        })
    }
}

/// Admission middleware for `route_layer`.
///
/// # Response
///
/// - 429 with rate-limit headers when the window is exhausted
/// - 401 with `WWW-Authenticate` for a missing or rejected credential
/// - 403 when an admin route is called without admin privilege
/// - 503 when the identity authority is unavailable
#[instrument(skip_all, name = "api.middleware.admission")]
pub async fn admit(
    State(state): State<Arc<AdmissionLayerState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let client_id = client_identifier(&req, state.trust_forwarded_for);
    let authorization = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);

    let admission: Admission = state
        .pipeline
        .admit(&client_id, state.class, state.access, authorization.as_deref())
        .await?;
    let remaining = admission.remaining;

    req.extensions_mut().insert(admission);

    let mut response = next.run(req).await;

    let status = response.status();
    if status.is_client_error() || status.is_server_error() {
        tracing::info!(
            target: "api.admission",
            stage = "handler",
            class = state.class.as_str(),
            client_id = %client_id,
            status = status.as_u16(),
            "Admitted request failed"
        );
    }

    response
        .headers_mut()
        .insert(RATE_LIMIT_REMAINING_HEADER, HeaderValue::from(remaining));

    Ok(response)
}

/// Identify the client for rate limiting.
///
/// The first `X-Forwarded-For` hop when trusted, otherwise the peer IP,
/// otherwise `"unknown"` (all such requests share one counter).
pub fn client_identifier<B>(req: &axum::http::Request<B>, trust_forwarded_for: bool) -> String {
    if trust_forwarded_for {
        let first_hop = req
            .headers()
            .get(FORWARDED_FOR_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(',').next())
            .map(str::trim)
            .filter(|hop| !hop.is_empty());

        if let Some(hop) = first_hop {
            return hop.to_string();
        }
    }

    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}
