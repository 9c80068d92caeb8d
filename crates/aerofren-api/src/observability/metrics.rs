//! Metrics definitions for the AEROFREN API.
//!
//! All metrics follow Prometheus naming conventions:
//! - `api_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded:
//! - `method`: HTTP methods
//! - `endpoint`: parameterized paths, unknown paths fold into `/other`
//! - `stage`: admission stages (5 values)
//! - `operation`: store operations (page, get, upsert, ping)
//! - `status`: success, error, timeout

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize the Prometheus recorder and return the handle used by `/metrics`.
///
/// Must be called once, before any metric is recorded.
///
/// # Errors
///
/// Returns error if the recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Prefix("api_http_request".to_string()),
            &[
                0.005, 0.010, 0.025, 0.050, 0.100, 0.150, 0.200, 0.300, 0.500, 1.000, 2.000,
            ],
        )
        .map_err(|e| format!("Failed to set HTTP request buckets: {e}"))?
        .set_buckets_for_metric(
            Matcher::Prefix("api_store_query".to_string()),
            &[
                0.001, 0.002, 0.005, 0.010, 0.020, 0.050, 0.100, 0.250, 0.500, 1.000,
            ],
        )
        .map_err(|e| format!("Failed to set store query buckets: {e}"))?
        .set_buckets_for_metric(
            Matcher::Prefix("api_jwks_refresh".to_string()),
            &[0.010, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000],
        )
        .map_err(|e| format!("Failed to set JWKS refresh buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

// ============================================================================
// HTTP Request Metrics
// ============================================================================

/// Record HTTP request completion.
///
/// Metric: `api_http_requests_total`, `api_http_request_duration_seconds`
/// Labels: `method`, `endpoint`, `status`
pub fn record_http_request(method: &str, endpoint: &str, status_code: u16, duration: Duration) {
    let normalized_endpoint = normalize_endpoint(endpoint);
    let status = categorize_status_code(status_code);

    histogram!("api_http_request_duration_seconds",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint.clone(),
        "status" => status.to_string()
    )
    .record(duration.as_secs_f64());

    counter!("api_http_requests_total",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status_code" => status_code.to_string()
    )
    .increment(1);
}

fn categorize_status_code(status_code: u16) -> &'static str {
    match status_code {
        200..=299 => "success",
        408 | 504 => "timeout",
        _ => "error",
    }
}

/// Replace conversation ids with a placeholder; unknown paths become `/other`.
fn normalize_endpoint(path: &str) -> String {
    match path {
        "/health" | "/ready" | "/metrics" | "/api/admin/conversations"
        | "/api/admin/inquiries" | "/api/admin/check" | "/api/chat/messages"
        | "/api/contact" => path.to_string(),
        _ => normalize_dynamic_endpoint(path),
    }
}

fn normalize_dynamic_endpoint(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("/api/chat/conversations/") {
        let mut segments = rest.split('/');
        let id = segments.next().unwrap_or_default();
        let action = segments.next();
        if !id.is_empty() && segments.next().is_none() {
            match action {
                Some("messages") => return "/api/chat/conversations/{id}/messages".to_string(),
                Some("escalate") => return "/api/chat/conversations/{id}/escalate".to_string(),
                _ => {}
            }
        }
    }

    "/other".to_string()
}

// ============================================================================
// Admission Metrics
// ============================================================================

/// Record a request rejected by the admission pipeline.
///
/// Metric: `api_admission_rejections_total`
/// Labels: `stage`, `class`
pub fn record_admission_rejection(stage: &str, class: &str) {
    counter!("api_admission_rejections_total",
        "stage" => stage.to_string(),
        "class" => class.to_string()
    )
    .increment(1);
}

/// Set the number of identifiers tracked by the rate limiter.
///
/// Metric: `api_rate_limit_entries`
pub fn set_rate_limit_entries(count: usize) {
    #[allow(clippy::cast_precision_loss)]
    let value = count as f64;
    gauge!("api_rate_limit_entries").set(value);
}

// ============================================================================
// Identity Authority Metrics
// ============================================================================

/// Record a JWKS refresh against the identity authority.
///
/// Metric: `api_jwks_refresh_total`, `api_jwks_refresh_duration_seconds`
/// Labels: `status`
pub fn record_jwks_refresh(status: &str, duration: Duration) {
    histogram!("api_jwks_refresh_duration_seconds",
        "status" => status.to_string()
    )
    .record(duration.as_secs_f64());

    counter!("api_jwks_refresh_total",
        "status" => status.to_string()
    )
    .increment(1);
}

// ============================================================================
// Document Store Metrics
// ============================================================================

/// Record a document store operation.
///
/// Metric: `api_store_queries_total`, `api_store_query_duration_seconds`
/// Labels: `operation`, `status`
pub fn record_store_query(operation: &str, status: &str, duration: Duration) {
    histogram!("api_store_query_duration_seconds",
        "operation" => operation.to_string()
    )
    .record(duration.as_secs_f64());

    counter!("api_store_queries_total",
        "operation" => operation.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}
