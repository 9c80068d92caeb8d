//! AEROFREN API error types.
//!
//! Every admission stage and handler failure ends up as an `ApiError`, which
//! renders a structured JSON body. Messages returned to clients are generic;
//! store and authority details are logged server-side only.

use axum::{
    extract::rejection::JsonRejection,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Rate-limit response headers.
pub const RATE_LIMIT_REMAINING_HEADER: &str = "x-ratelimit-remaining";
pub const RATE_LIMIT_RESET_HEADER: &str = "x-ratelimit-reset";

/// AEROFREN API error type.
///
/// Maps to HTTP status codes:
/// - RateLimited: 429 Too Many Requests
/// - AuthenticationRequired, InvalidCredential: 401 Unauthorized
/// - Forbidden: 403 Forbidden
/// - NotFound: 404 Not Found
/// - ValidationFailed: 400 Bad Request
/// - ServiceUnavailable: 503 Service Unavailable
/// - Database, Internal: 500 Internal Server Error
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Rate limit exceeded, resets in {reset_in_ms}ms")]
    RateLimited { reset_in_ms: u64 },

    #[error("Authentication required")]
    AuthenticationRequired,

    #[error("Invalid credential: {0}")]
    InvalidCredential(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error")]
    Internal,
}

impl ApiError {
    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::AuthenticationRequired | ApiError::InvalidCredential(_) => {
                StatusCode::UNAUTHORIZED
            }
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::ValidationFailed(_) => StatusCode::BAD_REQUEST,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Database(_) | ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::RateLimited { .. } => "RATE_LIMITED",
            ApiError::AuthenticationRequired => "AUTHENTICATION_REQUIRED",
            ApiError::InvalidCredential(_) => "INVALID_CREDENTIAL",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::ValidationFailed(_) => "VALIDATION_FAILED",
            ApiError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            ApiError::Database(_) => "DATABASE_ERROR",
            ApiError::Internal => "INTERNAL_ERROR",
        }
    }
}

/// Seconds until the window resets, rounded up so clients never retry early.
pub fn reset_seconds(reset_in_ms: u64) -> u64 {
    reset_in_ms.div_ceil(1000)
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: &'static str,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();

        let message = match &self {
            ApiError::RateLimited { .. } => "Too many requests. Please try again later.".to_string(),
            ApiError::AuthenticationRequired => "A bearer credential is required".to_string(),
            ApiError::InvalidCredential(_) => "The access token is invalid or expired".to_string(),
            ApiError::Forbidden(reason)
            | ApiError::NotFound(reason)
            | ApiError::ValidationFailed(reason) => reason.clone(),
            ApiError::ServiceUnavailable(reason) => {
                tracing::warn!(target: "api.availability", reason = %reason, "Service unavailable");
                "Server configuration error".to_string()
            }
            ApiError::Database(err) => {
                tracing::error!(target: "api.database", error = %err, "Database operation failed");
                "An internal database error occurred".to_string()
            }
            ApiError::Internal => "An internal error occurred".to_string(),
        };

        let body = ErrorResponse {
            error: ErrorDetail { code, message },
        };
        let mut response = (status, Json(body)).into_response();
        let headers = response.headers_mut();

        match &self {
            ApiError::RateLimited { reset_in_ms } => {
                let reset = HeaderValue::from(reset_seconds(*reset_in_ms));
                headers.insert(RATE_LIMIT_REMAINING_HEADER, HeaderValue::from(0u32));
                headers.insert(RATE_LIMIT_RESET_HEADER, reset.clone());
                headers.insert(header::RETRY_AFTER, reset);
            }
            ApiError::AuthenticationRequired => {
                headers.insert(
                    header::WWW_AUTHENTICATE,
                    HeaderValue::from_static("Bearer realm=\"aerofren-api\""),
                );
            }
            ApiError::InvalidCredential(_) => {
                headers.insert(
                    header::WWW_AUTHENTICATE,
                    HeaderValue::from_static(
                        "Bearer realm=\"aerofren-api\", error=\"invalid_token\"",
                    ),
                );
            }
            _ => {}
        }

        response
    }
}

/// Convert sqlx errors to ApiError.
///
/// Connectivity failures mean the store is unavailable (503); anything else
/// is a query fault (500).
impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_) => ApiError::ServiceUnavailable(err.to_string()),
            other => ApiError::Database(other.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::ValidationFailed(rejection.body_text())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::body::Body;
    use http_body_util::BodyExt;

    async fn read_body_json(body: Body) -> serde_json::Value {
        let bytes = body.collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_display_messages() {
        assert_eq!(
            ApiError::RateLimited { reset_in_ms: 1500 }.to_string(),
            "Rate limit exceeded, resets in 1500ms"
        );
        assert_eq!(
            ApiError::InvalidCredential("expired".to_string()).to_string(),
            "Invalid credential: expired"
        );
        assert_eq!(ApiError::Internal.to_string(), "Internal server error");
    }

    #[test]
    fn test_reset_seconds_rounds_up() {
        assert_eq!(reset_seconds(0), 0);
        assert_eq!(reset_seconds(1), 1);
        assert_eq!(reset_seconds(1000), 1);
        assert_eq!(reset_seconds(1001), 2);
        assert_eq!(reset_seconds(60_000), 60);
    }

    #[tokio::test]
    async fn test_rate_limited_response_headers() {
        let response = ApiError::RateLimited { reset_in_ms: 42_500 }.into_response();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        let headers = response.headers();
        assert_eq!(headers.get(RATE_LIMIT_REMAINING_HEADER).unwrap(), "0");
        assert_eq!(headers.get(RATE_LIMIT_RESET_HEADER).unwrap(), "43");
        assert_eq!(headers.get(header::RETRY_AFTER).unwrap(), "43");

        let body = read_body_json(response.into_body()).await;
        assert_eq!(body["error"]["code"], "RATE_LIMITED");
    }

    #[tokio::test]
    async fn test_unauthorized_responses_share_status_but_not_code() {
        let missing = ApiError::AuthenticationRequired.into_response();
        let invalid = ApiError::InvalidCredential("bad signature".to_string()).into_response();

        assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(invalid.status(), StatusCode::UNAUTHORIZED);
        assert!(missing.headers().contains_key(header::WWW_AUTHENTICATE));
        assert!(invalid
            .headers()
            .get(header::WWW_AUTHENTICATE)
            .unwrap()
            .to_str()
            .unwrap()
            .contains("invalid_token"));

        let missing_body = read_body_json(missing.into_body()).await;
        let invalid_body = read_body_json(invalid.into_body()).await;
        assert_eq!(missing_body["error"]["code"], "AUTHENTICATION_REQUIRED");
        assert_eq!(invalid_body["error"]["code"], "INVALID_CREDENTIAL");
        // Verification detail never reaches the client.
        assert!(!invalid_body.to_string().contains("bad signature"));
    }

    #[tokio::test]
    async fn test_forbidden_response() {
        let response = ApiError::Forbidden("Admin privileges required".to_string()).into_response();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(!response.headers().contains_key(header::WWW_AUTHENTICATE));
        let body = read_body_json(response.into_body()).await;
        assert_eq!(body["error"]["message"], "Admin privileges required");
    }

    #[tokio::test]
    async fn test_service_unavailable_hides_reason() {
        let response =
            ApiError::ServiceUnavailable("connection refused to 10.0.0.5:5432".to_string())
                .into_response();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = read_body_json(response.into_body()).await;
        assert_eq!(body["error"]["code"], "SERVICE_UNAVAILABLE");
        assert_eq!(body["error"]["message"], "Server configuration error");
        assert!(!body.to_string().contains("10.0.0.5"));
    }

    #[tokio::test]
    async fn test_database_error_hides_details() {
        let response =
            ApiError::Database("relation \"documents\" does not exist".to_string()).into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = read_body_json(response.into_body()).await;
        assert_eq!(body["error"]["code"], "DATABASE_ERROR");
        assert!(!body.to_string().contains("documents"));
    }

    #[tokio::test]
    async fn test_validation_failed_response() {
        let response = ApiError::ValidationFailed("text must not be empty".to_string()).into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = read_body_json(response.into_body()).await;
        assert_eq!(body["error"]["code"], "VALIDATION_FAILED");
        assert_eq!(body["error"]["message"], "text must not be empty");
    }

    #[test]
    fn test_sqlx_pool_timeout_is_unavailable() {
        let err: ApiError = sqlx::Error::PoolTimedOut.into();
        assert!(matches!(err, ApiError::ServiceUnavailable(_)));

        let err: ApiError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, ApiError::Database(_)));
    }
}
