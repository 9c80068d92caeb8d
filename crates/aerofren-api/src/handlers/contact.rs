//! Public contact form.

use crate::admission::Admission;
use crate::errors::ApiError;
use crate::models::{to_payload, ContactRequest, CreatedResponse};
use crate::repositories::{Collection, StoredDocument};
use crate::routes::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};
use chrono::Utc;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

/// `POST /api/contact` - store a sales inquiry.
#[instrument(skip_all, name = "api.handlers.contact.submit_inquiry")]
pub async fn submit_inquiry(
    State(state): State<Arc<AppState>>,
    Extension(admission): Extension<Admission>,
    body: Result<Json<ContactRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CreatedResponse>), ApiError> {
    let Json(request) = body?;
    let now_ms = Utc::now().timestamp_millis();
    let record = request.into_record(now_ms)?;
    let store = state.store()?;

    let document = StoredDocument {
        id: Uuid::new_v4().to_string(),
        parent_id: None,
        updated_at_ms: now_ms,
        payload: to_payload(&record)?,
    };
    store.upsert(Collection::Inquiries, &document).await?;

    tracing::info!(
        target: "api.handlers.contact",
        inquiry_id = %document.id,
        client_id = %admission.client_id,
        "Inquiry received"
    );

    Ok((StatusCode::CREATED, Json(CreatedResponse { id: document.id })))
}
