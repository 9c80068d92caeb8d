//! Admin handlers.
//!
//! Mounted behind admission with `Access::Admin`, so every handler here may
//! assume the caller is a verified admin.

use crate::admission::Admission;
use crate::errors::ApiError;
use crate::models::{AdminCheckResponse, ConversationView, InquiryView};
use crate::pagination::{fetch_page, Page, PageParams};
use crate::repositories::{Collection, PageQuery};
use crate::routes::AppState;
use axum::extract::{Query, State};
use axum::{Extension, Json};
use std::sync::Arc;
use tracing::instrument;

/// `GET /api/admin/conversations` - most recently active first.
#[instrument(skip_all, name = "api.handlers.admin.list_conversations")]
pub async fn list_conversations(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PageParams>,
) -> Result<Json<Page<ConversationView>>, ApiError> {
    let query = PageQuery::new(Collection::Conversations, params.page_size()).after(params.cursor());
    let page = fetch_page(state.store()?, query).await?;
    Ok(Json(page.try_map(ConversationView::from_document)?))
}

/// `GET /api/admin/inquiries` - newest first.
#[instrument(skip_all, name = "api.handlers.admin.list_inquiries")]
pub async fn list_inquiries(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PageParams>,
) -> Result<Json<Page<InquiryView>>, ApiError> {
    let query = PageQuery::new(Collection::Inquiries, params.page_size()).after(params.cursor());
    let page = fetch_page(state.store()?, query).await?;
    Ok(Json(page.try_map(InquiryView::from_document)?))
}

/// `GET /api/admin/check` - admission already established admin privilege.
pub async fn admin_check(
    Extension(admission): Extension<Admission>,
) -> Result<Json<AdminCheckResponse>, ApiError> {
    let claims = admission.claims()?;
    Ok(Json(AdminCheckResponse {
        is_admin: admission.is_admin,
        sub: claims.sub.clone(),
    }))
}
