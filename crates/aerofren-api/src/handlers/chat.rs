//! Chat handlers.
//!
//! Conversations belong to the user who opened them. Admins may read, post
//! into, and escalate any conversation; everyone else only their own.

use crate::admission::Admission;
use crate::errors::ApiError;
use crate::models::{
    parse_payload, to_payload, AuthorRole, ConversationRecord, ConversationView, EscalateRequest,
    MessageRecord, MessageView, PostMessageRequest, PostMessageResponse,
};
use crate::pagination::{fetch_page, Page, PageParams};
use crate::repositories::{Collection, DocumentStore, PageQuery, StoredDocument};
use crate::routes::AppState;
use axum::body::Bytes;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use chrono::Utc;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

/// Optimistic update attempts before a busy conversation is reported as
/// unavailable.
const MAX_CONVERSATION_UPDATE_ATTEMPTS: usize = 128;

/// `POST /api/chat/messages` - append a message, opening a conversation if
/// no `conversationId` is given.
#[instrument(skip_all, name = "api.handlers.chat.post_message")]
pub async fn post_message(
    State(state): State<Arc<AppState>>,
    Extension(admission): Extension<Admission>,
    body: Result<Json<PostMessageRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<PostMessageResponse>), ApiError> {
    let Json(request) = body?;
    let text = request.validate()?;
    let claims = admission.claims()?;
    let store = state.store()?;
    let now_ms = Utc::now().timestamp_millis();

    let (conversation_id, existing) = match request.conversation_id.as_deref() {
        Some(id) => {
            let (doc, record) = load_conversation(store, id).await?;
            ensure_access(&record, &admission)?;
            (doc.id, Some(record))
        }
        None => (Uuid::new_v4().to_string(), None),
    };

    let author_role = match &existing {
        Some(record) if !record.is_owned_by(&claims.sub) => AuthorRole::Staff,
        _ => AuthorRole::Customer,
    };
    let message = MessageRecord {
        author_sub: claims.sub.clone(),
        author_role,
        text: text.to_string(),
        created_at_ms: now_ms,
    };
    let message_doc = StoredDocument {
        id: Uuid::new_v4().to_string(),
        parent_id: Some(conversation_id.clone()),
        updated_at_ms: now_ms,
        payload: to_payload(&message)?,
    };
    store.upsert(Collection::Messages, &message_doc).await?;

    let conversation = if existing.is_some() {
        let (_, record, _) =
            update_conversation(store, &conversation_id, &admission, |record| {
                record.record_message(text);
                true
            })
            .await?;
        record
    } else {
        let mut record = ConversationRecord::new(claims.sub.clone(), now_ms);
        record.record_message(text);
        store
            .upsert(
                Collection::Conversations,
                &StoredDocument {
                    id: conversation_id.clone(),
                    parent_id: None,
                    updated_at_ms: now_ms,
                    payload: to_payload(&record)?,
                },
            )
            .await?;
        record
    };

    tracing::debug!(
        target: "api.handlers.chat",
        conversation_id = %conversation_id,
        message_count = conversation.message_count,
        "Message stored"
    );

    Ok((
        StatusCode::CREATED,
        Json(PostMessageResponse {
            conversation_id,
            message: MessageView::from_document(message_doc)?,
        }),
    ))
}

/// `POST /api/chat/conversations/:id/escalate` - hand the conversation to a
/// human. Escalating twice is a no-op that returns the current state.
#[instrument(skip_all, name = "api.handlers.chat.escalate", fields(conversation_id = %id))]
pub async fn escalate_conversation(
    State(state): State<Arc<AppState>>,
    Extension(admission): Extension<Admission>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<ConversationView>, ApiError> {
    let request: EscalateRequest = if body.iter().all(u8::is_ascii_whitespace) {
        EscalateRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::ValidationFailed(format!("Invalid request body: {e}")))?
    };
    let reason = request.validate()?;
    let store = state.store()?;

    let now_ms = Utc::now().timestamp_millis();
    let (doc, record, escalated) = update_conversation(store, &id, &admission, |record| {
        record.escalate(reason.clone(), now_ms)
    })
    .await?;

    if escalated {
        tracing::info!(
            target: "api.handlers.chat",
            conversation_id = %doc.id,
            by_admin = admission.is_admin,
            "Conversation escalated"
        );
    }

    Ok(Json(ConversationView {
        id: doc.id,
        updated_at_ms: doc.updated_at_ms,
        record,
    }))
}

/// `GET /api/chat/conversations/:id/messages` - newest first.
#[instrument(skip_all, name = "api.handlers.chat.list_messages", fields(conversation_id = %id))]
pub async fn list_messages(
    State(state): State<Arc<AppState>>,
    Extension(admission): Extension<Admission>,
    Path(id): Path<String>,
    Query(params): Query<PageParams>,
) -> Result<Json<Page<MessageView>>, ApiError> {
    let store = state.store()?;
    let (_, record) = load_conversation(store, &id).await?;
    ensure_access(&record, &admission)?;

    let query = PageQuery::new(Collection::Messages, params.page_size())
        .with_parent(id)
        .after(params.cursor());
    let page = fetch_page(store, query).await?;

    Ok(Json(page.try_map(MessageView::from_document)?))
}

/// Apply `change` to a stored conversation, starting over from a fresh read
/// whenever a concurrent writer replaced the record first. `change` returns
/// `false` to leave the record as it is.
///
/// Returns the resulting document, its record, and whether it was written.
async fn update_conversation<F>(
    store: &dyn DocumentStore,
    id: &str,
    admission: &Admission,
    mut change: F,
) -> Result<(StoredDocument, ConversationRecord, bool), ApiError>
where
    F: FnMut(&mut ConversationRecord) -> bool,
{
    for attempt in 0..MAX_CONVERSATION_UPDATE_ATTEMPTS {
        let (current, mut record) = load_conversation(store, id).await?;
        ensure_access(&record, admission)?;

        if !change(&mut record) {
            return Ok((current, record, false));
        }

        let next = StoredDocument {
            id: current.id.clone(),
            parent_id: current.parent_id.clone(),
            updated_at_ms: Utc::now().timestamp_millis(),
            payload: to_payload(&record)?,
        };
        if store
            .replace_if_unchanged(Collection::Conversations, &current, &next)
            .await?
        {
            return Ok((next, record, true));
        }

        tracing::debug!(
            target: "api.handlers.chat",
            conversation_id = %id,
            attempt = attempt + 1,
            "Conversation changed concurrently, retrying"
        );
        tokio::task::yield_now().await;
    }

    tracing::warn!(
        target: "api.handlers.chat",
        conversation_id = %id,
        client_id = %admission.client_id,
        "Conversation update kept conflicting, giving up"
    );
    Err(ApiError::ServiceUnavailable(
        "Conversation is busy, try again".to_string(),
    ))
}

async fn load_conversation(
    store: &dyn DocumentStore,
    id: &str,
) -> Result<(StoredDocument, ConversationRecord), ApiError> {
    let doc = store
        .get(Collection::Conversations, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Conversation not found".to_string()))?;
    let record = parse_payload(&doc)?;
    Ok((doc, record))
}

fn ensure_access(record: &ConversationRecord, admission: &Admission) -> Result<(), ApiError> {
    let claims = admission.claims()?;
    if admission.is_admin || record.is_owned_by(&claims.sub) {
        return Ok(());
    }

    tracing::info!(
        target: "api.handlers.chat",
        client_id = %admission.client_id,
        "Conversation access denied"
    );
    Err(ApiError::Forbidden(
        "Conversation belongs to another user".to_string(),
    ))
}
