//! AEROFREN API models.
//!
//! Stored payload records, the views returned to clients, and request
//! bodies with their validation. Payloads are parsed from
//! [`StoredDocument`]s here so handlers only see typed data.

use crate::errors::ApiError;
use crate::repositories::StoredDocument;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Maximum chat message length in characters.
pub const MAX_MESSAGE_CHARS: usize = 2000;

/// Maximum escalation reason length in characters.
pub const MAX_REASON_CHARS: usize = 500;

/// Maximum length of short contact fields (name, company).
pub const MAX_SHORT_FIELD_CHARS: usize = 200;

/// Maximum email length per RFC 5321.
pub const MAX_EMAIL_CHARS: usize = 254;

/// Maximum contact message length in characters.
pub const MAX_INQUIRY_CHARS: usize = 5000;

/// Maximum client-supplied identifier length.
pub const MAX_ID_CHARS: usize = 128;

/// Characters of the last message kept on the conversation.
const PREVIEW_CHARS: usize = 120;

/// Conversation lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationStatus {
    /// Handled by the automated assistant.
    Open,

    /// Handed to a human.
    Escalated,
}

/// Who wrote a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorRole {
    Customer,
    Staff,
}

// ============================================================================
// Stored payloads
// ============================================================================

/// Payload of a `conversations` document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationRecord {
    pub owner_sub: String,
    pub status: ConversationStatus,
    pub created_at_ms: i64,
    #[serde(default)]
    pub message_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message_preview: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub escalated_at_ms: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub escalation_reason: Option<String>,
}

impl ConversationRecord {
    pub fn new(owner_sub: impl Into<String>, now_ms: i64) -> Self {
        Self {
            owner_sub: owner_sub.into(),
            status: ConversationStatus::Open,
            created_at_ms: now_ms,
            message_count: 0,
            last_message_preview: None,
            escalated_at_ms: None,
            escalation_reason: None,
        }
    }

    pub fn record_message(&mut self, text: &str) {
        self.message_count = self.message_count.saturating_add(1);
        self.last_message_preview = Some(text.chars().take(PREVIEW_CHARS).collect());
    }

    /// Mark escalated. Returns `false` if it already was.
    pub fn escalate(&mut self, reason: Option<String>, now_ms: i64) -> bool {
        if self.status == ConversationStatus::Escalated {
            return false;
        }
        self.status = ConversationStatus::Escalated;
        self.escalated_at_ms = Some(now_ms);
        self.escalation_reason = reason;
        true
    }

    pub fn is_owned_by(&self, sub: &str) -> bool {
        self.owner_sub == sub
    }
}

/// Payload of a `messages` document. The conversation is the parent id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRecord {
    pub author_sub: String,
    pub author_role: AuthorRole,
    pub text: String,
    pub created_at_ms: i64,
}

/// Payload of an `inquiries` document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InquiryRecord {
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    pub message: String,
    pub created_at_ms: i64,
}

/// Parse a stored payload, failing fast on a malformed document.
pub fn parse_payload<T: DeserializeOwned>(doc: &StoredDocument) -> Result<T, ApiError> {
    serde_json::from_value(doc.payload.clone()).map_err(|e| {
        tracing::error!(target: "api.repo", id = %doc.id, error = %e, "Malformed stored document");
        ApiError::ServiceUnavailable("Malformed document in store".to_string())
    })
}

/// Serialize a payload for storage.
pub fn to_payload<T: Serialize>(record: &T) -> Result<serde_json::Value, ApiError> {
    serde_json::to_value(record).map_err(|e| {
        tracing::error!(target: "api.repo", error = %e, "Failed to serialize document");
        ApiError::Internal
    })
}

// ============================================================================
// Views
// ============================================================================

/// Conversation as returned to clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationView {
    pub id: String,
    pub updated_at_ms: i64,
    #[serde(flatten)]
    pub record: ConversationRecord,
}

impl ConversationView {
    pub fn from_document(doc: StoredDocument) -> Result<Self, ApiError> {
        let record = parse_payload(&doc)?;
        Ok(Self {
            id: doc.id,
            updated_at_ms: doc.updated_at_ms,
            record,
        })
    }
}

/// Chat message as returned to clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageView {
    pub id: String,
    pub conversation_id: String,
    pub author_role: AuthorRole,
    pub text: String,
    pub created_at_ms: i64,
}

impl MessageView {
    pub fn from_document(doc: StoredDocument) -> Result<Self, ApiError> {
        let record: MessageRecord = parse_payload(&doc)?;
        Ok(Self {
            id: doc.id,
            conversation_id: doc.parent_id.unwrap_or_default(),
            author_role: record.author_role,
            text: record.text,
            created_at_ms: record.created_at_ms,
        })
    }
}

/// Contact inquiry as returned to admins.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InquiryView {
    pub id: String,
    pub updated_at_ms: i64,
    #[serde(flatten)]
    pub record: InquiryRecord,
}

impl InquiryView {
    pub fn from_document(doc: StoredDocument) -> Result<Self, ApiError> {
        let record = parse_payload(&doc)?;
        Ok(Self {
            id: doc.id,
            updated_at_ms: doc.updated_at_ms,
            record,
        })
    }
}

// ============================================================================
// Requests and responses
// ============================================================================

/// `POST /api/chat/messages` body.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostMessageRequest {
    #[serde(default)]
    pub conversation_id: Option<String>,
    pub text: String,
}

impl PostMessageRequest {
    /// Returns the trimmed message text.
    pub fn validate(&self) -> Result<&str, ApiError> {
        if let Some(id) = &self.conversation_id {
            validate_id(id)?;
        }

        let text = self.text.trim();
        if text.is_empty() {
            return Err(ApiError::ValidationFailed(
                "text must not be empty".to_string(),
            ));
        }
        if text.chars().count() > MAX_MESSAGE_CHARS {
            return Err(ApiError::ValidationFailed(format!(
                "text must be at most {} characters",
                MAX_MESSAGE_CHARS
            )));
        }
        Ok(text)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostMessageResponse {
    pub conversation_id: String,
    pub message: MessageView,
}

/// `POST /api/chat/conversations/:id/escalate` body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EscalateRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

impl EscalateRequest {
    /// Returns the trimmed reason, `None` if blank.
    pub fn validate(&self) -> Result<Option<String>, ApiError> {
        let Some(reason) = self.reason.as_deref().map(str::trim).filter(|r| !r.is_empty())
        else {
            return Ok(None);
        };
        if reason.chars().count() > MAX_REASON_CHARS {
            return Err(ApiError::ValidationFailed(format!(
                "reason must be at most {} characters",
                MAX_REASON_CHARS
            )));
        }
        Ok(Some(reason.to_string()))
    }
}

/// `POST /api/contact` body.
#[derive(Debug, Clone, Deserialize)]
pub struct ContactRequest {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub company: Option<String>,
    pub message: String,
}

impl ContactRequest {
    /// Validate and normalize into a record.
    pub fn into_record(self, now_ms: i64) -> Result<InquiryRecord, ApiError> {
        let name = required("name", &self.name, MAX_SHORT_FIELD_CHARS)?;
        let email = required("email", &self.email, MAX_EMAIL_CHARS)?;
        if !looks_like_email(&email) {
            return Err(ApiError::ValidationFailed(
                "email must be a valid address".to_string(),
            ));
        }
        let company = match self.company.as_deref().map(str::trim) {
            Some(company) if !company.is_empty() => {
                Some(required("company", company, MAX_SHORT_FIELD_CHARS)?)
            }
            _ => None,
        };
        let message = required("message", &self.message, MAX_INQUIRY_CHARS)?;

        Ok(InquiryRecord {
            name,
            email,
            company,
            message,
            created_at_ms: now_ms,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedResponse {
    pub id: String,
}

/// `GET /api/admin/check` response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminCheckResponse {
    pub is_admin: bool,
    pub sub: String,
}

/// Readiness check response.
#[derive(Debug, Clone, Serialize)]
pub struct ReadinessResponse {
    /// "ready" or "not_ready".
    pub status: &'static str,

    /// "healthy", "unhealthy" or "unconfigured".
    pub store: &'static str,

    /// "configured" or "unconfigured".
    pub identity_authority: &'static str,

    /// Generic error message, no infrastructure details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn validate_id(id: &str) -> Result<(), ApiError> {
    if id.trim().is_empty() || id.chars().count() > MAX_ID_CHARS {
        return Err(ApiError::ValidationFailed(
            "conversationId is invalid".to_string(),
        ));
    }
    Ok(())
}

fn required(field: &str, value: &str, max_chars: usize) -> Result<String, ApiError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ApiError::ValidationFailed(format!(
            "{} must not be empty",
            field
        )));
    }
    if value.chars().count() > max_chars {
        return Err(ApiError::ValidationFailed(format!(
            "{} must be at most {} characters",
            field, max_chars
        )));
    }
    Ok(value.to_string())
}

fn looks_like_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !domain.contains('@')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    }
}
