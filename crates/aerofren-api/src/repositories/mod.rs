//! Document store access.
//!
//! Conversations, messages and inquiries are stored as JSON documents with
//! a recency timestamp and an optional parent (a message's conversation).
//! Handlers parse payloads into typed views in `models`.
//!
//! # Implementations
//!
//! - [`PgDocumentStore`] - PostgreSQL via sqlx
//! - [`InMemoryDocumentStore`] - process-local, for development and tests
//!
//! Both order pages by `(updated_at_ms DESC, id ASC)` and resume strictly
//! after a cursor position.

mod memory;
mod postgres;

pub use memory::InMemoryDocumentStore;
pub use postgres::PgDocumentStore;

use crate::errors::ApiError;
use crate::pagination::{PageCursor, SortKey};
use async_trait::async_trait;
use std::fmt;
use std::str::FromStr;

/// Named document collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Conversations,
    Messages,
    Inquiries,
}

impl Collection {
    pub fn as_str(self) -> &'static str {
        match self {
            Collection::Conversations => "conversations",
            Collection::Messages => "messages",
            Collection::Inquiries => "inquiries",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Collection {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "conversations" => Ok(Collection::Conversations),
            "messages" => Ok(Collection::Messages),
            "inquiries" => Ok(Collection::Inquiries),
            other => Err(ApiError::Database(format!("unknown collection '{other}'"))),
        }
    }
}

/// A stored document.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub id: String,
    pub parent_id: Option<String>,
    /// Recency timestamp (Unix epoch milliseconds), the primary sort key.
    pub updated_at_ms: i64,
    pub payload: serde_json::Value,
}

impl SortKey for StoredDocument {
    fn sort_timestamp_ms(&self) -> i64 {
        self.updated_at_ms
    }

    fn sort_id(&self) -> &str {
        &self.id
    }
}

/// A keyset range query.
#[derive(Debug, Clone)]
pub struct PageQuery {
    pub collection: Collection,
    /// Restrict to children of this parent.
    pub parent_id: Option<String>,
    /// Resume strictly after this position.
    pub after: Option<PageCursor>,
    /// Maximum rows to return.
    pub limit: usize,
}

impl PageQuery {
    pub fn new(collection: Collection, limit: usize) -> Self {
        Self {
            collection,
            parent_id: None,
            after: None,
            limit,
        }
    }

    #[must_use]
    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    #[must_use]
    pub fn after(mut self, cursor: Option<PageCursor>) -> Self {
        self.after = cursor;
        self
    }
}

/// Ordered document storage.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Rows matching `query`, ordered by `(updated_at_ms DESC, id ASC)`.
    async fn page(&self, query: &PageQuery) -> Result<Vec<StoredDocument>, ApiError>;

    async fn get(
        &self,
        collection: Collection,
        id: &str,
    ) -> Result<Option<StoredDocument>, ApiError>;

    /// Insert or replace by `(collection, id)`.
    async fn upsert(&self, collection: Collection, document: &StoredDocument)
        -> Result<(), ApiError>;

    /// Replace `current` with `next` only while the stored row still equals
    /// `current`. Returns `false` if another writer replaced it first.
    async fn replace_if_unchanged(
        &self,
        collection: Collection,
        current: &StoredDocument,
        next: &StoredDocument,
    ) -> Result<bool, ApiError>;

    /// Cheap connectivity check for readiness probes.
    async fn ping(&self) -> Result<(), ApiError>;
}

/// True if `doc` sorts strictly after `cursor` in `(timestamp DESC, id ASC)`.
pub(crate) fn sorts_after(doc: &StoredDocument, cursor: &PageCursor) -> bool {
    doc.updated_at_ms < cursor.timestamp_ms
        || (doc.updated_at_ms == cursor.timestamp_ms && doc.id.as_str() > cursor.id.as_str())
}
