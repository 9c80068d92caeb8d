//! PostgreSQL document store.
//!
//! # Security
//!
//! - All queries use parameterized statements
//! - Payloads are never logged

use super::{Collection, DocumentStore, PageQuery, StoredDocument};
use crate::errors::ApiError;
use crate::observability::metrics::record_store_query;
use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::PgPool;
use std::time::Instant;
use tracing::instrument;

/// Document store backed by the `documents` table.
#[derive(Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[derive(sqlx::FromRow)]
struct DocumentRow {
    id: String,
    parent_id: Option<String>,
    updated_at_ms: i64,
    payload: Json<serde_json::Value>,
}

impl From<DocumentRow> for StoredDocument {
    fn from(row: DocumentRow) -> Self {
        StoredDocument {
            id: row.id,
            parent_id: row.parent_id,
            updated_at_ms: row.updated_at_ms,
            payload: row.payload.0,
        }
    }
}

fn timed<T>(operation: &str, start: Instant, result: Result<T, sqlx::Error>) -> Result<T, ApiError> {
    let status = if result.is_ok() { "success" } else { "error" };
    record_store_query(operation, status, start.elapsed());
    result.map_err(|e| {
        tracing::warn!(target: "api.repo", operation = operation, error = %e, "Store query failed");
        ApiError::from(e)
    })
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    #[instrument(skip_all, name = "api.repo.page", fields(collection = %query.collection, limit = query.limit))]
    async fn page(&self, query: &PageQuery) -> Result<Vec<StoredDocument>, ApiError> {
        let limit = i64::try_from(query.limit).unwrap_or(i64::MAX);
        let (after_ts, after_id) = match &query.after {
            Some(cursor) => (Some(cursor.timestamp_ms), Some(cursor.id.as_str())),
            None => (None, None),
        };

        let start = Instant::now();
        let result: Result<Vec<DocumentRow>, sqlx::Error> = sqlx::query_as(
            r#"
            SELECT id, parent_id, updated_at_ms, payload
            FROM documents
            WHERE collection = $1
              AND ($2::text IS NULL OR parent_id = $2)
              AND (
                $3::bigint IS NULL
                OR updated_at_ms < $3
                OR (updated_at_ms = $3 AND id > $4)
              )
            ORDER BY updated_at_ms DESC, id ASC
            LIMIT $5
            "#,
        )
        .bind(query.collection.as_str())
        .bind(query.parent_id.as_deref())
        .bind(after_ts)
        .bind(after_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await;

        let rows = timed("page", start, result)?;
        Ok(rows.into_iter().map(StoredDocument::from).collect())
    }

    #[instrument(skip_all, name = "api.repo.get", fields(collection = %collection))]
    async fn get(
        &self,
        collection: Collection,
        id: &str,
    ) -> Result<Option<StoredDocument>, ApiError> {
        let start = Instant::now();
        let result: Result<Option<DocumentRow>, sqlx::Error> = sqlx::query_as(
            r#"
            SELECT id, parent_id, updated_at_ms, payload
            FROM documents
            WHERE collection = $1 AND id = $2
            "#,
        )
        .bind(collection.as_str())
        .bind(id)
        .fetch_optional(&self.pool)
        .await;

        Ok(timed("get", start, result)?.map(StoredDocument::from))
    }

    #[instrument(skip_all, name = "api.repo.upsert", fields(collection = %collection))]
    async fn upsert(
        &self,
        collection: Collection,
        document: &StoredDocument,
    ) -> Result<(), ApiError> {
        let start = Instant::now();
        let result = sqlx::query(
            r#"
            INSERT INTO documents (collection, id, parent_id, updated_at_ms, payload)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (collection, id) DO UPDATE
            SET parent_id = EXCLUDED.parent_id,
                updated_at_ms = EXCLUDED.updated_at_ms,
                payload = EXCLUDED.payload
            "#,
        )
        .bind(collection.as_str())
        .bind(&document.id)
        .bind(document.parent_id.as_deref())
        .bind(document.updated_at_ms)
        .bind(Json(&document.payload))
        .execute(&self.pool)
        .await;

        timed("upsert", start, result).map(|_| ())
    }

    #[instrument(skip_all, name = "api.repo.replace_if_unchanged", fields(collection = %collection))]
    async fn replace_if_unchanged(
        &self,
        collection: Collection,
        current: &StoredDocument,
        next: &StoredDocument,
    ) -> Result<bool, ApiError> {
        let start = Instant::now();
        let result = sqlx::query(
            r#"
            UPDATE documents
            SET parent_id = $3,
                updated_at_ms = $4,
                payload = $5
            WHERE collection = $1
              AND id = $2
              AND updated_at_ms = $6
              AND payload = $7
            "#,
        )
        .bind(collection.as_str())
        .bind(&current.id)
        .bind(next.parent_id.as_deref())
        .bind(next.updated_at_ms)
        .bind(Json(&next.payload))
        .bind(current.updated_at_ms)
        .bind(Json(&current.payload))
        .execute(&self.pool)
        .await;

        Ok(timed("replace_if_unchanged", start, result)?.rows_affected() == 1)
    }

    #[instrument(skip_all, name = "api.repo.ping")]
    async fn ping(&self) -> Result<(), ApiError> {
        let start = Instant::now();
        let result = sqlx::query("SELECT 1").execute(&self.pool).await;
        timed("ping", start, result).map(|_| ())
    }
}
