//! Process-local document store.

use super::{sorts_after, Collection, DocumentStore, PageQuery, StoredDocument};
use crate::errors::ApiError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

/// In-memory document store with the same ordering as the Postgres store.
///
/// [`set_available`](Self::set_available) simulates a store outage: while
/// unavailable every operation fails with `ServiceUnavailable`.
#[derive(Debug)]
pub struct InMemoryDocumentStore {
    documents: RwLock<HashMap<(Collection, String), StoredDocument>>,
    available: AtomicBool,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self {
            documents: RwLock::new(HashMap::new()),
            available: AtomicBool::new(true),
        }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }

    fn ensure_available(&self) -> Result<(), ApiError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(ApiError::ServiceUnavailable(
                "In-memory store marked unavailable".to_string(),
            ))
        }
    }
}

impl Default for InMemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn page(&self, query: &PageQuery) -> Result<Vec<StoredDocument>, ApiError> {
        self.ensure_available()?;
        let documents = self.documents.read().await;

        let mut rows: Vec<StoredDocument> = documents
            .iter()
            .filter(|((collection, _), _)| *collection == query.collection)
            .map(|(_, doc)| doc)
            .filter(|doc| match &query.parent_id {
                Some(parent) => doc.parent_id.as_deref() == Some(parent.as_str()),
                None => true,
            })
            .filter(|doc| query.after.as_ref().map_or(true, |c| sorts_after(doc, c)))
            .cloned()
            .collect();

        rows.sort_by(|a, b| {
            b.updated_at_ms
                .cmp(&a.updated_at_ms)
                .then_with(|| a.id.cmp(&b.id))
        });
        rows.truncate(query.limit);

        Ok(rows)
    }

    async fn get(
        &self,
        collection: Collection,
        id: &str,
    ) -> Result<Option<StoredDocument>, ApiError> {
        self.ensure_available()?;
        let documents = self.documents.read().await;
        Ok(documents.get(&(collection, id.to_string())).cloned())
    }

    async fn upsert(
        &self,
        collection: Collection,
        document: &StoredDocument,
    ) -> Result<(), ApiError> {
        self.ensure_available()?;
        let mut documents = self.documents.write().await;
        documents.insert((collection, document.id.clone()), document.clone());
        Ok(())
    }

    async fn replace_if_unchanged(
        &self,
        collection: Collection,
        current: &StoredDocument,
        next: &StoredDocument,
    ) -> Result<bool, ApiError> {
        self.ensure_available()?;
        let mut documents = self.documents.write().await;
        let key = (collection, current.id.clone());
        if documents.get(&key) != Some(current) {
            return Ok(false);
        }
        documents.insert(key, next.clone());
        Ok(true)
    }

    async fn ping(&self) -> Result<(), ApiError> {
        self.ensure_available()
    }
}
