//! Cursor pagination over recency-ordered collections.
//!
//! Rows are ordered by `(timestamp DESC, id ASC)`. A cursor names the last
//! row of the previous page as `"<timestamp_ms>_<id>"`; the timestamp is a
//! pure integer prefix and the id is everything after the FIRST `_`, so ids
//! may contain underscores themselves.
//!
//! Malformed cursors decode to `None` and the caller starts from the first
//! page. They are never an error.

use crate::errors::ApiError;
use crate::repositories::{DocumentStore, PageQuery, StoredDocument};
use serde::{Deserialize, Serialize};

/// Page size when the caller does not supply a usable `limit`.
pub const DEFAULT_PAGE_SIZE: usize = 50;
pub const MIN_PAGE_SIZE: usize = 1;
pub const MAX_PAGE_SIZE: usize = 200;

const SEPARATOR: char = '_';

/// Position of the last row returned on a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageCursor {
    pub timestamp_ms: i64,
    pub id: String,
}

impl PageCursor {
    pub fn new(timestamp_ms: i64, id: impl Into<String>) -> Self {
        Self {
            timestamp_ms,
            id: id.into(),
        }
    }

    /// Serialize as `"<timestamp_ms>_<id>"`.
    pub fn encode(&self) -> String {
        format!("{}{}{}", self.timestamp_ms, SEPARATOR, self.id)
    }

    /// Parse a cursor token; `None` for absent or malformed input.
    pub fn decode(token: Option<&str>) -> Option<Self> {
        let (timestamp, id) = token?.split_once(SEPARATOR)?;
        if id.is_empty() {
            return None;
        }
        let timestamp_ms = timestamp.parse::<i64>().ok()?;
        Some(Self::new(timestamp_ms, id))
    }
}

/// One page of results.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

impl<T> Page<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            next_cursor: self.next_cursor,
        }
    }

    /// Map items fallibly, failing the whole page on the first error.
    pub fn try_map<U, E>(self, f: impl FnMut(T) -> Result<U, E>) -> Result<Page<U>, E> {
        Ok(Page {
            items: self.items.into_iter().map(f).collect::<Result<_, _>>()?,
            next_cursor: self.next_cursor,
        })
    }
}

/// Compound sort key of a paginated row.
pub trait SortKey {
    fn sort_timestamp_ms(&self) -> i64;
    fn sort_id(&self) -> &str;
}

/// Shape up to `page_size + 1` rows into a page.
///
/// With more than `page_size` rows the extra ones are dropped and the cursor
/// points at the last row kept.
pub fn into_page<T: SortKey>(mut rows: Vec<T>, page_size: usize) -> Page<T> {
    if rows.len() <= page_size {
        return Page {
            items: rows,
            next_cursor: None,
        };
    }

    rows.truncate(page_size);
    let next_cursor = rows
        .last()
        .map(|row| PageCursor::new(row.sort_timestamp_ms(), row.sort_id()).encode());

    Page {
        items: rows,
        next_cursor,
    }
}

/// `limit` and `cursor` query parameters.
///
/// `limit` is taken as a string so a garbage value falls back to the default
/// instead of rejecting the request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageParams {
    pub limit: Option<String>,
    pub cursor: Option<String>,
}

impl PageParams {
    /// Requested page size: default 50, clamped to `[1, 200]`.
    pub fn page_size(&self) -> usize {
        let Some(requested) = self
            .limit
            .as_deref()
            .and_then(|raw| raw.trim().parse::<i64>().ok())
        else {
            return DEFAULT_PAGE_SIZE;
        };

        let clamped = requested.clamp(MIN_PAGE_SIZE as i64, MAX_PAGE_SIZE as i64);
        usize::try_from(clamped).unwrap_or(DEFAULT_PAGE_SIZE)
    }

    pub fn cursor(&self) -> Option<PageCursor> {
        PageCursor::decode(self.cursor.as_deref())
    }
}

/// Fetch one page from `store`.
///
/// Asks the store for one row more than the page size to learn whether a
/// further page exists without a second round-trip.
pub async fn fetch_page<S>(store: &S, mut query: PageQuery) -> Result<Page<StoredDocument>, ApiError>
where
    S: DocumentStore + ?Sized,
{
    let page_size = query.limit;
    query.limit = page_size.saturating_add(1);
    let rows = store.page(&query).await?;
    Ok(into_page(rows, page_size))
}
