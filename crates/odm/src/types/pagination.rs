//! Pagination types: offset pages, page resolution and `search_after` cursors.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::QueryError;

/// One page of results produced by `paginate`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paginator<T> {
    items: Vec<T>,
    total: u64,
    per_page: u64,
    current_page: u64,
}

impl<T> Paginator<T> {
    /// Creates a page. `per_page` and `current_page` are expected to be at least 1.
    pub fn new(items: Vec<T>, total: u64, per_page: u64, current_page: u64) -> Self {
        Self {
            items,
            total,
            per_page,
            current_page,
        }
    }

    /// Returns the items on this page.
    pub fn items(&self) -> &[T] {
        &self.items
    }

    /// Consumes the page, returning its items.
    pub fn into_items(self) -> Vec<T> {
        self.items
    }

    /// Returns the total number of matching documents.
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Returns the page size.
    pub fn per_page(&self) -> u64 {
        self.per_page
    }

    /// Returns the 1-based page number.
    pub fn current_page(&self) -> u64 {
        self.current_page
    }

    /// Returns the last page number (at least 1).
    pub fn last_page(&self) -> u64 {
        if self.per_page == 0 {
            return 1;
        }
        self.total.div_ceil(self.per_page).max(1)
    }

    /// Returns true if pages exist after this one.
    pub fn has_more_pages(&self) -> bool {
        self.current_page < self.last_page()
    }

    /// Returns the 1-based position of the first item on this page.
    pub fn first_item(&self) -> Option<u64> {
        if self.items.is_empty() {
            None
        } else {
            Some(
                self.current_page
                    .saturating_sub(1)
                    .saturating_mul(self.per_page)
                    .saturating_add(1),
            )
        }
    }

    /// Returns the 1-based position of the last item on this page.
    pub fn last_item(&self) -> Option<u64> {
        self.first_item()
            .map(|first| first.saturating_add(self.items.len() as u64 - 1))
    }
}

/// Supplies the current page number when `paginate` is called without one.
///
/// Web integrations typically read it from the request's query string.
pub trait PageResolver: Send + Sync {
    /// Returns the current page, or `None` to use page 1.
    fn current_page(&self) -> Option<u64>;
}

/// Always resolves to the first page.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstPage;

impl PageResolver for FirstPage {
    fn current_page(&self) -> Option<u64> {
        None
    }
}

/// A page resolver that can be updated per request.
#[derive(Debug, Default)]
pub struct SharedPageResolver {
    page: RwLock<Option<u64>>,
}

impl SharedPageResolver {
    /// Creates a resolver with no page set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the page returned to subsequent `paginate` calls.
    pub fn set_page(&self, page: Option<u64>) {
        *self.page.write() = page;
    }
}

impl PageResolver for SharedPageResolver {
    fn current_page(&self) -> Option<u64> {
        *self.page.read()
    }
}

/// An opaque `search_after` cursor.
///
/// Cursors are base64-encoded JSON carrying the sort values of the last hit
/// on a page, plus a version for compatibility.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cursor {
    version: u8,
    sort_values: Vec<Value>,
}

impl Cursor {
    /// Creates a cursor positioned after a hit with the given sort values.
    pub fn new(sort_values: Vec<Value>) -> Self {
        Self {
            version: 1,
            sort_values,
        }
    }

    /// Returns the sort values.
    pub fn sort_values(&self) -> &[Value] {
        &self.sort_values
    }

    /// Consumes the cursor, returning the sort values.
    pub fn into_sort_values(self) -> Vec<Value> {
        self.sort_values
    }

    /// Encodes the cursor to an opaque string.
    pub fn encode(&self) -> String {
        let json = serde_json::to_vec(self).unwrap_or_default();
        URL_SAFE_NO_PAD.encode(&json)
    }

    /// Decodes a cursor from an opaque string.
    pub fn decode(s: &str) -> Result<Self, QueryError> {
        let bytes = URL_SAFE_NO_PAD
            .decode(s)
            .map_err(|_| QueryError::InvalidCursor {
                cursor: s.to_string(),
            })?;

        serde_json::from_slice(&bytes).map_err(|_| QueryError::InvalidCursor {
            cursor: s.to_string(),
        })
    }
}
