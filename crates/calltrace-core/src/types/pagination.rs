//! Keyset cursor pagination, no OFFSET/LIMIT.
//! Page retrieval cost does not grow with the page position.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};

/// A cursor for keyset pagination. Composite: (sort_value, id).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationCursor {
    pub last_sort_value: String,
    pub last_id: String,
}

impl PaginationCursor {
    pub fn new(last_sort_value: impl Into<String>, last_id: impl Into<String>) -> Self {
        Self {
            last_sort_value: last_sort_value.into(),
            last_id: last_id.into(),
        }
    }

    /// Encode cursor as base64 JSON.
    pub fn encode(&self) -> String {
        let json = serde_json::to_vec(self).unwrap_or_default();
        URL_SAFE_NO_PAD.encode(json)
    }

    /// Decode cursor from base64 JSON.
    pub fn decode(encoded: &str) -> Option<Self> {
        let bytes = URL_SAFE_NO_PAD.decode(encoded.trim()).ok()?;
        serde_json::from_slice(&bytes).ok()
    }

    /// True when `(sort_value, id)` sorts strictly after this cursor.
    pub fn is_before(&self, sort_value: &str, id: &str) -> bool {
        (self.last_sort_value.as_str(), self.last_id.as_str()) < (sort_value, id)
    }
}

/// A paginated result set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginatedResult<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub has_more: bool,
    pub next_cursor: Option<String>,
}

impl<T> PaginatedResult<T> {
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            total: 0,
            has_more: false,
            next_cursor: None,
        }
    }

    /// Convert the items while keeping the paging metadata.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PaginatedResult<U> {
        PaginatedResult {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            has_more: self.has_more,
            next_cursor: self.next_cursor,
        }
    }
}

impl<T> Default for PaginatedResult<T> {
    fn default() -> Self {
        Self::empty()
    }
}

/// Page over an already sorted slice of `(sort_value, id, item)` keys.
///
/// Items must be ordered by `(sort_value, id)` ascending. One extra item is
/// fetched to decide `has_more`.
pub fn paginate_sorted<T: Clone>(
    sorted: &[(String, String, T)],
    cursor: Option<&PaginationCursor>,
    limit: usize,
) -> PaginatedResult<T> {
    let limit = limit.max(1);
    let start = match cursor {
        Some(c) => sorted.partition_point(|(sort, id, _)| !c.is_before(sort, id)),
        None => 0,
    };
    let window = &sorted[start..];
    let has_more = window.len() > limit;
    let page = &window[..window.len().min(limit)];
    let next_cursor = if has_more {
        page.last()
            .map(|(sort, id, _)| PaginationCursor::new(sort.clone(), id.clone()).encode())
    } else {
        None
    };
    PaginatedResult {
        items: page.iter().map(|(_, _, item)| item.clone()).collect(),
        total: sorted.len() as u64,
        has_more,
        next_cursor,
    }
}
