//! Note domain model.
//!
//! # Responsibility
//! - Define the immutable snapshots returned by the note repository.
//!
//! # Invariants
//! - `title` is unique across the store.
//! - `created_at` is set once; `updated_at >= created_at`.
//! - Timestamps are canonical UTC ISO-8601 text.

use serde::Serialize;

/// Default page size applied when callers pass a non-positive value.
pub const DEFAULT_PAGE_SIZE: i64 = 50;

/// Snapshot of one persisted note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Note {
    /// Storage-assigned row id; stable across updates and renames.
    pub id: i64,
    pub title: String,
    pub content: String,
    pub created_at: String,
    pub updated_at: String,
}

/// List/search request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoteListQuery {
    /// 1-based page. Values below 1 are treated as 1.
    pub page: Option<i64>,
    /// Rows per page. Non-positive values fall back to 50.
    pub page_size: Option<i64>,
    /// Case-insensitive substring matched against title or content.
    pub query: Option<String>,
}

impl NoteListQuery {
    pub fn new(page: i64, page_size: i64) -> Self {
        Self {
            page: Some(page),
            page_size: Some(page_size),
            query: None,
        }
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    /// Effective page after normalization.
    pub fn normalized_page(&self) -> i64 {
        match self.page {
            Some(page) if page >= 1 => page,
            _ => 1,
        }
    }

    /// Effective page size after normalization.
    pub fn normalized_page_size(&self) -> i64 {
        match self.page_size {
            Some(size) if size >= 1 => size,
            _ => DEFAULT_PAGE_SIZE,
        }
    }

    /// Search text, or `None` when absent or empty.
    pub fn search_text(&self) -> Option<&str> {
        self.query.as_deref().filter(|text| !text.is_empty())
    }
}

/// One page of list/search results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotePage {
    /// Rows ordered by `updated_at` descending.
    pub notes: Vec<Note>,
    /// Matching rows before pagination.
    pub total: u64,
    pub page: i64,
    #[serde(rename = "pageSize")]
    pub page_size: i64,
}

#[cfg(test)]
mod tests {
    use super::{NoteListQuery, NotePage, DEFAULT_PAGE_SIZE};

    #[test]
    fn non_positive_paging_values_are_normalized() {
        let query = NoteListQuery::new(0, -3);
        assert_eq!(query.normalized_page(), 1);
        assert_eq!(query.normalized_page_size(), DEFAULT_PAGE_SIZE);

        let unset = NoteListQuery::default();
        assert_eq!(unset.normalized_page(), 1);
        assert_eq!(unset.normalized_page_size(), DEFAULT_PAGE_SIZE);

        let explicit = NoteListQuery::new(3, 7);
        assert_eq!(explicit.normalized_page(), 3);
        assert_eq!(explicit.normalized_page_size(), 7);
    }

    #[test]
    fn empty_query_counts_as_absent() {
        assert_eq!(NoteListQuery::new(1, 10).with_query("").search_text(), None);
        assert_eq!(
            NoteListQuery::new(1, 10).with_query("q3").search_text(),
            Some("q3")
        );
    }

    #[test]
    fn page_size_serializes_as_camel_case() {
        let page = NotePage {
            notes: Vec::new(),
            total: 0,
            page: 1,
            page_size: 50,
        };
        let json = serde_json::to_value(&page).unwrap();
        assert_eq!(json["pageSize"], 50);
        assert!(json.get("page_size").is_none());
    }
}
