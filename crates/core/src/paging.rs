//! Page arithmetic for forward-only paginated reads.
//!
//! The store only pages forward from a continuation key, so reaching logical
//! page N means replaying pages 1..N. These helpers hold the arithmetic; the
//! replay loop itself lives with the store.

use serde::Serialize;

/// A normalized page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// 1-based page index.
    pub page_index: u64,
    pub page_size: u64,
    /// Size of page 1 when it differs from `page_size`; 0 disables.
    pub first_page_size: u64,
}

impl PageRequest {
    /// Builds a request; page index 0 is treated as page 1.
    pub fn new(page_index: u64, page_size: u64, first_page_size: u64) -> Self {
        Self {
            page_index: page_index.max(1),
            page_size,
            first_page_size,
        }
    }

    /// Substitutes `default` when no page size was requested.
    pub fn with_default_page_size(mut self, default: u64) -> Self {
        if self.page_size == 0 {
            self.page_size = default;
        }
        self
    }

    fn has_first_page_size(&self) -> bool {
        self.first_page_size > 0
    }

    /// Fetch limit for the given 1-based physical page of the replay.
    pub fn limit_for(&self, page: u64) -> u64 {
        if page <= 1 && self.has_first_page_size() {
            self.first_page_size
        } else {
            self.page_size
        }
    }

    /// Fetch limit for the requested page.
    pub fn fetch_limit(&self) -> u64 {
        self.limit_for(self.page_index)
    }

    /// Items returned by pages before and including the requested one.
    pub fn received_items(&self, items_in_page: u64) -> u64 {
        let earlier_pages = self.page_index.saturating_sub(1);
        if earlier_pages == 0 {
            // Page 1 with an override counts as a full first page.
            return if self.has_first_page_size() {
                self.first_page_size
            } else {
                items_in_page
            };
        }
        // Saturates: a page index far past the end still reads as last.
        if self.has_first_page_size() {
            self.first_page_size
                .saturating_add(self.page_size.saturating_mul(earlier_pages - 1))
                .saturating_add(items_in_page)
        } else {
            self.page_size
                .saturating_mul(earlier_pages)
                .saturating_add(items_in_page)
        }
    }

    /// Whether the requested page is the last one given the full match count.
    pub fn is_last(&self, items_in_page: u64, total: u64) -> bool {
        self.received_items(items_in_page) >= total
    }
}

/// One page of search results.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult<T> {
    pub items: Vec<T>,
    /// Number of items matching the search across all pages.
    pub total: u64,
    /// Whether no further page holds matching items.
    pub last: bool,
}

impl<T> SearchResult<T> {
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            total: 0,
            last: true,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> SearchResult<U> {
        SearchResult {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            last: self.last,
        }
    }
}
