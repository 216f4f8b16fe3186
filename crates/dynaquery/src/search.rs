//! Page-replay searcher.
//!
//! Materializes logical page N by driving the store's forward-only pages
//! from the start, then counts the full matched set to decide whether the
//! page is the last one.

use std::sync::Arc;

use tracing::{debug, trace};

use dynaquery_core::paging::{PageRequest, SearchResult};
use dynaquery_core::query::QueryDescriptor;
use dynaquery_core::storage::{ItemStore, Page, RepositoryError, Result};
use dynaquery_core::value::Item;

/// Executes query descriptors against an [`ItemStore`].
pub struct PageReplaySearcher<S: ItemStore> {
    store: Arc<S>,
    default_page_size: u64,
}

impl<S: ItemStore> PageReplaySearcher<S> {
    /// Creates a searcher. `default_page_size` applies when a request carries 0.
    pub fn new(store: Arc<S>, default_page_size: u64) -> Self {
        Self {
            store,
            default_page_size,
        }
    }

    /// Returns one logical page plus the full match count.
    pub async fn search(
        &self,
        query: &QueryDescriptor,
        request: PageRequest,
    ) -> Result<SearchResult<Item>> {
        let request = request.with_default_page_size(self.default_page_size);
        if request.page_size == 0 {
            return Err(RepositoryError::Validation(
                "page size must be greater than zero".to_string(),
            ));
        }

        debug!(
            table = %query.table,
            index = ?query.index_name,
            scan = query.is_scan(),
            page_index = request.page_index,
            page_size = request.page_size,
            first_page_size = request.first_page_size,
            "replaying pages"
        );

        let (captured, physical_pages) = self.replay(query, &request).await?;
        let items_in_page = captured.items.len() as u64;

        // A single exhausted first page already holds every match.
        let total = if physical_pages == 1 && captured.last_evaluated_key.is_none() {
            items_in_page
        } else {
            let total = self.store.count_items(query).await?;
            u64::try_from(total).map_err(|_| {
                RepositoryError::InvalidData(format!("negative item count: {total}"))
            })?
        };

        let last = request.is_last(items_in_page, total);
        debug!(
            items = items_in_page,
            total,
            last,
            physical_pages,
            "search page materialized"
        );

        Ok(SearchResult {
            items: captured.items,
            total,
            last,
        })
    }

    /// Drives pages until the requested one is reached or the stream ends.
    ///
    /// Returns the captured page and how many physical pages were fetched.
    async fn replay(&self, query: &QueryDescriptor, request: &PageRequest) -> Result<(Page, u64)> {
        let mut page_number = 0;
        let mut start_key = None;

        loop {
            page_number += 1;
            let limit = fetch_limit(request.limit_for(page_number))?;
            let page = self
                .store
                .fetch_page(query, Some(limit), start_key.take())
                .await?;
            trace!(page = page_number, count = page.count, limit, "fetched page");

            if page_number >= request.page_index {
                return Ok((page, page_number));
            }
            match &page.last_evaluated_key {
                Some(key) => start_key = Some(key.clone()),
                None => return Ok((page, page_number)),
            }
        }
    }

    /// Reads every matching item, following continuation keys to the end.
    pub async fn collect_all(&self, query: &QueryDescriptor) -> Result<Vec<Item>> {
        let mut items = Vec::new();
        let mut start_key = None;
        let mut pages = 0u64;

        loop {
            let page = self.store.fetch_page(query, None, start_key).await?;
            pages += 1;
            items.extend(page.items);
            match page.last_evaluated_key {
                Some(key) => start_key = Some(key),
                None => break,
            }
        }

        debug!(table = %query.table, pages, items = items.len(), "collected all items");
        Ok(items)
    }

    /// Counts every item the descriptor matches.
    pub async fn count(&self, query: &QueryDescriptor) -> Result<u64> {
        let total = self.store.count_items(query).await?;
        u64::try_from(total)
            .map_err(|_| RepositoryError::InvalidData(format!("negative item count: {total}")))
    }
}

fn fetch_limit(limit: u64) -> Result<i32> {
    i32::try_from(limit)
        .map_err(|_| RepositoryError::Validation(format!("page size too large: {limit}")))
}
