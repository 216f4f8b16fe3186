use async_trait::async_trait;

use crate::query::QueryDescriptor;
use crate::value::Item;

use super::{BatchGetOutput, Page, Result, WriteCondition};

/// Boundary to the partitioned key-value store.
///
/// Implementations perform exactly one request per call and never retry;
/// transient failures propagate to the caller unchanged.
#[async_trait]
pub trait ItemStore: Send + Sync {
    /// Reads one item by its full primary key.
    async fn get_item(&self, table: &str, key: &Item) -> Result<Option<Item>>;

    /// Writes a whole item, optionally guarded by a condition.
    async fn put_item(
        &self,
        table: &str,
        item: Item,
        condition: Option<&WriteCondition>,
    ) -> Result<()>;

    /// Sets the given attributes on an existing item, optionally guarded by a condition.
    async fn update_item(
        &self,
        table: &str,
        key: &Item,
        updates: Item,
        condition: Option<&WriteCondition>,
    ) -> Result<()>;

    /// Deletes one item. Returns whether an item was removed.
    async fn delete_item(&self, table: &str, key: &Item) -> Result<bool>;

    /// Reads several items by key in one request.
    async fn batch_get_items(&self, table: &str, keys: Vec<Item>) -> Result<BatchGetOutput>;

    /// Fetches one physical page of a query or scan.
    ///
    /// `start_key` is the continuation key of the previous page, `None` for the first.
    async fn fetch_page(
        &self,
        query: &QueryDescriptor,
        limit: Option<i32>,
        start_key: Option<Item>,
    ) -> Result<Page>;

    /// Counts every item the descriptor matches.
    async fn count_items(&self, query: &QueryDescriptor) -> Result<i64>;
}
