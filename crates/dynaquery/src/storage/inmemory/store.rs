//! In-memory `ItemStore` implementation.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use dynaquery_core::codec::key_from_item;
use dynaquery_core::expression::compare;
use dynaquery_core::query::{QueryDescriptor, SelectMode};
use dynaquery_core::storage::{
    BatchGetOutput, ItemStore, Page, RepositoryError, Result, WriteCondition,
};
use dynaquery_core::value::Item;

#[derive(Debug, Default)]
struct Table {
    keys: Vec<String>,
    indexes: HashMap<String, Vec<String>>,
    items: BTreeMap<String, Item>,
}

impl Table {
    fn new(keys: Vec<String>) -> Self {
        Self {
            keys,
            ..Default::default()
        }
    }

    fn primary_key(&self, item: &Item) -> Result<String> {
        let key = key_from_item(&self.keys, item)?;
        Ok(self
            .keys
            .iter()
            .map(|k| key[k].to_string())
            .collect::<Vec<_>>()
            .join("\u{1f}"))
    }

    /// Items a query or scan evaluates, in result order.
    fn candidates(&self, query: &QueryDescriptor) -> Result<Vec<&Item>> {
        let Some(predicates) = &query.key_condition else {
            return Ok(self.items.values().collect());
        };

        let order_keys = match &query.index_name {
            Some(name) => self.indexes.get(name).ok_or_else(|| {
                RepositoryError::QueryFailed(format!("Index not found: {name}"))
            })?,
            None => &self.keys,
        };

        let mut matched: Vec<&Item> = self
            .items
            .values()
            .filter(|item| order_keys.iter().all(|k| item.contains_key(k)))
            .filter(|item| predicates.iter().all(|p| p.matches(item)))
            .collect();
        matched.sort_by(|a, b| compare_on(order_keys, a, b));
        if !query.scan_forward {
            matched.reverse();
        }
        Ok(matched)
    }
}

fn compare_on(keys: &[String], a: &Item, b: &Item) -> Ordering {
    for key in keys {
        let ordering = match (a.get(key), b.get(key)) {
            (Some(x), Some(y)) => compare(x, y).unwrap_or(Ordering::Equal),
            _ => Ordering::Equal,
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

fn project(item: &Item, query: &QueryDescriptor) -> Item {
    match query.select {
        SelectMode::AllAttributes => item.clone(),
        SelectMode::SpecificAttributes => item
            .iter()
            .filter(|(name, _)| query.projection.contains(*name))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect(),
    }
}

fn condition_failed(condition: &WriteCondition) -> RepositoryError {
    RepositoryError::ConditionFailed(format!("{condition:?}"))
}

/// In-memory store.
///
/// Cloning is cheap; clones share the same tables.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<HashMap<String, Table>>>,
}

impl InMemoryStore {
    /// Creates a store with no tables.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates (or replaces) a table keyed by the given attributes.
    pub async fn create_table<I, S>(&self, name: &str, keys: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let keys = keys.into_iter().map(Into::into).collect();
        self.tables
            .write()
            .await
            .insert(name.to_string(), Table::new(keys));
    }

    /// Declares a secondary index on an existing table.
    pub async fn create_index<I, S>(&self, table: &str, index: &str, keys: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut tables = self.tables.write().await;
        let table = tables.get_mut(table).ok_or_else(|| table_not_found(table))?;
        table
            .indexes
            .insert(index.to_string(), keys.into_iter().map(Into::into).collect());
        Ok(())
    }
}

fn table_not_found(table: &str) -> RepositoryError {
    RepositoryError::QueryFailed(format!("Table not found: {table}"))
}

#[async_trait]
impl ItemStore for InMemoryStore {
    async fn get_item(&self, table: &str, key: &Item) -> Result<Option<Item>> {
        let tables = self.tables.read().await;
        let table = tables.get(table).ok_or_else(|| table_not_found(table))?;
        let key = table.primary_key(key)?;
        Ok(table.items.get(&key).cloned())
    }

    async fn put_item(
        &self,
        table: &str,
        item: Item,
        condition: Option<&WriteCondition>,
    ) -> Result<()> {
        let mut tables = self.tables.write().await;
        let table = tables.get_mut(table).ok_or_else(|| table_not_found(table))?;
        let key = table.primary_key(&item)?;

        if let Some(condition) = condition {
            if !condition.holds(table.items.get(&key)) {
                return Err(condition_failed(condition));
            }
        }
        table.items.insert(key, item);
        Ok(())
    }

    async fn update_item(
        &self,
        table: &str,
        key: &Item,
        updates: Item,
        condition: Option<&WriteCondition>,
    ) -> Result<()> {
        let mut tables = self.tables.write().await;
        let table = tables.get_mut(table).ok_or_else(|| table_not_found(table))?;
        let primary_key = table.primary_key(key)?;

        if let Some(condition) = condition {
            if !condition.holds(table.items.get(&primary_key)) {
                return Err(condition_failed(condition));
            }
        }
        // UpdateItem creates the item when no condition prevents it.
        let stored = table
            .items
            .entry(primary_key)
            .or_insert_with(|| key.clone());
        stored.extend(updates);
        Ok(())
    }

    async fn delete_item(&self, table: &str, key: &Item) -> Result<bool> {
        let mut tables = self.tables.write().await;
        let table = tables.get_mut(table).ok_or_else(|| table_not_found(table))?;
        let key = table.primary_key(key)?;
        Ok(table.items.remove(&key).is_some())
    }

    async fn batch_get_items(&self, table: &str, keys: Vec<Item>) -> Result<BatchGetOutput> {
        let tables = self.tables.read().await;
        let table = tables.get(table).ok_or_else(|| table_not_found(table))?;

        let mut items = Vec::with_capacity(keys.len());
        for key in &keys {
            if let Some(item) = table.items.get(&table.primary_key(key)?) {
                items.push(item.clone());
            }
        }
        Ok(BatchGetOutput {
            items,
            unprocessed_keys: Vec::new(),
        })
    }

    // `limit` caps the items evaluated, not the items matched, as in DynamoDB.
    async fn fetch_page(
        &self,
        query: &QueryDescriptor,
        limit: Option<i32>,
        start_key: Option<Item>,
    ) -> Result<Page> {
        let tables = self.tables.read().await;
        let table = tables
            .get(&query.table)
            .ok_or_else(|| table_not_found(&query.table))?;
        let candidates = table.candidates(query)?;

        let start = match &start_key {
            Some(start_key) => {
                let start_key = table.primary_key(start_key)?;
                let mut position = candidates.len();
                for (i, item) in candidates.iter().enumerate() {
                    if table.primary_key(item)? == start_key {
                        position = i + 1;
                        break;
                    }
                }
                position
            }
            None => 0,
        };

        let end = match limit {
            Some(limit) if limit > 0 => candidates.len().min(start + limit as usize),
            _ => candidates.len(),
        };

        let window = &candidates[start.min(end)..end];
        let items: Vec<Item> = window
            .iter()
            .filter(|item| query.filter.iter().all(|p| p.matches(item)))
            .map(|item| project(item, query))
            .collect();

        let last_evaluated_key = match window.last() {
            Some(last) if end < candidates.len() => Some(key_from_item(&table.keys, last)?),
            _ => None,
        };

        Ok(Page {
            count: items.len() as i64,
            items,
            last_evaluated_key,
        })
    }

    async fn count_items(&self, query: &QueryDescriptor) -> Result<i64> {
        let tables = self.tables.read().await;
        let table = tables
            .get(&query.table)
            .ok_or_else(|| table_not_found(&query.table))?;
        let count = table
            .candidates(query)?
            .into_iter()
            .filter(|item| query.filter.iter().all(|p| p.matches(item)))
            .count();
        Ok(count as i64)
    }
}
