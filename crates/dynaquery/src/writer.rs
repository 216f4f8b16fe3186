//! Optimistic-concurrency write path.
//!
//! Every write is a single conditional request. Versioned writes carry a
//! compare-and-swap condition on the version attribute; a rejected condition
//! is re-probed so callers can tell a deleted item from a stale write.

use std::sync::Arc;

use tracing::{debug, warn};

use dynaquery_core::codec::{key_from_item, key_label};
use dynaquery_core::storage::{ItemStore, RepositoryError, Result, WriteCondition};
use dynaquery_core::value::{AttrValue, Item};
use dynaquery_core::version::{check_version, read_version, INITIAL_VERSION};

/// Insert/update/save/patch/delete for one table.
pub struct ConcurrencyGuard<S: ItemStore> {
    store: Arc<S>,
    table: String,
    entity_type: &'static str,
    /// Storage names of the primary key attributes, partition key first.
    keys: Vec<String>,
    version_attribute: Option<String>,
}

impl<S: ItemStore> ConcurrencyGuard<S> {
    /// `keys` are storage names, partition key first, and must not be empty.
    pub fn new(
        store: Arc<S>,
        table: impl Into<String>,
        entity_type: &'static str,
        keys: Vec<String>,
    ) -> Self {
        Self {
            store,
            table: table.into(),
            entity_type,
            keys,
            version_attribute: None,
        }
    }

    /// Enables versioned writes on the given storage attribute.
    pub fn with_version(mut self, version_attribute: impl Into<String>) -> Self {
        self.version_attribute = Some(version_attribute.into());
        self
    }

    fn partition_key(&self) -> String {
        self.keys[0].clone()
    }

    fn not_found(&self, key: &Item) -> RepositoryError {
        RepositoryError::NotFound {
            entity_type: self.entity_type,
            id: key_label(&self.keys, key),
        }
    }

    /// Writes `item` only if its key is free.
    ///
    /// Returns the stored item, or `None` when an item already holds the key.
    pub async fn insert(&self, mut item: Item) -> Result<Option<Item>> {
        let key = key_from_item(&self.keys, &item)?;
        if let Some(version_attribute) = &self.version_attribute {
            item.insert(version_attribute.clone(), AttrValue::int(INITIAL_VERSION));
        }

        let condition = WriteCondition::NotExists {
            key_attribute: self.partition_key(),
        };
        match self
            .store
            .put_item(&self.table, item.clone(), Some(&condition))
            .await
        {
            Ok(()) => {
                debug!(entity = self.entity_type, id = %key_label(&self.keys, &key), "inserted");
                Ok(Some(item))
            }
            Err(RepositoryError::ConditionFailed(_)) => {
                debug!(
                    entity = self.entity_type,
                    id = %key_label(&self.keys, &key),
                    "insert skipped, key already present"
                );
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Replaces an existing item.
    ///
    /// Versioned: the item's version must equal the stored one; the write
    /// stores the next version. Returns the stored item.
    pub async fn update(&self, mut item: Item) -> Result<Item> {
        let key = key_from_item(&self.keys, &item)?;

        let Some(version_attribute) = &self.version_attribute else {
            let condition = WriteCondition::Exists {
                key_attribute: self.partition_key(),
            };
            return match self
                .store
                .put_item(&self.table, item.clone(), Some(&condition))
                .await
            {
                Ok(()) => Ok(item),
                Err(RepositoryError::ConditionFailed(_)) => Err(self.not_found(&key)),
                Err(e) => Err(e),
            };
        };

        let carried = read_version(&item, version_attribute)?;
        let (stored_version, next_version) =
            self.next_version(&key, version_attribute, carried).await?;
        item.insert(version_attribute.clone(), AttrValue::int(next_version));

        let condition = self.version_condition(version_attribute, stored_version);
        match self
            .store
            .put_item(&self.table, item.clone(), Some(&condition))
            .await
        {
            Ok(()) => {
                debug!(
                    entity = self.entity_type,
                    id = %key_label(&self.keys, &key),
                    version = next_version,
                    "updated"
                );
                Ok(item)
            }
            Err(RepositoryError::ConditionFailed(_)) => {
                Err(self.reclassify(&key, version_attribute, carried).await)
            }
            Err(e) => Err(e),
        }
    }

    /// Inserts or replaces.
    ///
    /// Unversioned saves are a plain put. Versioned saves probe the key and
    /// dispatch to [`update`](Self::update) or [`insert`](Self::insert); an
    /// insert that loses a race falls through to update once.
    pub async fn save(&self, item: Item) -> Result<Item> {
        let key = key_from_item(&self.keys, &item)?;

        if self.version_attribute.is_none() {
            self.store.put_item(&self.table, item.clone(), None).await?;
            debug!(entity = self.entity_type, id = %key_label(&self.keys, &key), "saved");
            return Ok(item);
        }

        if self.store.get_item(&self.table, &key).await?.is_some() {
            return self.update(item).await;
        }
        match self.insert(item.clone()).await? {
            Some(stored) => Ok(stored),
            None => {
                warn!(
                    entity = self.entity_type,
                    id = %key_label(&self.keys, &key),
                    "item appeared during save, updating instead"
                );
                self.update(item).await
            }
        }
    }

    /// Sets the given attributes on an existing item.
    ///
    /// `fields` must carry the full key; versioned tables also require the
    /// caller's version. Returns the attributes written.
    pub async fn patch(&self, fields: Item) -> Result<Item> {
        let key = key_from_item(&self.keys, &fields)?;
        let mut updates: Item = fields
            .into_iter()
            .filter(|(name, _)| !self.keys.contains(name))
            .collect();
        if updates.is_empty() {
            return Err(RepositoryError::Validation(
                "patch has no attributes besides the key".to_string(),
            ));
        }

        let Some(version_attribute) = &self.version_attribute else {
            let condition = WriteCondition::Exists {
                key_attribute: self.partition_key(),
            };
            return match self
                .store
                .update_item(&self.table, &key, updates.clone(), Some(&condition))
                .await
            {
                Ok(()) => Ok(updates),
                Err(RepositoryError::ConditionFailed(_)) => Err(self.not_found(&key)),
                Err(e) => Err(e),
            };
        };

        let carried = match updates.get(version_attribute) {
            Some(value) => value.as_i64().ok_or_else(|| {
                RepositoryError::Validation(format!(
                    "version \"{version_attribute}\" must be an integer"
                ))
            })?,
            None => {
                return Err(RepositoryError::Validation(format!(
                    "patch is missing version \"{version_attribute}\""
                )))
            }
        };
        let (stored_version, next_version) =
            self.next_version(&key, version_attribute, carried).await?;
        updates.insert(version_attribute.clone(), AttrValue::int(next_version));

        let condition = self.version_condition(version_attribute, stored_version);
        match self
            .store
            .update_item(&self.table, &key, updates.clone(), Some(&condition))
            .await
        {
            Ok(()) => {
                debug!(
                    entity = self.entity_type,
                    id = %key_label(&self.keys, &key),
                    version = next_version,
                    attributes = updates.len(),
                    "patched"
                );
                Ok(updates)
            }
            Err(RepositoryError::ConditionFailed(_)) => {
                Err(self.reclassify(&key, version_attribute, carried).await)
            }
            Err(e) => Err(e),
        }
    }

    /// Deletes by key. Returns the number of items removed.
    pub async fn delete(&self, key: &Item) -> Result<u64> {
        let removed = self.store.delete_item(&self.table, key).await?;
        debug!(
            entity = self.entity_type,
            id = %key_label(&self.keys, key),
            removed,
            "deleted"
        );
        Ok(u64::from(removed))
    }

    /// Reads the stored version and checks the caller's against it.
    ///
    /// Returns `(stored, next)`. No write happens on mismatch.
    async fn next_version(
        &self,
        key: &Item,
        version_attribute: &str,
        carried: i64,
    ) -> Result<(i64, i64)> {
        let stored = self
            .store
            .get_item(&self.table, key)
            .await?
            .ok_or_else(|| self.not_found(key))?;
        let stored_version = read_version(&stored, version_attribute)?;
        let next = check_version(
            self.entity_type,
            &key_label(&self.keys, key),
            stored_version,
            carried,
        )?;
        Ok((stored_version, next))
    }

    fn version_condition(&self, version_attribute: &str, version: i64) -> WriteCondition {
        WriteCondition::VersionEquals {
            key_attribute: self.partition_key(),
            version_attribute: version_attribute.to_string(),
            version,
        }
    }

    /// Explains a rejected compare-and-swap by probing the key again.
    async fn reclassify(&self, key: &Item, version_attribute: &str, carried: i64) -> RepositoryError {
        let id = key_label(&self.keys, key);
        warn!(entity = self.entity_type, id = %id, "conditional write rejected, re-probing");

        match self.store.get_item(&self.table, key).await {
            Ok(None) => self.not_found(key),
            Ok(Some(stored)) => match read_version(&stored, version_attribute) {
                Ok(actual) => RepositoryError::VersionConflict {
                    entity_type: self.entity_type,
                    id,
                    expected: carried,
                    actual,
                },
                Err(e) => e,
            },
            Err(e) => e,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use tokio::sync::{Mutex, RwLock};

    use dynaquery_core::query::QueryDescriptor;
    use dynaquery_core::storage::{BatchGetOutput, Page};

    enum Interference {
        Delete,
        Bump,
    }

    // Mock store keyed by "id" that honours write conditions and tracks calls
    struct MockStore {
        items: RwLock<HashMap<String, Item>>,
        get_calls: AtomicUsize,
        write_calls: AtomicUsize,
        // Applied right before the next conditional write
        interference: Mutex<Option<Interference>>,
    }

    impl MockStore {
        fn new() -> Self {
            Self {
                items: RwLock::new(HashMap::new()),
                get_calls: AtomicUsize::new(0),
                write_calls: AtomicUsize::new(0),
                interference: Mutex::new(None),
            }
        }

        async fn seed(&self, item: Item) {
            let id = item["id"].to_string();
            self.items.write().await.insert(id, item);
        }

        async fn stored(&self, id: &str) -> Option<Item> {
            self.items.read().await.get(id).cloned()
        }

        async fn interfere(&self, interference: Interference) {
            *self.interference.lock().await = Some(interference);
        }

        async fn apply_interference(&self, id: &str) {
            let Some(interference) = self.interference.lock().await.take() else {
                return;
            };
            let mut items = self.items.write().await;
            match interference {
                Interference::Delete => {
                    items.remove(id);
                }
                Interference::Bump => {
                    if let Some(item) = items.get_mut(id) {
                        let version = item["version"].as_i64().unwrap();
                        item.insert("version".to_string(), AttrValue::int(version + 1));
                    }
                }
            }
        }

        async fn check(&self, id: &str, condition: Option<&WriteCondition>) -> Result<()> {
            self.apply_interference(id).await;
            let items = self.items.read().await;
            match condition {
                Some(condition) if !condition.holds(items.get(id)) => Err(
                    RepositoryError::ConditionFailed("The conditional request failed".to_string()),
                ),
                _ => Ok(()),
            }
        }
    }

    #[async_trait]
    impl ItemStore for MockStore {
        async fn get_item(&self, _table: &str, key: &Item) -> Result<Option<Item>> {
            self.get_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.stored(&key["id"].to_string()).await)
        }

        async fn put_item(
            &self,
            _table: &str,
            item: Item,
            condition: Option<&WriteCondition>,
        ) -> Result<()> {
            let id = item["id"].to_string();
            self.check(&id, condition).await?;
            self.write_calls.fetch_add(1, Ordering::SeqCst);
            self.items.write().await.insert(id, item);
            Ok(())
        }

        async fn update_item(
            &self,
            _table: &str,
            key: &Item,
            updates: Item,
            condition: Option<&WriteCondition>,
        ) -> Result<()> {
            let id = key["id"].to_string();
            self.check(&id, condition).await?;
            self.write_calls.fetch_add(1, Ordering::SeqCst);
            self.items
                .write()
                .await
                .entry(id)
                .or_insert_with(|| key.clone())
                .extend(updates);
            Ok(())
        }

        async fn delete_item(&self, _table: &str, key: &Item) -> Result<bool> {
            Ok(self.items.write().await.remove(&key["id"].to_string()).is_some())
        }

        async fn batch_get_items(&self, _table: &str, _keys: Vec<Item>) -> Result<BatchGetOutput> {
            unimplemented!()
        }

        async fn fetch_page(
            &self,
            _query: &QueryDescriptor,
            _limit: Option<i32>,
            _start_key: Option<Item>,
        ) -> Result<Page> {
            unimplemented!()
        }

        async fn count_items(&self, _query: &QueryDescriptor) -> Result<i64> {
            unimplemented!()
        }
    }

    fn user(id: &str, name: &str, version: i64) -> Item {
        [
            ("id".to_string(), AttrValue::from(id)),
            ("name".to_string(), AttrValue::from(name)),
            ("version".to_string(), AttrValue::int(version)),
        ]
        .into_iter()
        .collect()
    }

    fn versioned(store: &Arc<MockStore>) -> ConcurrencyGuard<MockStore> {
        ConcurrencyGuard::new(store.clone(), "users", "User", vec!["id".to_string()])
            .with_version("version")
    }

    fn plain(store: &Arc<MockStore>) -> ConcurrencyGuard<MockStore> {
        ConcurrencyGuard::new(store.clone(), "users", "User", vec!["id".to_string()])
    }

    #[tokio::test]
    async fn test_insert_sets_initial_version() {
        let store = Arc::new(MockStore::new());

        let stored = versioned(&store).insert(user("u1", "Ada", 0)).await.unwrap();

        assert_eq!(stored.unwrap()["version"], AttrValue::int(1));
        assert_eq!(store.stored("u1").await.unwrap()["version"], AttrValue::int(1));
    }

    #[tokio::test]
    async fn test_insert_existing_key_affects_nothing() {
        let store = Arc::new(MockStore::new());
        store.seed(user("u1", "Ada", 4)).await;

        let result = versioned(&store).insert(user("u1", "Eve", 0)).await.unwrap();

        assert_eq!(result, None);
        assert_eq!(store.write_calls.load(Ordering::SeqCst), 0);
        assert_eq!(store.stored("u1").await, Some(user("u1", "Ada", 4)));
    }

    #[tokio::test]
    async fn test_update_stale_version_conflicts_without_writing() {
        let store = Arc::new(MockStore::new());
        store.seed(user("u1", "Ada", 3)).await;

        let result = versioned(&store).update(user("u1", "Eve", 2)).await;

        assert_eq!(
            result,
            Err(RepositoryError::VersionConflict {
                entity_type: "User",
                id: "u1".to_string(),
                expected: 2,
                actual: 3,
            })
        );
        assert_eq!(store.write_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_update_increments_version() {
        let store = Arc::new(MockStore::new());
        store.seed(user("u1", "Ada", 3)).await;

        let stored = versioned(&store).update(user("u1", "Eve", 3)).await.unwrap();

        assert_eq!(stored, user("u1", "Eve", 4));
        assert_eq!(store.stored("u1").await, Some(user("u1", "Eve", 4)));
    }

    #[tokio::test]
    async fn test_update_missing_item_is_not_found() {
        let store = Arc::new(MockStore::new());

        let result = versioned(&store).update(user("u1", "Eve", 1)).await;

        assert!(matches!(result, Err(RepositoryError::NotFound { .. })));
        assert_eq!(store.write_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_concurrent_delete_is_reported_as_not_found() {
        let store = Arc::new(MockStore::new());
        store.seed(user("u1", "Ada", 1)).await;
        store.interfere(Interference::Delete).await;

        let result = versioned(&store).update(user("u1", "Eve", 1)).await;

        assert!(matches!(result, Err(RepositoryError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_concurrent_update_is_reported_as_conflict() {
        let store = Arc::new(MockStore::new());
        store.seed(user("u1", "Ada", 1)).await;
        store.interfere(Interference::Bump).await;

        let result = versioned(&store).update(user("u1", "Eve", 1)).await;

        assert_eq!(
            result,
            Err(RepositoryError::VersionConflict {
                entity_type: "User",
                id: "u1".to_string(),
                expected: 1,
                actual: 2,
            })
        );
    }

    #[tokio::test]
    async fn test_plain_update_requires_existing_item() {
        let store = Arc::new(MockStore::new());

        let result = plain(&store).update(user("u1", "Eve", 0)).await;

        assert!(matches!(result, Err(RepositoryError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_save_dispatches_on_existence() {
        let store = Arc::new(MockStore::new());
        let guard = versioned(&store);

        let inserted = guard.save(user("u1", "Ada", 0)).await.unwrap();
        assert_eq!(inserted["version"], AttrValue::int(1));

        let updated = guard.save(user("u1", "Eve", 1)).await.unwrap();
        assert_eq!(updated, user("u1", "Eve", 2));
    }

    #[tokio::test]
    async fn test_plain_save_is_unconditional() {
        let store = Arc::new(MockStore::new());
        store.seed(user("u1", "Ada", 9)).await;

        plain(&store).save(user("u1", "Eve", 0)).await.unwrap();

        assert_eq!(store.stored("u1").await, Some(user("u1", "Eve", 0)));
        assert_eq!(store.get_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_versioned_patch() {
        let store = Arc::new(MockStore::new());
        store.seed(user("u1", "Ada", 2)).await;
        let fields: Item = [
            ("id".to_string(), AttrValue::from("u1")),
            ("name".to_string(), AttrValue::from("Grace")),
            ("version".to_string(), AttrValue::int(2)),
        ]
        .into_iter()
        .collect();

        let written = versioned(&store).patch(fields).await.unwrap();

        assert_eq!(written["version"], AttrValue::int(3));
        assert!(!written.contains_key("id"));
        assert_eq!(store.stored("u1").await, Some(user("u1", "Grace", 3)));
    }

    #[tokio::test]
    async fn test_versioned_patch_requires_version() {
        let store = Arc::new(MockStore::new());
        store.seed(user("u1", "Ada", 2)).await;
        let fields: Item = [
            ("id".to_string(), AttrValue::from("u1")),
            ("name".to_string(), AttrValue::from("Grace")),
        ]
        .into_iter()
        .collect();

        let result = versioned(&store).patch(fields).await;

        assert!(matches!(result, Err(RepositoryError::Validation(_))));
    }

    #[tokio::test]
    async fn test_plain_patch_missing_item_is_not_found() {
        let store = Arc::new(MockStore::new());
        let fields: Item = [
            ("id".to_string(), AttrValue::from("u1")),
            ("name".to_string(), AttrValue::from("Grace")),
        ]
        .into_iter()
        .collect();

        let result = plain(&store).patch(fields).await;

        assert!(matches!(result, Err(RepositoryError::NotFound { .. })));
        assert_eq!(store.stored("u1").await, None);
    }

    #[tokio::test]
    async fn test_delete_counts_rows() {
        let store = Arc::new(MockStore::new());
        store.seed(user("u1", "Ada", 1)).await;
        let key: Item = [("id".to_string(), AttrValue::from("u1"))].into_iter().collect();

        assert_eq!(plain(&store).delete(&key).await.unwrap(), 1);
        assert_eq!(plain(&store).delete(&key).await.unwrap(), 0);
    }
}
