//! Generic repository over one table.
//!
//! Wires the model codec, the page-replay searcher and the concurrency guard
//! together for a registered [`Model`] type.

use std::marker::PhantomData;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use dynaquery_core::codec::{build_key_map, decode_item, encode_fields, encode_item, Id, Model};
use dynaquery_core::filter::{find_envelope, FilterValue, SearchFilter};
use dynaquery_core::metadata::EntityMetadata;
use dynaquery_core::paging::{PageRequest, SearchResult};
use dynaquery_core::query::{build_search_query, QueryDescriptor, SecondaryIndex};
use dynaquery_core::storage::{ItemStore, RepositoryError, Result};
use dynaquery_core::value::Item;

use crate::search::PageReplaySearcher;
use crate::writer::ConcurrencyGuard;

/// Most keys DynamoDB accepts in one batch read.
pub const BATCH_GET_LIMIT: usize = 100;

/// Default page size when none is configured.
pub const DEFAULT_PAGE_SIZE: u64 = 20;

/// Loads, searches and writes one model type.
///
/// # Type Parameters
///
/// * `M` - The stored model
/// * `S` - The store implementation
pub struct Repository<M: Model, S: ItemStore> {
    store: Arc<S>,
    table: String,
    metadata: EntityMetadata,
    keys: Vec<String>,
    version_attribute: Option<String>,
    default_page_size: u64,
    guard: ConcurrencyGuard<S>,
    _model: PhantomData<fn() -> M>,
}

impl<M: Model, S: ItemStore> Repository<M, S> {
    /// Creates a repository keyed by the given logical fields.
    ///
    /// Fails with a configuration error if a key field is not registered on
    /// the model.
    pub fn new(
        store: Arc<S>,
        table: impl Into<String>,
        partition_key: &str,
        sort_key: Option<&str>,
    ) -> Result<Self> {
        let table = table.into();
        let metadata = M::metadata();
        let keys = std::iter::once(partition_key)
            .chain(sort_key)
            .map(|field| resolve_field(&metadata, field))
            .collect::<Result<Vec<_>>>()?;
        let guard = ConcurrencyGuard::new(
            store.clone(),
            table.clone(),
            metadata.entity_type(),
            keys.clone(),
        );

        Ok(Self {
            store,
            table,
            metadata,
            keys,
            version_attribute: None,
            default_page_size: DEFAULT_PAGE_SIZE,
            guard,
            _model: PhantomData,
        })
    }

    /// Enables optimistic concurrency on the given logical field.
    pub fn with_version(mut self, version_field: &str) -> Result<Self> {
        let attribute = resolve_field(&self.metadata, version_field)?;
        self.guard = self.guard.with_version(attribute.clone());
        self.version_attribute = Some(attribute);
        Ok(self)
    }

    /// Page size used when a search envelope requests 0.
    pub fn with_default_page_size(mut self, page_size: u64) -> Self {
        self.default_page_size = page_size;
        self
    }

    /// Storage names of the primary key attributes.
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    fn searcher(&self) -> PageReplaySearcher<S> {
        PageReplaySearcher::new(self.store.clone(), self.default_page_size)
    }

    fn decode(&self, item: Item) -> Result<M> {
        decode_item(item, &self.metadata)
    }

    /// Every item in the table.
    pub async fn all(&self) -> Result<Vec<M>> {
        let items = self
            .searcher()
            .collect_all(&QueryDescriptor::full_scan(&self.table))
            .await?;
        items.into_iter().map(|item| self.decode(item)).collect()
    }

    pub async fn load(&self, id: impl Into<Id>) -> Result<Option<M>> {
        let key = build_key_map(&self.keys, &id.into())?;
        self.store
            .get_item(&self.table, &key)
            .await?
            .map(|item| self.decode(item))
            .transpose()
    }

    pub async fn exist(&self, id: impl Into<Id>) -> Result<bool> {
        let key = build_key_map(&self.keys, &id.into())?;
        Ok(self.store.get_item(&self.table, &key).await?.is_some())
    }

    /// Loads several items by id.
    ///
    /// Returns the items found and the ids the store left unprocessed; retrying
    /// those is up to the caller. Missing ids are simply absent.
    pub async fn find_by_ids(&self, ids: &[Id]) -> Result<(Vec<M>, Vec<Id>)> {
        let keys = ids
            .iter()
            .map(|id| build_key_map(&self.keys, id))
            .collect::<Result<Vec<_>>>()?;

        let mut models = Vec::with_capacity(keys.len());
        let mut unprocessed = Vec::new();
        for chunk in keys.chunks(BATCH_GET_LIMIT) {
            let output = self.store.batch_get_items(&self.table, chunk.to_vec()).await?;
            for item in output.items {
                models.push(self.decode(item)?);
            }
            unprocessed.extend(output.unprocessed_keys.into_iter().map(Id::Named));
        }

        if !unprocessed.is_empty() {
            warn!(
                table = %self.table,
                unprocessed = unprocessed.len(),
                "batch read left keys unprocessed"
            );
        }
        Ok((models, unprocessed))
    }

    /// Returns the number of items deleted (0 or 1).
    pub async fn delete(&self, id: impl Into<Id>) -> Result<u64> {
        let key = build_key_map(&self.keys, &id.into())?;
        self.guard.delete(&key).await
    }

    /// Inserts `model` if its key is free. Returns the rows affected (0 or 1).
    ///
    /// On success a versioned model carries the stored version afterwards.
    pub async fn insert(&self, model: &mut M) -> Result<u64> {
        let item = encode_item(model, &self.metadata)?;
        match self.guard.insert(item).await? {
            Some(stored) => {
                self.refresh(model, stored)?;
                Ok(1)
            }
            None => Ok(0),
        }
    }

    /// Replaces an existing item. Versioned models must carry the stored version.
    pub async fn update(&self, model: &mut M) -> Result<u64> {
        let item = encode_item(model, &self.metadata)?;
        let stored = self.guard.update(item).await?;
        self.refresh(model, stored)?;
        Ok(1)
    }

    /// Inserts or replaces.
    pub async fn save(&self, model: &mut M) -> Result<u64> {
        let item = encode_item(model, &self.metadata)?;
        let stored = self.guard.save(item).await?;
        self.refresh(model, stored)?;
        Ok(1)
    }

    /// Sets the given fields on an existing item.
    ///
    /// `fields` uses serialized (JSON) field names and must contain the key,
    /// plus the current version for versioned models.
    pub async fn patch(&self, fields: Map<String, Value>) -> Result<u64> {
        let item = encode_fields(fields, &self.metadata);
        self.guard.patch(item).await?;
        Ok(1)
    }

    // Versioned writes change the version; reflect it on the caller's model.
    fn refresh(&self, model: &mut M, stored: Item) -> Result<()> {
        if self.version_attribute.is_some() {
            *model = self.decode(stored)?;
        }
        Ok(())
    }

    /// Compiles `filter` into a query on `index` and returns the requested page.
    ///
    /// The filter must embed a search envelope. A projected search decodes
    /// partial items, so fields outside the projection need serde defaults.
    pub async fn search<F: SearchFilter>(
        &self,
        filter: &F,
        index: &SecondaryIndex,
    ) -> Result<SearchResult<M>> {
        let values = filter.field_values();
        let request = self.page_request(&values)?;
        let query = build_search_query(
            &self.table,
            index,
            &values,
            &F::metadata(),
            &self.metadata,
        )?;
        debug!(
            table = %self.table,
            index = ?query.index_name,
            predicates = query.filter.len(),
            key_predicates = query.key_condition.as_ref().map_or(0, Vec::len),
            "compiled search"
        );

        let result = self.searcher().search(&query, request).await?;
        let SearchResult { items, total, last } = result;
        let items = items
            .into_iter()
            .map(|item| self.decode(item))
            .collect::<Result<Vec<_>>>()?;
        Ok(SearchResult { items, total, last })
    }

    /// Counts the items `filter` matches on `index`, ignoring paging.
    pub async fn count<F: SearchFilter>(&self, filter: &F, index: &SecondaryIndex) -> Result<u64> {
        let values = filter.field_values();
        let query = build_search_query(
            &self.table,
            index,
            &values,
            &F::metadata(),
            &self.metadata,
        )?;
        self.searcher().count(&query).await
    }

    fn page_request(&self, values: &[(&'static str, FilterValue)]) -> Result<PageRequest> {
        let envelopes = values
            .iter()
            .filter(|(_, value)| matches!(value, FilterValue::Envelope(_)))
            .count();
        if envelopes > 1 {
            warn!(
                entity = self.metadata.entity_type(),
                envelopes, "filter has several search envelopes, using the first"
            );
        }
        Ok(find_envelope(values)?.page_request())
    }
}

fn resolve_field(metadata: &EntityMetadata, field: &str) -> Result<String> {
    metadata.resolve(field).map(str::to_string).ok_or_else(|| {
        RepositoryError::Configuration(format!(
            "{} has no field \"{field}\"",
            metadata.entity_type()
        ))
    })
}
