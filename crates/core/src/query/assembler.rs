//! Chooses between a scan and an index query and assembles the descriptor.

use crate::expression::{FilterPredicate, KeyPredicate};
use crate::filter::FilterValue;
use crate::metadata::EntityMetadata;
use crate::storage::{RepositoryError, Result};
use crate::value::Item;

use super::compiler::{compile_conditions, CompiledConditions};
use super::descriptor::{QueryDescriptor, SecondaryIndex, SelectMode};
use super::key_condition::resolve_key_condition;

/// Combines key predicates and compiled conditions into a descriptor.
///
/// * nothing to filter, key on, or project: full scan of every attribute
/// * key predicates present: query on the index, filtered if needed
/// * otherwise: scan, filtered and/or projected
pub fn assemble_query(
    table: &str,
    index: &SecondaryIndex,
    key_predicates: Vec<KeyPredicate>,
    compiled: CompiledConditions,
) -> QueryDescriptor {
    let scan_forward = !compiled
        .envelope
        .as_ref()
        .is_some_and(|envelope| envelope.is_descending());

    let select = if compiled.projection.is_empty() {
        SelectMode::AllAttributes
    } else {
        SelectMode::SpecificAttributes
    };

    let (index_name, key_condition) = if key_predicates.is_empty() {
        (None, None)
    } else {
        (index.index_name().map(str::to_string), Some(key_predicates))
    };

    QueryDescriptor {
        table: table.to_string(),
        index_name,
        key_condition,
        filter: compiled.predicates,
        projection: compiled.projection,
        select,
        scan_forward,
    }
}

/// Compiles a filter model end to end: conditions, key condition, descriptor.
pub fn build_search_query(
    table: &str,
    index: &SecondaryIndex,
    values: &[(&'static str, FilterValue)],
    filter_meta: &EntityMetadata,
    result_meta: &EntityMetadata,
) -> Result<QueryDescriptor> {
    let mut compiled = compile_conditions(values, filter_meta, result_meta)?;
    let key_predicates =
        resolve_key_condition(values, filter_meta, index, compiled.keyword.as_deref())?;
    // The store rejects filter terms on attributes the key condition covers.
    compiled.predicates.retain(|predicate| {
        !key_predicates
            .iter()
            .any(|key| key.attribute() == predicate.attribute())
    });
    Ok(assemble_query(table, index, key_predicates, compiled))
}

/// Builds a descriptor from a plain attribute map.
///
/// `None` is a full scan. Otherwise every index key must be present and
/// becomes an equality key predicate; remaining entries become equality
/// filters.
pub fn build_map_query(
    table: &str,
    index: &SecondaryIndex,
    conditions: Option<&Item>,
) -> Result<QueryDescriptor> {
    let Some(conditions) = conditions else {
        return Ok(QueryDescriptor::full_scan(table));
    };

    let mut key_predicates = Vec::with_capacity(index.keys.len());
    for key in &index.keys {
        let value = conditions.get(key).ok_or_else(|| {
            RepositoryError::Validation(format!("missing key to query: \"{key}\""))
        })?;
        key_predicates.push(KeyPredicate::Equal {
            attribute: key.clone(),
            value: value.clone(),
        });
    }

    let mut rest: Vec<(&String, _)> = conditions
        .iter()
        .filter(|(name, _)| !index.keys.contains(*name))
        .collect();
    rest.sort_by(|a, b| a.0.cmp(b.0));

    let filter = rest
        .into_iter()
        .map(|(name, value)| FilterPredicate::Equality {
            attribute: name.clone(),
            value: value.clone(),
        })
        .collect();

    Ok(assemble_query(
        table,
        index,
        key_predicates,
        CompiledConditions {
            predicates: filter,
            ..Default::default()
        },
    ))
}
