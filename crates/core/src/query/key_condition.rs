//! Derives a key condition for an index from the filter model.

use crate::expression::KeyPredicate;
use crate::filter::FilterValue;
use crate::metadata::{EntityMetadata, MatchMode};
use crate::storage::{RepositoryError, Result};
use crate::value::AttrValue;

use super::descriptor::SecondaryIndex;

/// Builds key predicates for every index key the filter model supplies.
///
/// Index key attributes are located on the filter model by storage name. A
/// key the model does not carry, or carries as an empty value with no
/// keyword to fall back on, is left out, so the result may cover only part
/// of the index key.
///
/// Text keys only become `begins_with` under a `prefix` annotation. An
/// `equal` annotation, or none, gives an equality term instead of an error,
/// since a partition key can only be matched exactly; `contains` is rejected.
pub fn resolve_key_condition(
    values: &[(&'static str, FilterValue)],
    filter_meta: &EntityMetadata,
    index: &SecondaryIndex,
    keyword: Option<&str>,
) -> Result<Vec<KeyPredicate>> {
    let mut predicates = Vec::with_capacity(index.keys.len());

    for key in &index.keys {
        let Some((position, logical_name)) = filter_meta.resolve_by_storage_name(key) else {
            continue;
        };
        let Some((_, value)) = values.iter().find(|(name, _)| *name == logical_name) else {
            continue;
        };
        let field = &filter_meta.fields()[position];

        let predicate = match value {
            FilterValue::Text(text) if !text.is_empty() => {
                string_key(key, field.match_mode()?, text)?
            }
            FilterValue::Text(_) => match keyword {
                Some(keyword) => match field.keyword_mode()? {
                    Some(mode) => string_key(key, Some(mode), keyword)?,
                    None => None,
                },
                None => None,
            },
            FilterValue::Int(i) if *i != 0 => Some(equal(key, AttrValue::int(*i))),
            FilterValue::Float(f) if *f != 0.0 => Some(equal(key, AttrValue::number(*f))),
            FilterValue::Int(_) | FilterValue::Float(_) => {
                return Err(unsupported_key_type(key));
            }
            FilterValue::Optional(None) => None,
            FilterValue::Optional(Some(value)) if value.is_key_type() => {
                Some(equal(key, value.clone()))
            }
            _ => return Err(unsupported_key_type(key)),
        };

        if let Some(predicate) = predicate {
            predicates.push(predicate);
        }
    }

    Ok(predicates)
}

// String keys support prefix matching; an `equal` annotation, or none at all,
// pins the key to the exact value as partition keys require.
fn string_key(key: &str, mode: Option<MatchMode>, value: &str) -> Result<Option<KeyPredicate>> {
    match mode {
        Some(MatchMode::Prefix) => Ok(Some(KeyPredicate::BeginsWith {
            attribute: key.to_string(),
            prefix: value.to_string(),
        })),
        Some(MatchMode::Equal) | None => Ok(Some(equal(key, AttrValue::from(value)))),
        Some(MatchMode::Contains) => Err(RepositoryError::Configuration(format!(
            "match not supported for this format on key \"{key}\""
        ))),
    }
}

fn equal(key: &str, value: AttrValue) -> KeyPredicate {
    KeyPredicate::Equal {
        attribute: key.to_string(),
        value,
    }
}

fn unsupported_key_type(key: &str) -> RepositoryError {
    RepositoryError::Configuration(format!(
        "key condition not supported for this type on key \"{key}\""
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::FieldMetadata;

    fn filter_meta() -> EntityMetadata {
        EntityMetadata::new(
            "OrderFilter",
            vec![
                FieldMetadata::new("tenant").storage("TenantId"),
                FieldMetadata::new("id").matching("prefix").keyword("prefix"),
                FieldMetadata::new("sku").matching("contains"),
                FieldMetadata::new("region").matching("equal"),
                FieldMetadata::new("active"),
            ],
        )
    }

    fn index() -> SecondaryIndex {
        SecondaryIndex::new("GSI1", ["TenantId", "id"])
    }

    #[test]
    fn test_partial_key_condition_when_sort_key_missing() {
        let values = vec![("tenant", FilterValue::Int(42))];

        let predicates = resolve_key_condition(&values, &filter_meta(), &index(), None).unwrap();

        assert_eq!(
            predicates,
            vec![KeyPredicate::Equal {
                attribute: "TenantId".to_string(),
                value: AttrValue::int(42),
            }]
        );
    }

    #[test]
    fn test_string_keys_equal_and_prefix() {
        let values = vec![
            ("tenant", FilterValue::Text("acme".to_string())),
            ("id", FilterValue::Text("ord-".to_string())),
        ];

        let predicates = resolve_key_condition(&values, &filter_meta(), &index(), None).unwrap();

        assert_eq!(
            predicates,
            vec![
                KeyPredicate::Equal {
                    attribute: "TenantId".to_string(),
                    value: AttrValue::from("acme"),
                },
                KeyPredicate::BeginsWith {
                    attribute: "id".to_string(),
                    prefix: "ord-".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_empty_string_key_falls_back_to_keyword() {
        let values = vec![
            ("tenant", FilterValue::Int(1)),
            ("id", FilterValue::Text(String::new())),
        ];

        let predicates =
            resolve_key_condition(&values, &filter_meta(), &index(), Some("ord")).unwrap();

        assert_eq!(
            predicates[1],
            KeyPredicate::BeginsWith {
                attribute: "id".to_string(),
                prefix: "ord".to_string(),
            }
        );
    }

    #[test]
    fn test_empty_string_key_without_keyword_is_skipped() {
        let values = vec![
            ("tenant", FilterValue::Int(1)),
            ("id", FilterValue::Text(String::new())),
        ];

        let predicates = resolve_key_condition(&values, &filter_meta(), &index(), None).unwrap();

        assert_eq!(predicates.len(), 1);
    }

    #[test]
    fn test_empty_key_without_keyword_annotation_is_skipped() {
        let index = SecondaryIndex::new("GSI2", ["region"]);
        let values = vec![("region", FilterValue::Text(String::new()))];

        let predicates = resolve_key_condition(&values, &filter_meta(), &index, Some("eu")).unwrap();

        assert!(predicates.is_empty());
    }

    #[test]
    fn test_contains_on_key_is_rejected() {
        let index = SecondaryIndex::new("GSI3", ["sku"]);
        let values = vec![("sku", FilterValue::Text("abc".to_string()))];

        let result = resolve_key_condition(&values, &filter_meta(), &index, None);

        assert!(matches!(result, Err(RepositoryError::Configuration(_))));
    }

    #[test]
    fn test_zero_number_key_is_rejected() {
        let values = vec![("tenant", FilterValue::Int(0))];
        let result = resolve_key_condition(&values, &filter_meta(), &index(), None);
        assert!(matches!(result, Err(RepositoryError::Configuration(_))));
    }

    #[test]
    fn test_bool_key_is_rejected() {
        let index = SecondaryIndex::new("GSI4", ["active"]);
        let values = vec![("active", FilterValue::Bool(true))];

        let result = resolve_key_condition(&values, &filter_meta(), &index, None);

        assert!(matches!(result, Err(RepositoryError::Configuration(_))));
    }

    #[test]
    fn test_key_not_on_filter_model_is_skipped() {
        let index = SecondaryIndex::new("GSI5", ["customer"]);
        let values = vec![("tenant", FilterValue::Int(1))];

        let predicates = resolve_key_condition(&values, &filter_meta(), &index, None).unwrap();

        assert!(predicates.is_empty());
    }
}
