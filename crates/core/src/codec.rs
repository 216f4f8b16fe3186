//! Model registration and conversion between models and stored items.
//!
//! Models serialize through `serde_json`; attribute names are then renamed
//! from their serialized name to their storage name using the model's
//! [`EntityMetadata`].

use std::collections::HashMap;
use std::fmt;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::metadata::EntityMetadata;
use crate::storage::{RepositoryError, Result};
use crate::value::{AttrValue, Item};

/// A type that can be stored in a table.
pub trait Model: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Field table for this type. Called once per repository.
    fn metadata() -> EntityMetadata;
}

/// Identifies an item by its key attribute values.
#[derive(Debug, Clone, PartialEq)]
pub enum Id {
    /// A partition-key-only table.
    Single(AttrValue),
    /// Key values in key declaration order.
    Composite(Vec<AttrValue>),
    /// Key values by storage attribute name.
    Named(HashMap<String, AttrValue>),
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Id::Single(value) => write!(f, "{value}"),
            Id::Composite(values) => {
                let parts: Vec<String> = values.iter().map(ToString::to_string).collect();
                write!(f, "{}", parts.join("/"))
            }
            Id::Named(map) => write!(f, "{}", AttrValue::M(map.clone())),
        }
    }
}

impl From<&str> for Id {
    fn from(value: &str) -> Self {
        Id::Single(AttrValue::from(value))
    }
}

impl From<String> for Id {
    fn from(value: String) -> Self {
        Id::Single(AttrValue::from(value))
    }
}

impl From<i64> for Id {
    fn from(value: i64) -> Self {
        Id::Single(AttrValue::int(value))
    }
}

impl From<Vec<AttrValue>> for Id {
    fn from(values: Vec<AttrValue>) -> Self {
        Id::Composite(values)
    }
}

/// Builds a key map for `keys` (storage names, in key order) from an id.
pub fn build_key_map(keys: &[String], id: &Id) -> Result<Item> {
    let pairs: Vec<(String, AttrValue)> = match id {
        Id::Single(value) => {
            ensure_arity(keys.len(), 1)?;
            vec![(keys[0].clone(), value.clone())]
        }
        Id::Composite(values) => {
            ensure_arity(keys.len(), values.len())?;
            keys.iter().cloned().zip(values.iter().cloned()).collect()
        }
        Id::Named(map) => {
            ensure_arity(keys.len(), map.len())?;
            keys.iter()
                .map(|key| {
                    map.get(key)
                        .map(|value| (key.clone(), value.clone()))
                        .ok_or_else(|| {
                            RepositoryError::Validation(format!(
                                "wrong mapping key and value: missing \"{key}\""
                            ))
                        })
                })
                .collect::<Result<_>>()?
        }
    };

    for (key, value) in &pairs {
        if !value.is_key_type() {
            return Err(RepositoryError::Validation(format!(
                "data type not supported for key \"{key}\": {value}"
            )));
        }
    }

    Ok(pairs.into_iter().collect())
}

fn ensure_arity(expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        return Err(RepositoryError::Validation(format!(
            "wrong mapping key and value: expected {expected} key values, got {actual}"
        )));
    }
    Ok(())
}

/// Extracts the key attributes of `item`.
pub fn key_from_item(keys: &[String], item: &Item) -> Result<Item> {
    keys.iter()
        .map(|key| {
            item.get(key)
                .filter(|value| value.is_key_type())
                .map(|value| (key.clone(), value.clone()))
                .ok_or_else(|| {
                    RepositoryError::Validation(format!("item has no key attribute \"{key}\""))
                })
        })
        .collect()
}

/// Renders a key map as a human-readable id, in key order.
pub fn key_label(keys: &[String], key: &Item) -> String {
    keys.iter()
        .filter_map(|k| key.get(k).map(ToString::to_string))
        .collect::<Vec<_>>()
        .join("/")
}

/// Encodes a model into a stored item. Top-level nulls are omitted.
pub fn encode_item<M: Serialize>(model: &M, metadata: &EntityMetadata) -> Result<Item> {
    let value =
        serde_json::to_value(model).map_err(|e| RepositoryError::Serialization(e.to_string()))?;
    let Value::Object(map) = value else {
        return Err(RepositoryError::Serialization(format!(
            "{} does not serialize to an object",
            metadata.entity_type()
        )));
    };
    Ok(encode_fields(map, metadata))
}

/// Encodes a JSON object of serialized field names into storage attributes.
pub fn encode_fields(map: Map<String, Value>, metadata: &EntityMetadata) -> Item {
    map.into_iter()
        .filter(|(_, value)| !value.is_null())
        .map(|(name, value)| {
            (
                metadata.json_to_storage(&name).to_string(),
                AttrValue::from_json(value),
            )
        })
        .collect()
}

/// Decodes a stored item into a model.
pub fn decode_item<M: DeserializeOwned>(item: Item, metadata: &EntityMetadata) -> Result<M> {
    let mut object = Map::with_capacity(item.len());
    for (name, value) in item {
        object.insert(metadata.storage_to_json(&name).to_string(), value.into_json()?);
    }
    serde_json::from_value(Value::Object(object)).map_err(|e| {
        RepositoryError::InvalidData(format!(
            "cannot decode {}: {e}",
            metadata.entity_type()
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::FieldMetadata;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct User {
        id: String,
        display_name: String,
        nickname: Option<String>,
        version: i64,
    }

    impl Model for User {
        fn metadata() -> EntityMetadata {
            EntityMetadata::new(
                "User",
                vec![
                    FieldMetadata::new("id").storage("PK"),
                    FieldMetadata::new("display_name").json("displayName"),
                    FieldMetadata::new("nickname"),
                    FieldMetadata::new("version"),
                ],
            )
        }
    }

    fn keys(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_encode_renames_and_drops_nulls() {
        let user = User {
            id: "u1".to_string(),
            display_name: "Ada".to_string(),
            nickname: None,
            version: 2,
        };

        let item = encode_item(&user, &User::metadata()).unwrap();

        assert_eq!(item.get("PK"), Some(&AttrValue::from("u1")));
        assert_eq!(item.get("displayName"), Some(&AttrValue::from("Ada")));
        assert_eq!(item.get("version"), Some(&AttrValue::int(2)));
        assert!(!item.contains_key("nickname"));
    }

    #[test]
    fn test_decode_restores_serialized_names() {
        let item: Item = [
            ("PK".to_string(), AttrValue::from("u1")),
            ("displayName".to_string(), AttrValue::from("Ada")),
            ("version".to_string(), AttrValue::int(1)),
        ]
        .into_iter()
        .collect();

        let user: User = decode_item(item, &User::metadata()).unwrap();

        assert_eq!(user.id, "u1");
        assert_eq!(user.display_name, "Ada");
        assert_eq!(user.nickname, None);
    }

    #[test]
    fn test_decode_bad_shape_is_invalid_data() {
        let item: Item = [("PK".to_string(), AttrValue::int(5))].into_iter().collect();
        let result: Result<User> = decode_item(item, &User::metadata());
        assert!(matches!(result, Err(RepositoryError::InvalidData(_))));
    }

    #[test]
    fn test_encode_fields_for_patch() {
        let map = json!({"displayName": "Grace", "nickname": null})
            .as_object()
            .cloned()
            .unwrap();

        let item = encode_fields(map, &User::metadata());

        assert_eq!(item.len(), 1);
        assert_eq!(item.get("displayName"), Some(&AttrValue::from("Grace")));
    }

    #[test]
    fn test_build_key_map_single_and_composite() {
        let single = build_key_map(&keys(&["PK"]), &Id::from("u1")).unwrap();
        assert_eq!(single.get("PK"), Some(&AttrValue::from("u1")));

        let composite = build_key_map(
            &keys(&["PK", "SK"]),
            &Id::Composite(vec![AttrValue::from("u1"), AttrValue::int(3)]),
        )
        .unwrap();
        assert_eq!(composite.get("SK"), Some(&AttrValue::int(3)));
    }

    #[test]
    fn test_build_key_map_arity_mismatch() {
        let result = build_key_map(&keys(&["PK", "SK"]), &Id::from("u1"));
        assert!(matches!(result, Err(RepositoryError::Validation(_))));
    }

    #[test]
    fn test_build_key_map_named_requires_every_key() {
        let named = Id::Named(
            [("PK".to_string(), AttrValue::from("u1")), ("X".to_string(), AttrValue::int(1))]
                .into_iter()
                .collect(),
        );
        let result = build_key_map(&keys(&["PK", "SK"]), &named);
        assert!(matches!(result, Err(RepositoryError::Validation(_))));
    }

    #[test]
    fn test_build_key_map_rejects_non_key_type() {
        let result = build_key_map(&keys(&["PK"]), &Id::Single(AttrValue::Bool(true)));
        assert!(matches!(result, Err(RepositoryError::Validation(_))));
    }

    #[test]
    fn test_key_from_item_and_label() {
        let item: Item = [
            ("PK".to_string(), AttrValue::from("u1")),
            ("SK".to_string(), AttrValue::int(3)),
            ("name".to_string(), AttrValue::from("Ada")),
        ]
        .into_iter()
        .collect();
        let keys = keys(&["PK", "SK"]);

        let key = key_from_item(&keys, &item).unwrap();

        assert_eq!(key.len(), 2);
        assert_eq!(key_label(&keys, &key), "u1/3");
    }

    #[test]
    fn test_key_from_item_missing_key() {
        let item = Item::new();
        let result = key_from_item(&keys(&["PK"]), &item);
        assert!(matches!(result, Err(RepositoryError::Validation(_))));
    }
}
