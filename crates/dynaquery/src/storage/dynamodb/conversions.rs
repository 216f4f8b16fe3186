//! DynamoDB attribute conversion functions.
//!
//! Pure functions between `AttributeValue` maps and the core's [`Item`].
//! These are testable in isolation without DynamoDB access.

use std::collections::HashMap;

use aws_sdk_dynamodb::types::AttributeValue;
use dynaquery_core::storage::RepositoryError;
use dynaquery_core::value::{AttrValue, Item};

/// Convert a core attribute value to the SDK representation.
pub fn to_attribute_value(value: AttrValue) -> AttributeValue {
    match value {
        AttrValue::S(s) => AttributeValue::S(s),
        AttrValue::N(n) => AttributeValue::N(n),
        AttrValue::Bool(b) => AttributeValue::Bool(b),
        AttrValue::Null => AttributeValue::Null(true),
        AttrValue::L(values) => {
            AttributeValue::L(values.into_iter().map(to_attribute_value).collect())
        }
        AttrValue::M(map) => AttributeValue::M(to_sdk_item(map)),
    }
}

/// Convert an SDK attribute value to the core representation.
///
/// String and number sets become lists; binary values are rejected.
pub fn from_attribute_value(value: AttributeValue) -> Result<AttrValue, RepositoryError> {
    Ok(match value {
        AttributeValue::S(s) => AttrValue::S(s),
        AttributeValue::N(n) => AttrValue::N(n),
        AttributeValue::Bool(b) => AttrValue::Bool(b),
        AttributeValue::Null(_) => AttrValue::Null,
        AttributeValue::L(values) => AttrValue::L(
            values
                .into_iter()
                .map(from_attribute_value)
                .collect::<Result<_, _>>()?,
        ),
        AttributeValue::M(map) => AttrValue::M(from_sdk_item(map)?),
        AttributeValue::Ss(values) => AttrValue::L(values.into_iter().map(AttrValue::S).collect()),
        AttributeValue::Ns(values) => AttrValue::L(values.into_iter().map(AttrValue::N).collect()),
        other => {
            return Err(RepositoryError::InvalidData(format!(
                "Unsupported attribute type: {other:?}"
            )))
        }
    })
}

/// Convert a core item to a DynamoDB item.
pub fn to_sdk_item(item: Item) -> HashMap<String, AttributeValue> {
    item.into_iter()
        .map(|(name, value)| (name, to_attribute_value(value)))
        .collect()
}

/// Convert a DynamoDB item to a core item.
pub fn from_sdk_item(item: HashMap<String, AttributeValue>) -> Result<Item, RepositoryError> {
    item.into_iter()
        .map(|(name, value)| Ok((name, from_attribute_value(value)?)))
        .collect()
}

/// Convert an optional placeholder value map.
pub fn to_sdk_values(
    values: Option<HashMap<String, AttrValue>>,
) -> Option<HashMap<String, AttributeValue>> {
    values.map(to_sdk_item)
}
