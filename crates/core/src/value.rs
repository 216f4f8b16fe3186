//! Store-agnostic attribute values.
//!
//! Pure data types mirroring the store's attribute encoding. The DynamoDB
//! backend converts these to and from `aws_sdk_dynamodb::types::AttributeValue`;
//! everything in the core works on [`AttrValue`] only.

use std::collections::HashMap;
use std::fmt;

use serde_json::{Map, Number, Value};

use crate::storage::RepositoryError;

/// A single stored item, keyed by storage attribute name.
pub type Item = HashMap<String, AttrValue>;

/// An attribute value as understood by the store.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    /// String.
    S(String),
    /// Number, kept as its decimal string representation.
    N(String),
    /// Boolean.
    Bool(bool),
    /// Explicit null.
    Null,
    /// Ordered list.
    L(Vec<AttrValue>),
    /// Nested map.
    M(HashMap<String, AttrValue>),
}

impl AttrValue {
    /// Builds a number value from a float, dropping the fraction for integral values.
    pub fn number(value: f64) -> Self {
        AttrValue::N(format_number(value))
    }

    /// Builds a number value from an integer.
    pub fn int(value: i64) -> Self {
        AttrValue::N(value.to_string())
    }

    /// Returns the string payload, if this is a string.
    pub fn as_s(&self) -> Option<&str> {
        match self {
            AttrValue::S(s) => Some(s),
            _ => None,
        }
    }

    /// Parses the number payload as a float.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttrValue::N(n) => n.parse().ok(),
            _ => None,
        }
    }

    /// Parses the number payload as an integer.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            AttrValue::N(n) => n.parse().ok(),
            _ => None,
        }
    }

    /// Whether the value can be used as a key attribute (string or number).
    pub fn is_key_type(&self) -> bool {
        matches!(self, AttrValue::S(_) | AttrValue::N(_))
    }

    /// Converts a JSON value into an attribute value.
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Null => AttrValue::Null,
            Value::Bool(b) => AttrValue::Bool(b),
            Value::Number(n) => AttrValue::N(n.to_string()),
            Value::String(s) => AttrValue::S(s),
            Value::Array(values) => {
                AttrValue::L(values.into_iter().map(AttrValue::from_json).collect())
            }
            Value::Object(map) => AttrValue::M(
                map.into_iter()
                    .map(|(k, v)| (k, AttrValue::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Converts the attribute value back into JSON.
    pub fn into_json(self) -> Result<Value, RepositoryError> {
        Ok(match self {
            AttrValue::Null => Value::Null,
            AttrValue::Bool(b) => Value::Bool(b),
            AttrValue::S(s) => Value::String(s),
            AttrValue::N(n) => Value::Number(parse_json_number(&n)?),
            AttrValue::L(values) => Value::Array(
                values
                    .into_iter()
                    .map(AttrValue::into_json)
                    .collect::<Result<_, _>>()?,
            ),
            AttrValue::M(map) => {
                let mut object = Map::with_capacity(map.len());
                for (k, v) in map {
                    object.insert(k, v.into_json()?);
                }
                Value::Object(object)
            }
        })
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::S(s) => write!(f, "{s}"),
            AttrValue::N(n) => write!(f, "{n}"),
            AttrValue::Bool(b) => write!(f, "{b}"),
            AttrValue::Null => write!(f, "null"),
            AttrValue::L(values) => {
                let parts: Vec<String> = values.iter().map(|v| v.to_string()).collect();
                write!(f, "[{}]", parts.join(","))
            }
            AttrValue::M(map) => {
                let mut keys: Vec<&String> = map.keys().collect();
                keys.sort();
                let parts: Vec<String> = keys
                    .into_iter()
                    .map(|k| format!("{k}={}", map[k]))
                    .collect();
                write!(f, "{{{}}}", parts.join(","))
            }
        }
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        AttrValue::S(value.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        AttrValue::S(value)
    }
}

impl From<i64> for AttrValue {
    fn from(value: i64) -> Self {
        AttrValue::int(value)
    }
}

impl From<i32> for AttrValue {
    fn from(value: i32) -> Self {
        AttrValue::int(value as i64)
    }
}

impl From<f64> for AttrValue {
    fn from(value: f64) -> Self {
        AttrValue::number(value)
    }
}

impl From<bool> for AttrValue {
    fn from(value: bool) -> Self {
        AttrValue::Bool(value)
    }
}

/// Formats a float the way the store expects numbers: `3` rather than `3.0`.
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

fn parse_json_number(n: &str) -> Result<Number, RepositoryError> {
    if let Ok(i) = n.parse::<i64>() {
        return Ok(Number::from(i));
    }
    n.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .ok_or_else(|| RepositoryError::InvalidData(format!("Invalid number: {n}")))
}
