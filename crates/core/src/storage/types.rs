use crate::value::{AttrValue, Item};

/// A condition attached to a single-item write.
///
/// Evaluated by the store atomically with the write; a failed check surfaces
/// as [`RepositoryError::ConditionFailed`](super::RepositoryError::ConditionFailed).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteCondition {
    /// The item must not exist yet (`attribute_not_exists(key)`).
    NotExists { key_attribute: String },
    /// The item must already exist (`attribute_exists(key)`).
    Exists { key_attribute: String },
    /// The item must exist and carry exactly `version`.
    VersionEquals {
        key_attribute: String,
        version_attribute: String,
        version: i64,
    },
}

impl WriteCondition {
    /// Whether the condition holds for the currently stored item, if any.
    pub fn holds(&self, stored: Option<&Item>) -> bool {
        match (self, stored) {
            (WriteCondition::NotExists { key_attribute }, item) => {
                item.is_none_or(|item| !item.contains_key(key_attribute))
            }
            (WriteCondition::Exists { key_attribute }, Some(item)) => {
                item.contains_key(key_attribute)
            }
            (
                WriteCondition::VersionEquals {
                    key_attribute,
                    version_attribute,
                    version,
                },
                Some(item),
            ) => {
                let stored_version = match item.get(version_attribute) {
                    None | Some(AttrValue::Null) => Some(0),
                    Some(value) => value.as_i64(),
                };
                item.contains_key(key_attribute) && stored_version == Some(*version)
            }
            (_, None) => false,
        }
    }
}

/// One physical page returned by the store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    /// Decoded items on this page.
    pub items: Vec<Item>,
    /// Item count the store reported for this page.
    pub count: i64,
    /// Continuation key; `None` when the result stream is exhausted.
    pub last_evaluated_key: Option<Item>,
}

/// Output of a batch read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchGetOutput {
    pub items: Vec<Item>,
    /// Keys the store did not process; retrying them is up to the caller.
    pub unprocessed_keys: Vec<Item>,
}
