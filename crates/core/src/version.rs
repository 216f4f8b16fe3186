//! Optimistic-concurrency version arithmetic.

use crate::storage::{RepositoryError, Result};
use crate::value::{AttrValue, Item};

/// Version assigned to a versioned entity on insert.
pub const INITIAL_VERSION: i64 = 1;

/// Reads the version attribute of a stored item.
///
/// A missing attribute reads as 0 so rows written without a version can
/// still be updated by a caller holding version 0.
pub fn read_version(item: &Item, version_attribute: &str) -> Result<i64> {
    match item.get(version_attribute) {
        None | Some(AttrValue::Null) => Ok(0),
        Some(value) => value.as_i64().ok_or_else(|| {
            RepositoryError::InvalidData(format!(
                "version attribute \"{version_attribute}\" is not an integer: {value}"
            ))
        }),
    }
}

/// Checks the caller's version against the stored one and returns the next.
pub fn check_version(
    entity_type: &'static str,
    id: &str,
    stored: i64,
    carried: i64,
) -> Result<i64> {
    if stored != carried {
        return Err(RepositoryError::VersionConflict {
            entity_type,
            id: id.to_string(),
            expected: carried,
            actual: stored,
        });
    }
    Ok(stored + 1)
}
