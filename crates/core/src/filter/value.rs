use crate::metadata::EntityMetadata;
use crate::storage::{RepositoryError, Result};
use crate::value::AttrValue;

use super::{DateRange, NumberRange, SearchEnvelope, TimeRange};

/// The value of one filter-model field, tagged by kind.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Envelope(SearchEnvelope),
    DateRange(Option<DateRange>),
    TimeRange(Option<TimeRange>),
    NumberRange(Option<NumberRange>),
    List(Vec<AttrValue>),
    Text(String),
    Bool(bool),
    Int(i64),
    Float(f64),
    /// A nullable scalar; `None` contributes nothing.
    Optional(Option<AttrValue>),
}

/// A filter model: a struct whose fields drive query compilation.
///
/// Implementations list their fields in declaration order. The order is
/// preserved in the compiled filter expression.
pub trait SearchFilter: Send + Sync {
    /// Field metadata for this filter type.
    fn metadata() -> EntityMetadata
    where
        Self: Sized;

    /// Current field values, keyed by logical field name.
    fn field_values(&self) -> Vec<(&'static str, FilterValue)>;
}

/// Returns the first search envelope in declaration order.
///
/// A filter without an envelope cannot be paged.
pub fn find_envelope<'a>(
    values: &'a [(&'static str, FilterValue)],
) -> Result<&'a SearchEnvelope> {
    values
        .iter()
        .find_map(|(_, value)| match value {
            FilterValue::Envelope(envelope) => Some(envelope),
            _ => None,
        })
        .ok_or_else(|| {
            RepositoryError::Validation(
                "cannot extract sort, page index, page size, first page size from model"
                    .to_string(),
            )
        })
}
