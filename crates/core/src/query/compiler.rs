//! Translates a filter model into filter predicates.
//!
//! Fields are visited in declaration order. Each field contributes zero or
//! more predicates according to its kind; a field whose storage name cannot
//! be resolved on the result model is skipped without error.

use crate::expression::{Bound, FilterPredicate};
use crate::filter::{FilterValue, NumberRange, SearchEnvelope};
use crate::metadata::{EntityMetadata, FieldMetadata};
use crate::storage::{RepositoryError, Result};
use crate::value::AttrValue;

/// Output of [`compile_conditions`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompiledConditions {
    pub predicates: Vec<FilterPredicate>,
    /// Storage attributes to project; empty means all.
    pub projection: Vec<String>,
    /// Trimmed keyword from the envelope, if any.
    pub keyword: Option<String>,
    /// The envelope that drove exclusions and projection.
    pub envelope: Option<SearchEnvelope>,
}

/// Compiles filter-model values into predicates.
///
/// `filter_meta` supplies the `match`/`keyword` annotations of the filter
/// model; `result_meta` maps logical names to storage names of the entity
/// being searched. Only the first search envelope is honoured.
pub fn compile_conditions(
    values: &[(&'static str, FilterValue)],
    filter_meta: &EntityMetadata,
    result_meta: &EntityMetadata,
) -> Result<CompiledConditions> {
    let envelope_position = values
        .iter()
        .position(|(_, value)| matches!(value, FilterValue::Envelope(_)));

    let mut compiled = CompiledConditions::default();

    if let Some(position) = envelope_position {
        if let FilterValue::Envelope(envelope) = &values[position].1 {
            let keyword = envelope.keyword.trim();
            if !keyword.is_empty() {
                compiled.keyword = Some(keyword.to_string());
            }
            compiled.envelope = Some(envelope.clone());
        }
    }

    for (position, (name, value)) in values.iter().enumerate() {
        match value {
            FilterValue::Envelope(envelope) => {
                if Some(position) == envelope_position {
                    compile_envelope(envelope, result_meta, &mut compiled);
                }
            }
            other => {
                let Some(attribute) = result_meta.resolve(name) else {
                    continue;
                };
                let field = filter_meta.field(name);
                if let Some(predicate) =
                    compile_field(attribute, field, other, compiled.keyword.as_deref())?
                {
                    compiled.predicates.push(predicate);
                }
            }
        }
    }

    Ok(compiled)
}

fn compile_envelope(
    envelope: &SearchEnvelope,
    result_meta: &EntityMetadata,
    compiled: &mut CompiledConditions,
) {
    for (field, excluded) in &envelope.excluding {
        if excluded.is_empty() {
            continue;
        }
        if let Some(attribute) = result_meta.resolve(field) {
            compiled.predicates.push(FilterPredicate::ExclusionMembership {
                attribute: attribute.to_string(),
                values: excluded.clone(),
            });
        }
    }
    if !envelope.fields.is_empty() {
        compiled.projection = envelope.fields.clone();
    }
}

fn compile_field(
    attribute: &str,
    field: Option<&FieldMetadata>,
    value: &FilterValue,
    keyword: Option<&str>,
) -> Result<Option<FilterPredicate>> {
    let predicate = match value {
        FilterValue::Envelope(_) => None,
        FilterValue::DateRange(Some(range)) => {
            let (start, end) = range.bounds();
            Some(half_open(attribute, start, end))
        }
        FilterValue::TimeRange(Some(range)) => {
            let (start, end) = range.bounds();
            Some(half_open(attribute, start, end))
        }
        FilterValue::DateRange(None) | FilterValue::TimeRange(None) => None,
        FilterValue::NumberRange(Some(range)) => numeric_range(attribute, range),
        FilterValue::NumberRange(None) => None,
        FilterValue::List(values) if values.is_empty() => None,
        FilterValue::List(values) => Some(FilterPredicate::Membership {
            attribute: attribute.to_string(),
            values: values.clone(),
        }),
        FilterValue::Text(text) => text_match(attribute, field, text, keyword)?,
        FilterValue::Bool(b) => b.then(|| inequality(attribute, AttrValue::Bool(true))),
        FilterValue::Int(i) => (*i != 0).then(|| inequality(attribute, AttrValue::int(*i))),
        FilterValue::Float(f) => (*f != 0.0).then(|| inequality(attribute, AttrValue::number(*f))),
        FilterValue::Optional(v) => v.as_ref().map(|v| inequality(attribute, v.clone())),
    };
    Ok(predicate)
}

fn text_match(
    attribute: &str,
    field: Option<&FieldMetadata>,
    text: &str,
    keyword: Option<&str>,
) -> Result<Option<FilterPredicate>> {
    if !text.is_empty() {
        let mode = field
            .map(FieldMetadata::match_mode)
            .transpose()?
            .flatten()
            .ok_or_else(|| {
                RepositoryError::Configuration(format!(
                    "missing match annotation for text field \"{attribute}\""
                ))
            })?;
        return Ok(Some(FilterPredicate::StringMatch {
            attribute: attribute.to_string(),
            mode,
            value: text.to_string(),
        }));
    }

    let Some(keyword) = keyword else {
        return Ok(None);
    };
    let mode = field.map(FieldMetadata::keyword_mode).transpose()?.flatten();
    Ok(mode.map(|mode| FilterPredicate::StringMatch {
        attribute: attribute.to_string(),
        mode,
        value: keyword.to_string(),
    }))
}

fn numeric_range(attribute: &str, range: &NumberRange) -> Option<FilterPredicate> {
    let lower = range
        .min
        .map(Bound::inclusive)
        .or(range.lower.map(Bound::exclusive));
    let upper = range
        .max
        .map(Bound::inclusive)
        .or(range.upper.map(Bound::exclusive));

    if lower.is_none() && upper.is_none() {
        return None;
    }
    Some(FilterPredicate::NumericRange {
        attribute: attribute.to_string(),
        lower,
        upper,
    })
}

fn half_open(attribute: &str, start: AttrValue, end: AttrValue) -> FilterPredicate {
    FilterPredicate::HalfOpenRange {
        attribute: attribute.to_string(),
        start,
        end,
    }
}

// Non-zero scalars exclude their value rather than select it.
fn inequality(attribute: &str, value: AttrValue) -> FilterPredicate {
    FilterPredicate::Inequality {
        attribute: attribute.to_string(),
        value,
    }
}
