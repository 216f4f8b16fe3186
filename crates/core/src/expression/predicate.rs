use std::cmp::Ordering;

use crate::metadata::MatchMode;
use crate::value::{AttrValue, Item};

/// One side of a numeric range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bound {
    pub value: f64,
    pub inclusive: bool,
}

impl Bound {
    pub fn inclusive(value: f64) -> Self {
        Self {
            value,
            inclusive: true,
        }
    }

    pub fn exclusive(value: f64) -> Self {
        Self {
            value,
            inclusive: false,
        }
    }
}

/// A filter condition on a single attribute.
///
/// Filter predicates are always combined with logical AND, in the order the
/// compiler emitted them.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterPredicate {
    Equality {
        attribute: String,
        value: AttrValue,
    },
    /// `attribute <> value`
    Inequality {
        attribute: String,
        value: AttrValue,
    },
    NumericRange {
        attribute: String,
        lower: Option<Bound>,
        upper: Option<Bound>,
    },
    /// `start <= attribute < end`
    HalfOpenRange {
        attribute: String,
        start: AttrValue,
        end: AttrValue,
    },
    StringMatch {
        attribute: String,
        mode: MatchMode,
        value: String,
    },
    Membership {
        attribute: String,
        values: Vec<AttrValue>,
    },
    ExclusionMembership {
        attribute: String,
        values: Vec<AttrValue>,
    },
}

impl FilterPredicate {
    pub fn attribute(&self) -> &str {
        match self {
            FilterPredicate::Equality { attribute, .. }
            | FilterPredicate::Inequality { attribute, .. }
            | FilterPredicate::NumericRange { attribute, .. }
            | FilterPredicate::HalfOpenRange { attribute, .. }
            | FilterPredicate::StringMatch { attribute, .. }
            | FilterPredicate::Membership { attribute, .. }
            | FilterPredicate::ExclusionMembership { attribute, .. } => attribute,
        }
    }

    /// Evaluates the predicate against an item the way the store would.
    ///
    /// A missing attribute fails every predicate except the negative ones
    /// (`<>` and `NOT IN`), matching the store's semantics.
    pub fn matches(&self, item: &Item) -> bool {
        let actual = item.get(self.attribute());
        match self {
            FilterPredicate::Equality { value, .. } => actual == Some(value),
            FilterPredicate::Inequality { value, .. } => actual != Some(value),
            FilterPredicate::NumericRange { lower, upper, .. } => {
                let Some(n) = actual.and_then(AttrValue::as_f64) else {
                    return false;
                };
                let above = lower.is_none_or(|b| if b.inclusive { n >= b.value } else { n > b.value });
                let below = upper.is_none_or(|b| if b.inclusive { n <= b.value } else { n < b.value });
                above && below
            }
            FilterPredicate::HalfOpenRange { start, end, .. } => match actual {
                Some(v) => {
                    matches!(
                        compare(v, start),
                        Some(Ordering::Greater | Ordering::Equal)
                    ) && compare(v, end) == Some(Ordering::Less)
                }
                None => false,
            },
            FilterPredicate::StringMatch { mode, value, .. } => {
                match actual {
                    Some(AttrValue::S(s)) => match mode {
                        MatchMode::Prefix => s.starts_with(value.as_str()),
                        MatchMode::Contains => s.contains(value.as_str()),
                        MatchMode::Equal => s == value,
                    },
                    // contains() also applies to lists
                    Some(AttrValue::L(values)) if *mode == MatchMode::Contains => {
                        values.iter().any(|v| v.as_s() == Some(value.as_str()))
                    }
                    _ => false,
                }
            }
            FilterPredicate::Membership { values, .. } => {
                actual.is_some_and(|v| values.contains(v))
            }
            FilterPredicate::ExclusionMembership { values, .. } => {
                actual.is_none_or(|v| !values.contains(v))
            }
        }
    }
}

/// A key-condition term. Only equality and prefix matching are allowed on keys.
#[derive(Debug, Clone, PartialEq)]
pub enum KeyPredicate {
    Equal { attribute: String, value: AttrValue },
    BeginsWith { attribute: String, prefix: String },
}

impl KeyPredicate {
    pub fn attribute(&self) -> &str {
        match self {
            KeyPredicate::Equal { attribute, .. } | KeyPredicate::BeginsWith { attribute, .. } => {
                attribute
            }
        }
    }

    pub fn matches(&self, item: &Item) -> bool {
        match self {
            KeyPredicate::Equal { attribute, value } => item.get(attribute) == Some(value),
            KeyPredicate::BeginsWith { attribute, prefix } => item
                .get(attribute)
                .and_then(AttrValue::as_s)
                .is_some_and(|s| s.starts_with(prefix.as_str())),
        }
    }
}

/// Orders two values of the same scalar type; `None` for mixed or non-scalar types.
pub fn compare(a: &AttrValue, b: &AttrValue) -> Option<Ordering> {
    match (a, b) {
        (AttrValue::S(a), AttrValue::S(b)) => Some(a.cmp(b)),
        (AttrValue::N(_), AttrValue::N(_)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        _ => None,
    }
}
