//! Renders predicates into store expression syntax.
//!
//! Attribute names are always referenced through `#n<i>` placeholders and
//! values through `:v<i>` placeholders, so reserved words and special
//! characters never reach the expression text.

use std::collections::HashMap;

use crate::metadata::MatchMode;
use crate::storage::WriteCondition;
use crate::value::{AttrValue, Item};

use super::{FilterPredicate, KeyPredicate};

/// Placeholder maps accompanying rendered expressions.
///
/// Empty maps are `None` because the store rejects empty placeholder maps.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Placeholders {
    pub names: Option<HashMap<String, String>>,
    pub values: Option<HashMap<String, AttrValue>>,
}

/// Allocates placeholders while rendering expressions.
#[derive(Debug, Default)]
pub struct ExpressionBuilder {
    names: HashMap<String, String>,
    name_lookup: HashMap<String, String>,
    values: HashMap<String, AttrValue>,
}

impl ExpressionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn name(&mut self, attribute: &str) -> String {
        if let Some(placeholder) = self.name_lookup.get(attribute) {
            return placeholder.clone();
        }
        let placeholder = format!("#n{}", self.names.len());
        self.names.insert(placeholder.clone(), attribute.to_string());
        self.name_lookup
            .insert(attribute.to_string(), placeholder.clone());
        placeholder
    }

    fn value(&mut self, value: AttrValue) -> String {
        let placeholder = format!(":v{}", self.values.len());
        self.values.insert(placeholder.clone(), value);
        placeholder
    }

    fn value_list(&mut self, values: &[AttrValue]) -> String {
        values
            .iter()
            .map(|v| self.value(v.clone()))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Renders key predicates joined with `AND`. `None` when there are none.
    pub fn key_condition(&mut self, predicates: &[KeyPredicate]) -> Option<String> {
        if predicates.is_empty() {
            return None;
        }
        let parts: Vec<String> = predicates
            .iter()
            .map(|predicate| match predicate {
                KeyPredicate::Equal { attribute, value } => {
                    let n = self.name(attribute);
                    let v = self.value(value.clone());
                    format!("{n} = {v}")
                }
                KeyPredicate::BeginsWith { attribute, prefix } => {
                    let n = self.name(attribute);
                    let v = self.value(AttrValue::S(prefix.clone()));
                    format!("begins_with({n}, {v})")
                }
            })
            .collect();
        Some(parts.join(" AND "))
    }

    /// Renders filter predicates, each parenthesised, joined with `AND`.
    pub fn filter(&mut self, predicates: &[FilterPredicate]) -> Option<String> {
        if predicates.is_empty() {
            return None;
        }
        let parts: Vec<String> = predicates
            .iter()
            .map(|predicate| format!("({})", self.filter_term(predicate)))
            .collect();
        Some(parts.join(" AND "))
    }

    fn filter_term(&mut self, predicate: &FilterPredicate) -> String {
        match predicate {
            FilterPredicate::Equality { attribute, value } => {
                let n = self.name(attribute);
                let v = self.value(value.clone());
                format!("{n} = {v}")
            }
            FilterPredicate::Inequality { attribute, value } => {
                let n = self.name(attribute);
                let v = self.value(value.clone());
                format!("{n} <> {v}")
            }
            FilterPredicate::NumericRange {
                attribute,
                lower,
                upper,
            } => {
                let n = self.name(attribute);
                let mut parts = Vec::with_capacity(2);
                if let Some(bound) = lower {
                    let op = if bound.inclusive { ">=" } else { ">" };
                    let v = self.value(AttrValue::number(bound.value));
                    parts.push(format!("{n} {op} {v}"));
                }
                if let Some(bound) = upper {
                    let op = if bound.inclusive { "<=" } else { "<" };
                    let v = self.value(AttrValue::number(bound.value));
                    parts.push(format!("{n} {op} {v}"));
                }
                parts.join(" AND ")
            }
            FilterPredicate::HalfOpenRange {
                attribute,
                start,
                end,
            } => {
                let n = self.name(attribute);
                let lo = self.value(start.clone());
                let hi = self.value(end.clone());
                format!("{n} >= {lo} AND {n} < {hi}")
            }
            FilterPredicate::StringMatch {
                attribute,
                mode,
                value,
            } => {
                let n = self.name(attribute);
                let v = self.value(AttrValue::S(value.clone()));
                match mode {
                    MatchMode::Prefix => format!("begins_with({n}, {v})"),
                    MatchMode::Contains => format!("contains({n}, {v})"),
                    MatchMode::Equal => format!("{n} = {v}"),
                }
            }
            FilterPredicate::Membership { attribute, values } => {
                let n = self.name(attribute);
                let list = self.value_list(values);
                format!("{n} IN ({list})")
            }
            FilterPredicate::ExclusionMembership { attribute, values } => {
                let n = self.name(attribute);
                let list = self.value_list(values);
                format!("NOT ({n} IN ({list}))")
            }
        }
    }

    /// Renders a projection list. `None` when empty.
    pub fn projection(&mut self, attributes: &[String]) -> Option<String> {
        if attributes.is_empty() {
            return None;
        }
        let names: Vec<String> = attributes.iter().map(|a| self.name(a)).collect();
        Some(names.join(", "))
    }

    /// Renders a write condition.
    pub fn condition(&mut self, condition: &WriteCondition) -> String {
        match condition {
            WriteCondition::NotExists { key_attribute } => {
                format!("attribute_not_exists({})", self.name(key_attribute))
            }
            WriteCondition::Exists { key_attribute } => {
                format!("attribute_exists({})", self.name(key_attribute))
            }
            WriteCondition::VersionEquals {
                key_attribute,
                version_attribute,
                version,
            } => {
                let k = self.name(key_attribute);
                let n = self.name(version_attribute);
                let v = self.value(AttrValue::int(*version));
                // Rows written without a version read as version 0.
                if *version == 0 {
                    format!("attribute_exists({k}) AND (attribute_not_exists({n}) OR {n} = {v})")
                } else {
                    format!("attribute_exists({k}) AND {n} = {v}")
                }
            }
        }
    }

    /// Renders a `SET` update clause. Attributes are sorted for stable output.
    pub fn update_set(&mut self, updates: &Item) -> Option<String> {
        if updates.is_empty() {
            return None;
        }
        let mut attributes: Vec<&String> = updates.keys().collect();
        attributes.sort();
        let assignments: Vec<String> = attributes
            .into_iter()
            .map(|attribute| {
                let n = self.name(attribute);
                let v = self.value(updates[attribute].clone());
                format!("{n} = {v}")
            })
            .collect();
        Some(format!("SET {}", assignments.join(", ")))
    }

    /// Consumes the builder, returning the placeholder maps.
    pub fn finish(self) -> Placeholders {
        Placeholders {
            names: (!self.names.is_empty()).then_some(self.names),
            values: (!self.values.is_empty()).then_some(self.values),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::Bound;

    #[test]
    fn test_filter_renders_each_predicate_in_parens() {
        let mut builder = ExpressionBuilder::new();
        let filter = builder
            .filter(&[
                FilterPredicate::Inequality {
                    attribute: "age".to_string(),
                    value: AttrValue::int(3),
                },
                FilterPredicate::StringMatch {
                    attribute: "name".to_string(),
                    mode: MatchMode::Prefix,
                    value: "ab".to_string(),
                },
            ])
            .unwrap();

        assert_eq!(filter, "(#n0 <> :v0) AND (begins_with(#n1, :v1))");

        let placeholders = builder.finish();
        let names = placeholders.names.unwrap();
        assert_eq!(names["#n0"], "age");
        assert_eq!(names["#n1"], "name");
        let values = placeholders.values.unwrap();
        assert_eq!(values[":v1"], AttrValue::from("ab"));
    }

    #[test]
    fn test_numeric_range_lower_only_has_single_comparison() {
        let mut builder = ExpressionBuilder::new();
        let filter = builder
            .filter(&[FilterPredicate::NumericRange {
                attribute: "score".to_string(),
                lower: Some(Bound::exclusive(5.0)),
                upper: None,
            }])
            .unwrap();

        assert_eq!(filter, "(#n0 > :v0)");
    }

    #[test]
    fn test_half_open_range_reuses_name_placeholder() {
        let mut builder = ExpressionBuilder::new();
        let filter = builder
            .filter(&[FilterPredicate::HalfOpenRange {
                attribute: "createdAt".to_string(),
                start: AttrValue::from("2023-01-01"),
                end: AttrValue::from("2023-02-01"),
            }])
            .unwrap();

        assert_eq!(filter, "(#n0 >= :v0 AND #n0 < :v1)");
    }

    #[test]
    fn test_exclusion_membership_renders_not_in() {
        let mut builder = ExpressionBuilder::new();
        let filter = builder
            .filter(&[FilterPredicate::ExclusionMembership {
                attribute: "status".to_string(),
                values: vec![AttrValue::from("a"), AttrValue::from("b")],
            }])
            .unwrap();

        assert_eq!(filter, "(NOT (#n0 IN (:v0, :v1)))");
    }

    #[test]
    fn test_key_condition_joins_with_and() {
        let mut builder = ExpressionBuilder::new();
        let key = builder
            .key_condition(&[
                KeyPredicate::Equal {
                    attribute: "tenant".to_string(),
                    value: AttrValue::from("acme"),
                },
                KeyPredicate::BeginsWith {
                    attribute: "sk".to_string(),
                    prefix: "USER#".to_string(),
                },
            ])
            .unwrap();

        assert_eq!(key, "#n0 = :v0 AND begins_with(#n1, :v1)");
    }

    #[test]
    fn test_version_condition() {
        let mut builder = ExpressionBuilder::new();
        let condition = builder.condition(&WriteCondition::VersionEquals {
            key_attribute: "id".to_string(),
            version_attribute: "version".to_string(),
            version: 4,
        });

        assert_eq!(condition, "attribute_exists(#n0) AND #n1 = :v0");
        assert_eq!(builder.finish().values.unwrap()[":v0"], AttrValue::int(4));
    }

    #[test]
    fn test_update_set_is_sorted() {
        let mut updates = Item::new();
        updates.insert("b".to_string(), AttrValue::int(2));
        updates.insert("a".to_string(), AttrValue::int(1));

        let mut builder = ExpressionBuilder::new();
        let set = builder.update_set(&updates).unwrap();

        assert_eq!(set, "SET #n0 = :v0, #n1 = :v1");
        assert_eq!(builder.finish().names.unwrap()["#n0"], "a");
    }

    #[test]
    fn test_empty_builder_has_no_placeholders() {
        let builder = ExpressionBuilder::new();
        assert_eq!(builder.finish(), Placeholders::default());
    }
}
