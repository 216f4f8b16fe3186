//! Per-field metadata and behavioural annotations.

use std::fmt;

use crate::storage::{RepositoryError, Result};

/// How a textual field is matched against stored values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    /// `begins_with(attribute, value)`
    Prefix,
    /// `contains(attribute, value)`
    Contains,
    /// `attribute = value`
    Equal,
}

impl MatchMode {
    /// Parses a raw annotation value.
    ///
    /// Unknown values are a [`RepositoryError::Configuration`] error.
    pub fn parse(annotation: &str) -> Result<Self> {
        match annotation.trim() {
            "prefix" => Ok(MatchMode::Prefix),
            "contains" | "contain" => Ok(MatchMode::Contains),
            "equal" => Ok(MatchMode::Equal),
            other => Err(RepositoryError::Configuration(format!(
                "match not supported: \"{other}\""
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MatchMode::Prefix => "prefix",
            MatchMode::Contains => "contains",
            MatchMode::Equal => "equal",
        }
    }
}

impl fmt::Display for MatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Registration record for one model field.
///
/// Storage name resolution order: explicit storage name, then the JSON
/// (serde) name, then the logical name itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMetadata {
    pub logical_name: &'static str,
    pub json_name: Option<&'static str>,
    pub storage_override: Option<&'static str>,
    /// Raw `match` annotation, parsed when a query is compiled.
    pub match_annotation: Option<&'static str>,
    /// Raw `keyword` annotation, parsed when a query is compiled.
    pub keyword_annotation: Option<&'static str>,
}

impl FieldMetadata {
    pub fn new(logical_name: &'static str) -> Self {
        Self {
            logical_name,
            json_name: None,
            storage_override: None,
            match_annotation: None,
            keyword_annotation: None,
        }
    }

    /// Sets the serialization name (what `serde` writes for this field).
    pub fn json(mut self, name: &'static str) -> Self {
        self.json_name = Some(name);
        self
    }

    /// Sets the storage attribute name, overriding the serialization name.
    pub fn storage(mut self, name: &'static str) -> Self {
        self.storage_override = Some(name);
        self
    }

    /// Sets the `match` annotation used when the field carries a literal value.
    pub fn matching(mut self, annotation: &'static str) -> Self {
        self.match_annotation = Some(annotation);
        self
    }

    /// Sets the `keyword` annotation used when only a free-text keyword is supplied.
    pub fn keyword(mut self, annotation: &'static str) -> Self {
        self.keyword_annotation = Some(annotation);
        self
    }

    /// The attribute name this field is stored under. Never fails.
    pub fn storage_name(&self) -> &'static str {
        self.storage_override
            .or(self.json_name)
            .unwrap_or(self.logical_name)
    }

    /// The name `serde` uses for this field.
    pub fn serialized_name(&self) -> &'static str {
        self.json_name.unwrap_or(self.logical_name)
    }

    /// Parsed `match` annotation, `None` when the field has none.
    pub fn match_mode(&self) -> Result<Option<MatchMode>> {
        self.match_annotation.map(MatchMode::parse).transpose()
    }

    /// Parsed `keyword` annotation, `None` when the field has none.
    pub fn keyword_mode(&self) -> Result<Option<MatchMode>> {
        self.keyword_annotation.map(MatchMode::parse).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_name_prefers_override() {
        let field = FieldMetadata::new("user_id").json("userId").storage("PK");
        assert_eq!(field.storage_name(), "PK");
    }

    #[test]
    fn test_storage_name_falls_back_to_json() {
        let field = FieldMetadata::new("user_id").json("userId");
        assert_eq!(field.storage_name(), "userId");
    }

    #[test]
    fn test_storage_name_falls_back_to_logical() {
        let field = FieldMetadata::new("status");
        assert_eq!(field.storage_name(), "status");
        assert_eq!(field.serialized_name(), "status");
    }

    #[test]
    fn test_match_mode_parse() {
        assert_eq!(MatchMode::parse("prefix").unwrap(), MatchMode::Prefix);
        assert_eq!(MatchMode::parse("contains").unwrap(), MatchMode::Contains);
        assert_eq!(MatchMode::parse("contain").unwrap(), MatchMode::Contains);
        assert_eq!(MatchMode::parse("equal").unwrap(), MatchMode::Equal);
    }

    #[test]
    fn test_match_mode_parse_unknown_is_configuration_error() {
        let result = MatchMode::parse("fuzzy");
        assert!(matches!(result, Err(RepositoryError::Configuration(_))));
    }

    #[test]
    fn test_missing_annotation_is_none() {
        let field = FieldMetadata::new("name");
        assert_eq!(field.match_mode().unwrap(), None);
        assert_eq!(field.keyword_mode().unwrap(), None);
    }
}
