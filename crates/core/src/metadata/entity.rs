//! Precomputed field-name maps for one model type.

use std::collections::HashMap;

use super::FieldMetadata;

/// Field metadata table for a model type.
///
/// Built once at registration and shared read-only afterwards.
#[derive(Debug, Clone)]
pub struct EntityMetadata {
    entity_type: &'static str,
    fields: Vec<FieldMetadata>,
    by_logical: HashMap<&'static str, usize>,
    by_storage: HashMap<&'static str, usize>,
    json_to_storage: HashMap<&'static str, &'static str>,
}

impl EntityMetadata {
    /// Creates the table. Fields keep their declaration order.
    pub fn new(entity_type: &'static str, fields: Vec<FieldMetadata>) -> Self {
        let mut by_logical = HashMap::with_capacity(fields.len());
        let mut by_storage = HashMap::with_capacity(fields.len());
        let mut json_to_storage = HashMap::with_capacity(fields.len());

        for (index, field) in fields.iter().enumerate() {
            by_logical.entry(field.logical_name).or_insert(index);
            by_storage.entry(field.storage_name()).or_insert(index);
            json_to_storage
                .entry(field.serialized_name())
                .or_insert(field.storage_name());
        }

        Self {
            entity_type,
            fields,
            by_logical,
            by_storage,
            json_to_storage,
        }
    }

    pub fn entity_type(&self) -> &'static str {
        self.entity_type
    }

    pub fn fields(&self) -> &[FieldMetadata] {
        &self.fields
    }

    /// Looks up a field by its logical name.
    pub fn field(&self, logical_name: &str) -> Option<&FieldMetadata> {
        self.by_logical.get(logical_name).map(|&i| &self.fields[i])
    }

    /// Resolves a logical field name to its storage attribute name.
    ///
    /// `None` means the field is not registered; callers skip such fields.
    pub fn resolve(&self, logical_name: &str) -> Option<&'static str> {
        self.field(logical_name).map(FieldMetadata::storage_name)
    }

    /// Resolves a storage attribute name to `(field index, logical name)`.
    pub fn resolve_by_storage_name(&self, storage_name: &str) -> Option<(usize, &'static str)> {
        self.by_storage
            .get(storage_name)
            .map(|&i| (i, self.fields[i].logical_name))
    }

    /// Translates a serialized (JSON) attribute name to its storage name.
    ///
    /// Unknown names pass through unchanged.
    pub fn json_to_storage<'a>(&self, json_name: &'a str) -> &'a str {
        match self.json_to_storage.get(json_name) {
            Some(&storage) => storage,
            None => json_name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_metadata() -> EntityMetadata {
        EntityMetadata::new(
            "User",
            vec![
                FieldMetadata::new("id").storage("PK"),
                FieldMetadata::new("display_name").json("displayName"),
                FieldMetadata::new("age"),
            ],
        )
    }

    #[test]
    fn test_resolve_logical_to_storage() {
        let meta = user_metadata();
        assert_eq!(meta.resolve("id"), Some("PK"));
        assert_eq!(meta.resolve("display_name"), Some("displayName"));
        assert_eq!(meta.resolve("age"), Some("age"));
    }

    #[test]
    fn test_resolve_unknown_field_is_none() {
        assert_eq!(user_metadata().resolve("email"), None);
    }

    #[test]
    fn test_resolve_by_storage_name() {
        let meta = user_metadata();
        assert_eq!(meta.resolve_by_storage_name("PK"), Some((0, "id")));
        assert_eq!(
            meta.resolve_by_storage_name("displayName"),
            Some((1, "display_name"))
        );
        assert_eq!(meta.resolve_by_storage_name("id"), None);
    }

    #[test]
    fn test_json_storage_translation() {
        let meta = user_metadata();
        assert_eq!(meta.json_to_storage("id"), "PK");
        assert_eq!(meta.json_to_storage("displayName"), "displayName");
        assert_eq!(meta.json_to_storage("unknown"), "unknown");
    }
}
