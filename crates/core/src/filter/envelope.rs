use std::collections::BTreeMap;

use crate::paging::PageRequest;
use crate::value::AttrValue;

/// Search options embedded in a filter model.
///
/// Carries the free-text keyword, per-field exclusions, the projection and
/// the requested page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchEnvelope {
    /// Free-text keyword applied to `keyword`-annotated text fields.
    pub keyword: String,
    /// Logical field name -> values the field must not take.
    pub excluding: BTreeMap<String, Vec<AttrValue>>,
    /// Storage attribute names to project. Empty means all attributes.
    pub fields: Vec<String>,
    /// Sort request; a leading `-` or trailing ` desc` means descending.
    pub sort: String,
    /// 1-based page index.
    pub page_index: u64,
    pub page_size: u64,
    /// Size of the first page when it differs from `page_size`; 0 disables.
    pub first_page_size: u64,
}

impl SearchEnvelope {
    /// Envelope requesting `page_index` with `page_size` items per page.
    pub fn page(page_index: u64, page_size: u64) -> Self {
        Self {
            page_index,
            page_size,
            ..Default::default()
        }
    }

    pub fn with_keyword(mut self, keyword: impl Into<String>) -> Self {
        self.keyword = keyword.into();
        self
    }

    pub fn with_first_page_size(mut self, first_page_size: u64) -> Self {
        self.first_page_size = first_page_size;
        self
    }

    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn excluding(mut self, field: impl Into<String>, values: Vec<AttrValue>) -> Self {
        self.excluding.insert(field.into(), values);
        self
    }

    pub fn with_sort(mut self, sort: impl Into<String>) -> Self {
        self.sort = sort.into();
        self
    }

    /// Whether the sort request asks for descending order.
    pub fn is_descending(&self) -> bool {
        let sort = self.sort.trim();
        sort.starts_with('-') || sort.to_ascii_lowercase().ends_with(" desc")
    }

    pub fn page_request(&self) -> PageRequest {
        PageRequest::new(self.page_index, self.page_size, self.first_page_size)
    }
}
