use std::collections::HashMap;

use crate::expression::{ExpressionBuilder, FilterPredicate, KeyPredicate};
use crate::value::AttrValue;

/// An index the caller queries through, with its key attributes in order.
///
/// An empty name addresses the base table's primary key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecondaryIndex {
    pub name: String,
    pub keys: Vec<String>,
}

impl SecondaryIndex {
    pub fn new<I, S>(name: impl Into<String>, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }

    /// The base table's primary key.
    pub fn table<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new("", keys)
    }

    /// Index name to send to the store; `None` for the base table.
    pub fn index_name(&self) -> Option<&str> {
        (!self.name.is_empty()).then_some(self.name.as_str())
    }
}

/// Which attributes a read returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectMode {
    AllAttributes,
    SpecificAttributes,
}

/// A fully assembled read, ready for the store.
///
/// `key_condition` is `Some` exactly for index-scoped queries; `None` means
/// a scan.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryDescriptor {
    pub table: String,
    pub index_name: Option<String>,
    pub key_condition: Option<Vec<KeyPredicate>>,
    pub filter: Vec<FilterPredicate>,
    pub projection: Vec<String>,
    pub select: SelectMode,
    /// Sort-key order for queries; ignored by scans.
    pub scan_forward: bool,
}

impl QueryDescriptor {
    /// An unrestricted scan returning every attribute.
    pub fn full_scan(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            index_name: None,
            key_condition: None,
            filter: Vec::new(),
            projection: Vec::new(),
            select: SelectMode::AllAttributes,
            scan_forward: true,
        }
    }

    pub fn is_scan(&self) -> bool {
        self.key_condition.is_none()
    }

    /// Renders the descriptor into expression strings and placeholder maps.
    pub fn render(&self) -> RenderedQuery {
        let mut builder = ExpressionBuilder::new();
        let key_condition = self
            .key_condition
            .as_deref()
            .and_then(|predicates| builder.key_condition(predicates));
        let filter = builder.filter(&self.filter);
        let projection = builder.projection(&self.projection);
        let placeholders = builder.finish();

        RenderedQuery {
            key_condition,
            filter,
            projection,
            names: placeholders.names,
            values: placeholders.values,
        }
    }
}

/// Expression strings for one query or scan request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderedQuery {
    pub key_condition: Option<String>,
    pub filter: Option<String>,
    pub projection: Option<String>,
    pub names: Option<HashMap<String, String>>,
    pub values: Option<HashMap<String, AttrValue>>,
}
