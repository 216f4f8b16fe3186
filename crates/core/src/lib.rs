//! Functional core for dynaquery.
//!
//! Pure translation of annotated models into store queries and writes:
//! - field metadata and the model codec
//! - filter models, predicates and expression rendering
//! - key-condition resolution and query assembly
//! - page arithmetic and version checks
//!
//! The [`storage::ItemStore`] trait is the only boundary to I/O.

pub mod codec;
pub mod expression;
pub mod filter;
pub mod metadata;
pub mod paging;
pub mod query;
pub mod storage;
pub mod value;
pub mod version;
