//! Field metadata tables.
//!
//! Each model registers its fields once; the compiler and the codec only ever
//! read these tables.

mod entity;
mod field;

pub use entity::EntityMetadata;
pub use field::{FieldMetadata, MatchMode};
