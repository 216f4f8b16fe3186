//! Store boundary: the error taxonomy, the `ItemStore` trait and its I/O types.

mod error;
mod traits;
mod types;

pub use error::{DateRangeError, RepositoryError, Result};
pub use traits::ItemStore;
pub use types::{BatchGetOutput, Page, WriteCondition};
