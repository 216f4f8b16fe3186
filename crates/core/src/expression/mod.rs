//! Predicate trees and their rendering into store expressions.

mod builder;
mod predicate;

pub use builder::{ExpressionBuilder, Placeholders};
pub use predicate::{compare, Bound, FilterPredicate, KeyPredicate};
