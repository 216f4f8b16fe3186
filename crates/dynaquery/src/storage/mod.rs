//! Store implementations.
//!
//! This module provides concrete implementations of the `ItemStore` trait
//! defined in `dynaquery_core::storage`, selected via feature flags.
//!
//! # Feature Flags
//!
//! - `inmemory` (default): in-memory store for tests and local development
//! - `dynamodb`: AWS DynamoDB store using `aws-sdk-dynamodb`
//!
//! # Examples
//!
//! Build with DynamoDB:
//! ```bash
//! cargo build -p dynaquery --features dynamodb
//! ```

#[cfg(not(any(feature = "inmemory", feature = "dynamodb")))]
compile_error!(
    "No store selected. Enable 'inmemory' or 'dynamodb' feature. \
    Example: cargo build -p dynaquery --features dynamodb"
);

#[cfg(feature = "inmemory")]
pub mod inmemory;

#[cfg(feature = "dynamodb")]
pub mod dynamodb;

#[cfg(feature = "inmemory")]
pub use inmemory::InMemoryStore;

#[cfg(feature = "dynamodb")]
pub use dynamodb::DynamoDbStore;
