//! DynamoDB store implementation.
//!
//! This module provides a DynamoDB-based [`ItemStore`](dynaquery_core::storage::ItemStore)
//! using `aws-sdk-dynamodb`.

mod client;
mod conversions;
mod error;
mod store;

pub use client::{create_client, target_display};
pub use conversions::{from_sdk_item, to_sdk_item};
pub use store::DynamoDbStore;
