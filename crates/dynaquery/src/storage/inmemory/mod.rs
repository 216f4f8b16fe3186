//! In-memory store for tests and local development.
//!
//! Tables live in `HashMap`s behind `Arc<RwLock<_>>`. Query, scan, paging and
//! conditional-write semantics follow DynamoDB closely enough for the
//! searcher and the concurrency guard to behave as they do in production.
//!
//! # Example
//!
//! ```rust,ignore
//! use dynaquery::storage::inmemory::InMemoryStore;
//!
//! let store = InMemoryStore::new().with_table("users", ["id"]);
//! ```

mod store;

pub use store::InMemoryStore;
