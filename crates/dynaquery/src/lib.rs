//! Annotated-model data access for DynamoDB.
//!
//! Builds on `dynaquery_core` with the parts that talk to a store: the
//! page-replay searcher, the optimistic-concurrency writer, the typed
//! [`Repository`] facade and the store backends.

pub mod config;
pub mod repository;
pub mod search;
pub mod storage;
pub mod writer;

pub use config::Config;
pub use repository::Repository;
pub use search::PageReplaySearcher;
pub use writer::ConcurrencyGuard;
