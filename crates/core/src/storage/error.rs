use thiserror::Error;

/// Errors that can occur when constructing a date range.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DateRangeError {
    #[error("Invalid date range: start date must be before or equal to end date")]
    InvalidRange,
}

/// Errors that can occur while compiling queries or talking to the store.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    /// A field annotation carries a value the compiler cannot use.
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("{entity_type} not found: {id}")]
    NotFound {
        entity_type: &'static str,
        id: String,
    },
    /// The stored version differs from the version carried by the model.
    #[error("{entity_type} {id} is at version {actual}, write carried version {expected}")]
    VersionConflict {
        entity_type: &'static str,
        id: String,
        /// Version carried by the write.
        expected: i64,
        /// Version held by the store.
        actual: i64,
    },
    /// The store rejected a conditional write.
    #[error("Condition check failed: {0}")]
    ConditionFailed(String),
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    #[error("Query failed: {0}")]
    QueryFailed(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

/// Result type for repository operations.
pub type Result<T> = std::result::Result<T, RepositoryError>;
