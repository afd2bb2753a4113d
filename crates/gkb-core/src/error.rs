//! Error types for the storage projection and the query engine.

use thiserror::Error;

/// Errors surfaced by the MariaDB storage projection.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Database connection error.
    #[error("database connection error: {0}")]
    Connection(String),

    /// Query execution error.
    #[error("query error: {0}")]
    Query(String),

    /// Row not found.
    #[error("not found: {entity} {id}")]
    NotFound { entity: String, id: String },

    /// Constraint violation (e.g. unique key).
    #[error("constraint violation: {0}")]
    Constraint(String),

    /// A relation triple not declared in the union of source schemas.
    #[error("schema violation: ({from_type})-[{relation_type}]->({to_type}) is not declared by any source")]
    SchemaViolation {
        from_type: String,
        relation_type: String,
        to_type: String,
    },

    /// Serialization or deserialization of a stored blob failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Connection pool exhausted.
    #[error("connection pool exhausted")]
    PoolExhausted,

    /// Invalid store configuration.
    #[error("invalid database configuration: {0}")]
    Configuration(String),

    /// A database round-trip exceeded its deadline.
    #[error("database operation timed out")]
    Timeout,
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StoreError::NotFound {
                entity: "row".to_string(),
                id: "unknown".to_string(),
            },
            sqlx::Error::Database(db_err) => {
                if db_err.is_unique_violation() {
                    StoreError::Constraint(db_err.message().to_string())
                } else {
                    StoreError::Query(db_err.message().to_string())
                }
            }
            sqlx::Error::PoolTimedOut => StoreError::PoolExhausted,
            sqlx::Error::Configuration(msg) => StoreError::Configuration(msg.to_string()),
            sqlx::Error::Io(e) => StoreError::Connection(e.to_string()),
            _ => StoreError::Query(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

/// Errors surfaced by the query engine.
///
/// `Parse` and `Plan` are reported back to the caller without retry; a query
/// that fails parsing never opens a cursor.
#[derive(Error, Debug)]
pub enum QueryError {
    /// The query text is not a valid query.
    #[error("parse error: {0}")]
    Parse(String),

    /// The query is valid but cannot be lowered onto the storage projection.
    #[error("plan error: {0}")]
    Plan(String),

    /// The execution deadline elapsed.
    #[error("query timed out")]
    Timeout,

    /// The caller cancelled the query.
    #[error("query cancelled")]
    Cancelled,

    /// The storage layer failed underneath the cursor.
    #[error(transparent)]
    Storage(#[from] StoreError),
}
