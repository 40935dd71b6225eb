//! Custom error types for the common library
//!
//! Database-level errors shared across the MoveOut backend. Callers treat
//! database errors as non-retriable within a single request; pool
//! exhaustion is surfaced separately so clients can retry.

use sqlx::Error as SqlxError;
use thiserror::Error;

/// Custom error type for database operations
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Error occurred during database connection
    #[error("Database connection error: {0}")]
    Connection(#[source] SqlxError),

    /// Error occurred during database query execution
    #[error("Database query error: {0}")]
    Query(#[source] SqlxError),

    /// Connection pool exhausted before a session could be acquired
    #[error("Database pool timed out")]
    PoolTimeout,

    /// Error occurred while applying migrations
    #[error("Database migration error: {0}")]
    Migration(String),

    /// Configuration error
    #[error("Database configuration error: {0}")]
    Configuration(String),
}

impl DatabaseError {
    /// Classify a raw sqlx error, splitting out pool exhaustion
    pub fn from_query(err: SqlxError) -> Self {
        match err {
            SqlxError::PoolTimedOut => DatabaseError::PoolTimeout,
            other => DatabaseError::Query(other),
        }
    }

    /// Whether a client-side retry of the whole request may succeed
    pub fn is_retriable(&self) -> bool {
        matches!(self, DatabaseError::PoolTimeout)
    }
}

/// Type alias for Result with DatabaseError
pub type DatabaseResult<T> = Result<T, DatabaseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_timeout_is_retriable() {
        let err = DatabaseError::from_query(SqlxError::PoolTimedOut);
        assert!(matches!(err, DatabaseError::PoolTimeout));
        assert!(err.is_retriable());
    }

    #[test]
    fn test_query_error_is_not_retriable() {
        let err = DatabaseError::from_query(SqlxError::RowNotFound);
        assert!(!err.is_retriable());
    }
}
