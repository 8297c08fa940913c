//! # Row Source Errors

use thiserror::Error;

/// Result type for row source operations
pub type SourceResult<T> = Result<T, SourceError>;

/// Row source errors
///
/// None of these are retried by the stream driver.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SourceError {
    /// The executor refused the query before producing any row
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// No connection could be obtained
    #[error("Database unavailable: {0}")]
    Unavailable(String),

    /// Execution failed after the cursor was opened
    #[error("Query execution failed: {0}")]
    Execution(String),

    /// A value could not be mapped onto a row value
    #[error("Invalid value in column '{column}': {reason}")]
    InvalidValue { column: String, reason: String },
}

impl From<rusqlite::Error> for SourceError {
    fn from(err: rusqlite::Error) -> Self {
        SourceError::Execution(err.to_string())
    }
}
