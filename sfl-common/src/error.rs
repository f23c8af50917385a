//! Common error types for SFL

use thiserror::Error;

/// Common result type for SFL operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across SFL crates
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding/decoding error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Classifier returned a label outside POSITIVE/NEUTRAL/NEGATIVE
    #[error("Invalid sentiment label: {0}")]
    InvalidLabel(String),

    /// Malformed or calendar-invalid period label
    #[error("Invalid period label: {0}")]
    InvalidPeriod(String),

    /// Fetch source or classifier unavailable
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether a store write failing with this error may be retried.
    ///
    /// Only transport-level failures qualify. Validation errors never do.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Database(sqlx::Error::PoolTimedOut) => true,
            Error::Database(sqlx::Error::Io(_)) => true,
            Error::Database(db_err) => {
                let msg = db_err.to_string();
                msg.contains("database is locked") || msg.contains("database is busy")
            }
            Error::Io(_) => true,
            _ => false,
        }
    }
}
