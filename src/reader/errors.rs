//! # Reader Errors
//!
//! Failures surfaced by a [`Reader`](super::Reader). The display text is
//! passed through verbatim to HTTP callers.

use thiserror::Error;

/// Result type for reader operations
pub type ReaderResult<T> = Result<T, ReaderError>;

/// Reader errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReaderError {
    /// The family/table pair does not exist in the replica
    #[error("table not found: {family}___{table}")]
    TableNotFound { family: String, table: String },

    /// The key does not fit the table's primary key
    #[error("{0}")]
    KeyMismatch(String),

    /// The store could not be reached, or failed mid-operation
    #[error("{0}")]
    Unavailable(String),

    /// Reading the replica failed
    #[error("replica read failed: {0}")]
    Io(String),

    /// The replica contents could not be interpreted
    #[error("replica corrupt: {0}")]
    Corrupt(String),
}

impl ReaderError {
    pub fn table_not_found(family: &str, table: &str) -> Self {
        Self::TableNotFound {
            family: family.to_string(),
            table: table.to_string(),
        }
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }
}
