//! Error types for the record store

use crate::types::Status;
use thiserror::Error;

/// Result type for store operations
pub type Result<T> = std::result::Result<T, Error>;

/// Store errors
#[derive(Error, Debug)]
pub enum Error {
    /// Storage error (RocksDB unreachable, transaction failure)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Record, field or counter missing
    #[error("Not found: {0}")]
    NotFound(String),

    /// Compare-and-swap lost: the stored status was not the expected one
    #[error("Status conflict for record {id}: expected {expected}, found {}", describe_actual(.actual))]
    Conflict {
        /// Record id
        id: u64,
        /// Status the caller expected
        expected: Status,
        /// Status found in the store (`None` when another writer holds the key)
        actual: Option<Status>,
    },

    /// Requested status change is not a single forward step
    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition {
        /// Current status
        from: Status,
        /// Requested status
        to: Status,
    },

    /// Stored bytes cannot be decoded
    #[error("Corrupt value: {0}")]
    Corrupt(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn describe_actual(actual: &Option<Status>) -> String {
    match actual {
        Some(status) => status.to_string(),
        None => "a concurrent writer".to_string(),
    }
}

impl Error {
    /// Whether this error is a benign lost race on a status
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Conflict { .. })
    }
}

impl From<rocksdb::Error> for Error {
    fn from(err: rocksdb::Error) -> Self {
        Error::Storage(err.to_string())
    }
}
