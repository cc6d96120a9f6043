//! Error types for store operations.

use std::io;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A persisted file could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The referenced record does not exist.
    #[error("record {local_id} not found in {table}")]
    NotFound {
        /// Table that was searched.
        table: &'static str,
        /// Local identifier that was requested.
        local_id: u64,
    },

    /// A record violated a model invariant.
    #[error("invalid record: {0}")]
    Invalid(#[from] fintrack_model::ModelError),
}
