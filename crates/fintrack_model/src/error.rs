//! Error types for model operations.

use thiserror::Error;

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors raised by model-level invariants and decoding.
#[derive(Error, Debug)]
pub enum ModelError {
    /// A remote identifier of zero was offered as an assignment.
    #[error("remote id 0 is the unassigned marker and cannot be assigned")]
    UnassignedRemoteId,

    /// The record already carries a different remote identifier.
    #[error("record {local_id} already has remote id {current}, refusing {offered}")]
    RemoteIdConflict {
        /// Local identifier of the record.
        local_id: u64,
        /// Remote identifier already assigned.
        current: u64,
        /// Remote identifier that was offered.
        offered: u64,
    },

    /// JSON decoding failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
