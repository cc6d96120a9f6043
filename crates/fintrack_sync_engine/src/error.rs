//! Error types for the reconciliation engine.

use fintrack_store::StoreError;
use std::fmt;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Why a change-log entry no longer describes a replayable mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaleReason {
    /// The local record was deleted before it could be synced.
    MissingRecord,
    /// The record never received a remote id, so the backend cannot address it.
    MissingRemoteId,
    /// The record already has a remote id; its create was confirmed earlier.
    AlreadyCreated,
}

impl fmt::Display for StaleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StaleReason::MissingRecord => "local record no longer exists",
            StaleReason::MissingRemoteId => "record has no remote id",
            StaleReason::AlreadyCreated => "record already has a remote id",
        })
    }
}

/// Errors that can occur during reconciliation.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Transport-level failure: timeout, refused connection, TLS.
    #[error("network error: {0}")]
    Network(String),

    /// The backend answered with a non-success status.
    #[error("server returned {status}: {body}")]
    Server {
        /// HTTP status code.
        status: u16,
        /// Response body, lossily decoded.
        body: String,
    },

    /// A non-empty success body could not be decoded.
    #[error("malformed response: {0}")]
    Parse(String),

    /// The entry references a record that cannot be replayed.
    #[error("stale entry for record {record_id} in {table}: {reason}")]
    StaleReference {
        /// Table of the entry.
        table: String,
        /// Record referenced by the entry.
        record_id: u64,
        /// Why the entry is stale.
        reason: StaleReason,
    },

    /// The entry carries a status tag the engine does not know.
    #[error("unknown log status {status:?}")]
    UnknownLogStatus {
        /// The raw tag.
        status: String,
    },

    /// The record refers to a category the backend cannot address yet.
    #[error("{table} record {local_id} refers to category {category_id}, which has no remote id")]
    UnresolvedReference {
        /// Table of the record.
        table: String,
        /// Local id of the record.
        local_id: u64,
        /// Local id of the referenced category.
        category_id: u64,
    },

    /// Local store failure.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// No reconciler is registered for the table.
    #[error("no reconciler registered for table {0}")]
    UnknownTable(String),

    /// A run for the table is already in flight.
    #[error("reconciliation of {0} already in progress")]
    RunInProgress(String),

    /// The background worker could not be started or did not finish.
    #[error("worker error: {0}")]
    Worker(String),
}

impl SyncError {
    /// Returns true if this error ends the current run.
    ///
    /// Stale references and unknown tags are handled by discarding the
    /// entry and moving on; everything else stops the batch and leaves the
    /// entry queued.
    pub fn aborts_run(&self) -> bool {
        !matches!(
            self,
            SyncError::StaleReference { .. } | SyncError::UnknownLogStatus { .. }
        )
    }

    /// Creates a stale-reference error.
    pub fn stale(table: impl Into<String>, record_id: u64, reason: StaleReason) -> Self {
        Self::StaleReference {
            table: table.into(),
            record_id,
            reason,
        }
    }
}

impl From<fintrack_model::ModelError> for SyncError {
    fn from(err: fintrack_model::ModelError) -> Self {
        SyncError::Store(StoreError::from(err))
    }
}
