//! Outbox change-log entries.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Kind of local mutation recorded in the outbox.
///
/// Tags are stored as strings. Anything that is not one of the three known
/// tags is kept verbatim as [`LogStatus::Unrecognized`] so legacy or corrupt
/// rows survive a load/store round trip and can be discarded by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LogStatus {
    /// Local create not yet confirmed remotely.
    Pending,
    /// Local update not yet confirmed remotely.
    Updated,
    /// Local delete not yet confirmed remotely.
    Deleted,
    /// Any other tag.
    Unrecognized(String),
}

impl LogStatus {
    /// Returns the stored tag.
    pub fn as_str(&self) -> &str {
        match self {
            LogStatus::Pending => "PENDING",
            LogStatus::Updated => "UPDATED",
            LogStatus::Deleted => "DELETED",
            LogStatus::Unrecognized(tag) => tag,
        }
    }

    /// Parses a stored tag. Never fails.
    pub fn parse(tag: &str) -> Self {
        match tag {
            "PENDING" => LogStatus::Pending,
            "UPDATED" => LogStatus::Updated,
            "DELETED" => LogStatus::Deleted,
            other => LogStatus::Unrecognized(other.to_string()),
        }
    }

    /// Returns true for the three tags the engine knows how to replay.
    pub fn is_recognized(&self) -> bool {
        !matches!(self, LogStatus::Unrecognized(_))
    }
}

impl From<String> for LogStatus {
    fn from(tag: String) -> Self {
        match LogStatus::parse(&tag) {
            LogStatus::Unrecognized(_) => LogStatus::Unrecognized(tag),
            known => known,
        }
    }
}

impl From<LogStatus> for String {
    fn from(status: LogStatus) -> Self {
        match status {
            LogStatus::Unrecognized(tag) => tag,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for LogStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One outstanding local mutation awaiting confirmation by the backend.
///
/// Entries are append-only: a second mutation of the same record appends a
/// new entry, so a record may have several outstanding entries at once.
/// The engine deletes an entry once it has been replayed or found stale.
///
/// For [`LogStatus::Deleted`] entries `record_id` carries the identifier the
/// backend knows the record by, since the local row no longer exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeLogEntry {
    /// Outbox-assigned identifier. Zero until appended to a store.
    pub id: u64,
    /// Logical table the mutation belongs to.
    pub table_name: String,
    /// Identifier of the mutated record.
    pub record_id: u64,
    /// Mutation kind.
    pub status: LogStatus,
    /// Milliseconds since the Unix epoch when the mutation was recorded.
    pub last_synced_timestamp: u64,
}

impl ChangeLogEntry {
    /// Creates an entry stamped with the current time.
    pub fn new(table_name: impl Into<String>, record_id: u64, status: LogStatus) -> Self {
        Self {
            id: 0,
            table_name: table_name.into(),
            record_id,
            status,
            last_synced_timestamp: now_millis(),
        }
    }

    /// Creates a PENDING entry.
    pub fn pending(table_name: impl Into<String>, record_id: u64) -> Self {
        Self::new(table_name, record_id, LogStatus::Pending)
    }

    /// Creates an UPDATED entry.
    pub fn updated(table_name: impl Into<String>, record_id: u64) -> Self {
        Self::new(table_name, record_id, LogStatus::Updated)
    }

    /// Creates a DELETED entry for the given remote identifier.
    pub fn deleted(table_name: impl Into<String>, remote_id: u64) -> Self {
        Self::new(table_name, remote_id, LogStatus::Deleted)
    }

    /// Overrides the timestamp.
    pub fn with_timestamp(mut self, millis: u64) -> Self {
        self.last_synced_timestamp = millis;
        self
    }
}

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
