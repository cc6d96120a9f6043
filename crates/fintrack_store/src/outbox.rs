//! Outbox store trait definition and replay ordering.

use crate::error::StoreResult;
use fintrack_model::ChangeLogEntry;
use std::cmp::Reverse;

/// Order in which pending entries are returned for replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReplayOrder {
    /// Oldest timestamp first. Replays mutations in causal order.
    #[default]
    OldestFirst,
    /// Newest timestamp first.
    ///
    /// Matches the legacy `ORDER BY lastSyncedTimestamp DESC` query. An
    /// update recorded after a create is then replayed before it and is
    /// discarded as stale, so this order is only kept for compatibility.
    NewestFirst,
}

impl ReplayOrder {
    /// Sorts entries in place. Ties on timestamp fall back to entry id.
    pub fn sort(self, entries: &mut [ChangeLogEntry]) {
        match self {
            ReplayOrder::OldestFirst => {
                entries.sort_by_key(|e| (e.last_synced_timestamp, e.id));
            }
            ReplayOrder::NewestFirst => {
                entries.sort_by_key(|e| Reverse((e.last_synced_timestamp, e.id)));
            }
        }
    }
}

/// Ordered collection of pending change-log entries.
///
/// # Invariants
///
/// - `append` assigns a unique, increasing `id`
/// - Entries are never modified after `append`
/// - `remove` deletes by `id` and tolerates entries that are already gone
pub trait OutboxStore: Send + Sync {
    /// Returns the pending entries of one table in replay order.
    fn list_pending(&self, table: &str, order: ReplayOrder) -> StoreResult<Vec<ChangeLogEntry>>;

    /// Appends an entry and returns it with its assigned id.
    fn append(&self, entry: ChangeLogEntry) -> StoreResult<ChangeLogEntry>;

    /// Removes an entry. Returns false if it was not present.
    fn remove(&self, entry: &ChangeLogEntry) -> StoreResult<bool>;

    /// Returns the number of entries across all tables.
    fn len(&self) -> StoreResult<usize>;

    /// Returns true if no entries are pending in any table.
    fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }
}
