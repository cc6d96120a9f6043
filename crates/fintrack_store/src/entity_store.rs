//! Entity store trait definition.

use crate::error::StoreResult;
use fintrack_model::SyncEntity;

/// CRUD access to one record kind, keyed by local identifier.
///
/// The store owns record lifecycles. The reconciliation engine only reads
/// records and writes back server-issued remote identifiers.
///
/// # Invariants
///
/// - `put` inserts or replaces by `local_id`
/// - `get` returns exactly what the last `put` stored
/// - Implementations must be `Send + Sync`
pub trait EntityStore<E: SyncEntity>: Send + Sync {
    /// Loads a record.
    ///
    /// Returns `Ok(None)` if no record has this local identifier.
    fn get(&self, local_id: u64) -> StoreResult<Option<E>>;

    /// Inserts or replaces a record.
    fn put(&self, entity: &E) -> StoreResult<()>;

    /// Removes a record, returning it if it existed.
    fn remove(&self, local_id: u64) -> StoreResult<Option<E>>;

    /// Returns all records ordered by local identifier.
    fn list(&self) -> StoreResult<Vec<E>>;

    /// Returns the next free local identifier.
    fn next_local_id(&self) -> StoreResult<u64> {
        Ok(self
            .list()?
            .iter()
            .map(SyncEntity::local_id)
            .max()
            .unwrap_or(0)
            + 1)
    }
}
