//! In-memory stores for tests and ephemeral use.

use crate::entity_store::EntityStore;
use crate::error::StoreResult;
use crate::outbox::{OutboxStore, ReplayOrder};
use fintrack_model::{ChangeLogEntry, SyncEntity};
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// An in-memory entity store.
///
/// # Thread Safety
///
/// This store is thread-safe and can be shared across threads.
///
/// # Example
///
/// ```rust
/// use fintrack_model::Category;
/// use fintrack_store::{EntityStore, MemoryEntityStore};
///
/// let store = MemoryEntityStore::<Category>::new();
/// store.put(&Category::expense(1, "Rent")).unwrap();
/// assert_eq!(store.get(1).unwrap().unwrap().name, "Rent");
/// ```
#[derive(Debug)]
pub struct MemoryEntityStore<E> {
    records: RwLock<BTreeMap<u64, E>>,
}

impl<E: SyncEntity> MemoryEntityStore<E> {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: RwLock::new(BTreeMap::new()),
        }
    }

    /// Creates a store holding the given records.
    #[must_use]
    pub fn with_records(records: impl IntoIterator<Item = E>) -> Self {
        Self {
            records: RwLock::new(records.into_iter().map(|e| (e.local_id(), e)).collect()),
        }
    }

    /// Returns the number of stored records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Returns true if the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

impl<E: SyncEntity> Default for MemoryEntityStore<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: SyncEntity> EntityStore<E> for MemoryEntityStore<E> {
    fn get(&self, local_id: u64) -> StoreResult<Option<E>> {
        Ok(self.records.read().get(&local_id).cloned())
    }

    fn put(&self, entity: &E) -> StoreResult<()> {
        self.records
            .write()
            .insert(entity.local_id(), entity.clone());
        Ok(())
    }

    fn remove(&self, local_id: u64) -> StoreResult<Option<E>> {
        Ok(self.records.write().remove(&local_id))
    }

    fn list(&self) -> StoreResult<Vec<E>> {
        Ok(self.records.read().values().cloned().collect())
    }

    fn next_local_id(&self) -> StoreResult<u64> {
        Ok(self
            .records
            .read()
            .keys()
            .next_back()
            .copied()
            .unwrap_or(0)
            + 1)
    }
}

#[derive(Debug)]
struct OutboxState {
    entries: Vec<ChangeLogEntry>,
    next_id: u64,
}

/// An in-memory outbox.
///
/// Entry ids start at 1 and are never reused.
#[derive(Debug)]
pub struct MemoryOutbox {
    state: RwLock<OutboxState>,
}

impl MemoryOutbox {
    /// Creates an empty outbox.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: RwLock::new(OutboxState {
                entries: Vec::new(),
                next_id: 1,
            }),
        }
    }

    /// Returns a copy of every entry in insertion order.
    #[must_use]
    pub fn entries(&self) -> Vec<ChangeLogEntry> {
        self.state.read().entries.clone()
    }

    /// Returns true if an entry with this id is still present.
    #[must_use]
    pub fn contains(&self, id: u64) -> bool {
        self.state.read().entries.iter().any(|e| e.id == id)
    }
}

impl Default for MemoryOutbox {
    fn default() -> Self {
        Self::new()
    }
}

impl OutboxStore for MemoryOutbox {
    fn list_pending(&self, table: &str, order: ReplayOrder) -> StoreResult<Vec<ChangeLogEntry>> {
        let mut pending: Vec<_> = self
            .state
            .read()
            .entries
            .iter()
            .filter(|e| e.table_name == table)
            .cloned()
            .collect();
        order.sort(&mut pending);
        Ok(pending)
    }

    fn append(&self, mut entry: ChangeLogEntry) -> StoreResult<ChangeLogEntry> {
        let mut state = self.state.write();
        entry.id = state.next_id;
        state.next_id += 1;
        state.entries.push(entry.clone());
        Ok(entry)
    }

    fn remove(&self, entry: &ChangeLogEntry) -> StoreResult<bool> {
        let mut state = self.state.write();
        let before = state.entries.len();
        state.entries.retain(|e| e.id != entry.id);
        Ok(state.entries.len() != before)
    }

    fn len(&self) -> StoreResult<usize> {
        Ok(self.state.read().entries.len())
    }
}
