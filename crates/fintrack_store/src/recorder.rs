//! Local mutation path that feeds the outbox.

use crate::entity_store::EntityStore;
use crate::error::{StoreError, StoreResult};
use crate::outbox::OutboxStore;
use fintrack_model::{ChangeLogEntry, SyncEntity};
use std::marker::PhantomData;
use std::sync::Arc;

/// Applies local edits to an entity store and records them in the outbox.
///
/// The entity write happens before the outbox append. If the append fails
/// the edit is kept locally but will not be replayed; callers surface the
/// error to the user.
pub struct ChangeRecorder<E: SyncEntity> {
    entities: Arc<dyn EntityStore<E>>,
    outbox: Arc<dyn OutboxStore>,
    _kind: PhantomData<fn() -> E>,
}

impl<E: SyncEntity> ChangeRecorder<E> {
    /// Creates a recorder over the given stores.
    pub fn new(entities: Arc<dyn EntityStore<E>>, outbox: Arc<dyn OutboxStore>) -> Self {
        Self {
            entities,
            outbox,
            _kind: PhantomData,
        }
    }

    /// Stores a new record and appends a PENDING entry.
    pub fn create(&self, entity: E) -> StoreResult<ChangeLogEntry> {
        self.entities.put(&entity)?;
        self.outbox
            .append(ChangeLogEntry::pending(E::TABLE, entity.local_id()))
    }

    /// Stores an edited record and appends an UPDATED entry.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the record was never created.
    pub fn update(&self, entity: &E) -> StoreResult<ChangeLogEntry> {
        let current = self
            .entities
            .get(entity.local_id())?
            .ok_or(StoreError::NotFound {
                table: E::TABLE,
                local_id: entity.local_id(),
            })?;

        // An edit never carries identity: keep the stored remote id.
        let mut edited = entity.clone();
        *edited.remote_id_mut() = current.remote_id();
        self.entities.put(&edited)?;
        self.outbox
            .append(ChangeLogEntry::updated(E::TABLE, entity.local_id()))
    }

    /// Removes a record.
    ///
    /// Appends a DELETED entry naming the remote id when the backend knows
    /// the record. Returns `None` when it never reached the backend; any
    /// PENDING entry for it is then discarded as stale on the next run.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the record does not exist.
    pub fn delete(&self, local_id: u64) -> StoreResult<Option<ChangeLogEntry>> {
        let removed = self
            .entities
            .remove(local_id)?
            .ok_or(StoreError::NotFound {
                table: E::TABLE,
                local_id,
            })?;

        match removed.remote_id() {
            Some(remote_id) => Ok(Some(
                self.outbox
                    .append(ChangeLogEntry::deleted(E::TABLE, remote_id))?,
            )),
            None => Ok(None),
        }
    }

    /// Returns the entity store.
    pub fn entities(&self) -> &Arc<dyn EntityStore<E>> {
        &self.entities
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryEntityStore, MemoryOutbox};
    use crate::outbox::ReplayOrder;
    use fintrack_model::{Category, LogStatus};

    fn setup() -> (
        ChangeRecorder<Category>,
        Arc<MemoryEntityStore<Category>>,
        Arc<MemoryOutbox>,
    ) {
        let store = Arc::new(MemoryEntityStore::<Category>::new());
        let outbox = Arc::new(MemoryOutbox::new());
        let recorder = ChangeRecorder::<Category>::new(store.clone(), outbox.clone());
        (recorder, store, outbox)
    }

    #[test]
    fn create_appends_pending() {
        let (recorder, store, outbox) = setup();
        let entry = recorder.create(Category::expense(1, "Rent")).unwrap();

        assert_eq!(entry.status, LogStatus::Pending);
        assert_eq!(entry.record_id, 1);
        assert_eq!(entry.table_name, "categories");
        assert!(store.get(1).unwrap().is_some());
        assert_eq!(outbox.len().unwrap(), 1);
    }

    #[test]
    fn update_keeps_remote_id() {
        let (recorder, store, outbox) = setup();
        let mut rent = Category::expense(1, "Rent");
        rent.remote_id = Some(42);
        store.put(&rent).unwrap();

        let edited = Category::expense(1, "Housing");
        let entry = recorder.update(&edited).unwrap();

        assert_eq!(entry.status, LogStatus::Updated);
        let stored = store.get(1).unwrap().unwrap();
        assert_eq!(stored.name, "Housing");
        assert_eq!(stored.remote_id, Some(42));
        assert_eq!(
            outbox
                .list_pending("categories", ReplayOrder::OldestFirst)
                .unwrap()
                .len(),
            1
        );
    }

    #[test]
    fn update_unknown_record_fails() {
        let (recorder, _, outbox) = setup();
        let err = recorder.update(&Category::expense(9, "Ghost")).unwrap_err();
        assert!(matches!(err, StoreError::NotFound { local_id: 9, .. }));
        assert!(outbox.is_empty().unwrap());
    }

    #[test]
    fn delete_synced_record_records_remote_id() {
        let (recorder, store, _) = setup();
        let mut rent = Category::expense(1, "Rent");
        rent.remote_id = Some(42);
        store.put(&rent).unwrap();

        let entry = recorder.delete(1).unwrap().unwrap();
        assert_eq!(entry.status, LogStatus::Deleted);
        assert_eq!(entry.record_id, 42);
        assert!(store.get(1).unwrap().is_none());
    }

    #[test]
    fn delete_unsynced_record_records_nothing() {
        let (recorder, store, outbox) = setup();
        recorder.create(Category::expense(1, "Rent")).unwrap();

        assert!(recorder.delete(1).unwrap().is_none());
        assert!(store.is_empty());
        // the PENDING entry stays and is discarded at replay time
        assert_eq!(outbox.len().unwrap(), 1);
    }
}
