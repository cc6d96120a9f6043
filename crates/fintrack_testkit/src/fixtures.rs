//! Test fixtures wiring stores, recorder, reconciler and fake backend.

use crate::backend::FakeBackend;
use fintrack_model::{Category, ChangeLogEntry, SyncEntity};
use fintrack_store::{
    ChangeRecorder, EntityStore, FileEntityStore, FileOutbox, MemoryEntityStore, MemoryOutbox,
    OutboxStore, ReplayOrder,
};
use fintrack_sync_engine::{SyncState, TableReconciler};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tokio::sync::watch;

/// One table wired end to end against a [`FakeBackend`].
pub struct TableHarness<E: SyncEntity> {
    /// The fake backend.
    pub backend: Arc<FakeBackend>,
    /// Local records.
    pub entities: Arc<dyn EntityStore<E>>,
    /// Shared outbox.
    pub outbox: Arc<dyn OutboxStore>,
    /// Local mutation path.
    pub recorder: ChangeRecorder<E>,
    /// Reconciler under test.
    pub reconciler: Arc<TableReconciler<E>>,
    categories: Option<Arc<dyn EntityStore<Category>>>,
    /// The temporary directory (kept alive to prevent cleanup).
    _temp_dir: Option<TempDir>,
}

impl<E: SyncEntity> TableHarness<E> {
    /// In-memory stores, oldest-first replay.
    pub fn memory() -> Self {
        Self::memory_with_order(ReplayOrder::OldestFirst)
    }

    /// In-memory stores with the given replay order.
    pub fn memory_with_order(order: ReplayOrder) -> Self {
        Self::build(
            FakeBackend::new(),
            Arc::new(MemoryEntityStore::<E>::new()),
            Arc::new(MemoryOutbox::new()),
            order,
            None,
            None,
        )
    }

    /// In-memory records of `E` sharing the backend and outbox of
    /// `categories`, with category references resolved through its store.
    pub fn alongside(categories: &TableHarness<Category>) -> Self {
        Self::build(
            Arc::clone(&categories.backend),
            Arc::new(MemoryEntityStore::<E>::new()),
            Arc::clone(&categories.outbox),
            categories.reconciler.order(),
            Some(Arc::clone(&categories.entities)),
            None,
        )
    }

    /// JSON-file stores in a fresh temporary directory.
    pub fn file() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let (entities, outbox) = open_file_stores::<E>(temp_dir.path());
        Self::build(
            FakeBackend::new(),
            entities,
            outbox,
            ReplayOrder::OldestFirst,
            None,
            Some(temp_dir),
        )
    }

    fn build(
        backend: Arc<FakeBackend>,
        entities: Arc<dyn EntityStore<E>>,
        outbox: Arc<dyn OutboxStore>,
        order: ReplayOrder,
        categories: Option<Arc<dyn EntityStore<Category>>>,
        temp_dir: Option<TempDir>,
    ) -> Self {
        let mut reconciler = TableReconciler::<E>::new(
            Arc::clone(&entities),
            Arc::clone(&outbox),
            Arc::new(backend.client::<E>()),
        )
        .with_order(order);
        if let Some(categories) = &categories {
            reconciler = reconciler.with_categories(Arc::clone(categories));
        }
        Self {
            recorder: ChangeRecorder::new(Arc::clone(&entities), Arc::clone(&outbox)),
            backend,
            entities,
            outbox,
            reconciler: Arc::new(reconciler),
            categories,
            _temp_dir: temp_dir,
        }
    }

    /// Returns the data directory if file-based.
    pub fn path(&self) -> Option<&Path> {
        self._temp_dir.as_ref().map(|d| d.path())
    }

    /// Reopens the file stores from disk, as after a process restart.
    ///
    /// # Panics
    ///
    /// Panics for in-memory harnesses.
    pub fn reopen(self) -> Self {
        let temp_dir = self._temp_dir.expect("reopen requires a file harness");
        let (entities, outbox) = open_file_stores::<E>(temp_dir.path());
        let order = self.reconciler.order();
        Self::build(self.backend, entities, outbox, order, self.categories, Some(temp_dir))
    }

    /// Returns the local record with `local_id`.
    pub fn entity(&self, local_id: u64) -> Option<E> {
        self.entities.get(local_id).expect("entity store read failed")
    }

    /// Returns this table's outbox entries in replay order.
    pub fn pending(&self) -> Vec<ChangeLogEntry> {
        self.outbox
            .list_pending(E::TABLE, self.reconciler.order())
            .expect("outbox read failed")
    }
}

fn open_file_stores<E: SyncEntity>(dir: &Path) -> (Arc<dyn EntityStore<E>>, Arc<dyn OutboxStore>) {
    let entities = FileEntityStore::<E>::open(dir).expect("Failed to open entity store");
    let outbox = FileOutbox::open(dir).expect("Failed to open outbox");
    (Arc::new(entities), Arc::new(outbox))
}

/// Polls `rx` until `predicate` holds or `timeout` expires.
///
/// Returns the last observed state. Delivery is last-value-wins, so only
/// states that persist long enough are observable.
pub fn wait_for_state(
    rx: &watch::Receiver<SyncState>,
    timeout: Duration,
    predicate: impl Fn(SyncState) -> bool,
) -> SyncState {
    let deadline = Instant::now() + timeout;
    loop {
        let state = *rx.borrow();
        if predicate(state) || Instant::now() >= deadline {
            return state;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
}
