//! Multi-table coordination.

use crate::catch_up::CatchUpReport;
use crate::engine::{Reconcile, RunOutcome, RunReport, SyncStats};
use crate::error::{SyncError, SyncResult};
use crate::status::SyncState;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tokio::sync::watch;

/// Handle to a run executing on a background worker.
#[derive(Debug)]
pub struct RunHandle {
    table: String,
    handle: JoinHandle<RunOutcome>,
}

impl RunHandle {
    /// Table being reconciled.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Returns true once the worker has finished.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Blocks until the run finishes.
    pub fn join(self) -> SyncResult<RunReport> {
        let outcome = self
            .handle
            .join()
            .map_err(|_| SyncError::Worker(format!("worker for {} panicked", self.table)))?;
        outcome
            .into_report()
            .ok_or(SyncError::RunInProgress(self.table))
    }
}

/// What a call to [`SyncCoordinator::synchronize`] did.
#[derive(Debug)]
pub enum Trigger {
    /// A worker was started.
    Started(RunHandle),
    /// A run of the table was already in flight; nothing was started.
    AlreadyRunning,
}

impl Trigger {
    /// Returns true if a worker was started.
    pub fn is_started(&self) -> bool {
        matches!(self, Trigger::Started(_))
    }

    /// Waits for the started run, if any.
    pub fn wait(self) -> SyncResult<Option<RunReport>> {
        match self {
            Trigger::Started(handle) => handle.join().map(Some),
            Trigger::AlreadyRunning => Ok(None),
        }
    }
}

/// Owns one reconciler per table and runs them on background workers.
///
/// Triggering is fire-and-forget: the caller gets a handle back immediately
/// and observes progress through [`observe`](Self::observe). Different tables
/// run concurrently; the same table never runs twice at once.
#[derive(Default)]
pub struct SyncCoordinator {
    tables: RwLock<BTreeMap<String, Arc<dyn Reconcile>>>,
}

impl SyncCoordinator {
    /// Creates an empty coordinator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a reconciler under its table name, replacing any earlier one.
    pub fn register<R: Reconcile + 'static>(&self, reconciler: R) -> &Self {
        let table = reconciler.table().to_string();
        tracing::debug!(table = %table, "registered reconciler");
        self.tables.write().insert(table, Arc::new(reconciler));
        self
    }

    /// Returns the registered table names in sorted order.
    pub fn tables(&self) -> Vec<String> {
        self.tables.read().keys().cloned().collect()
    }

    fn get(&self, table: &str) -> SyncResult<Arc<dyn Reconcile>> {
        self.tables
            .read()
            .get(table)
            .cloned()
            .ok_or_else(|| SyncError::UnknownTable(table.to_string()))
    }

    /// Starts a run of `table` on a background worker.
    ///
    /// Returns [`Trigger::AlreadyRunning`] without side effects if a run of
    /// the table is in flight.
    pub fn synchronize(&self, table: &str) -> SyncResult<Trigger> {
        let reconciler = self.get(table)?;
        let Some(guard) = reconciler.try_begin() else {
            tracing::debug!(table, "run already in progress, skipping");
            return Ok(Trigger::AlreadyRunning);
        };

        let worker = Arc::clone(&reconciler);
        let handle = thread::Builder::new()
            .name(format!("fintrack-sync-{table}"))
            .spawn(move || worker.run(guard))
            .map_err(|e| SyncError::Worker(e.to_string()))?;

        Ok(Trigger::Started(RunHandle {
            table: table.to_string(),
            handle,
        }))
    }

    /// Starts a run of every registered table.
    pub fn synchronize_all(&self) -> SyncResult<Vec<Trigger>> {
        self.tables()
            .iter()
            .map(|table| self.synchronize(table))
            .collect()
    }

    /// Returns a receiver for the state of `table`.
    pub fn observe(&self, table: &str) -> SyncResult<watch::Receiver<SyncState>> {
        Ok(self.get(table)?.subscribe())
    }

    /// Returns the current state of `table`.
    pub fn state(&self, table: &str) -> SyncResult<SyncState> {
        Ok(self.get(table)?.state())
    }

    /// Returns the statistics of `table`.
    pub fn stats(&self, table: &str) -> SyncResult<SyncStats> {
        Ok(self.get(table)?.stats())
    }

    /// Runs catch-up for `table` on the calling thread.
    pub fn catch_up(&self, table: &str) -> SyncResult<CatchUpReport> {
        self.get(table)?.catch_up()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::TableReconciler;
    use crate::remote::MockRemote;
    use fintrack_model::{Budget, Category, ChangeLogEntry};
    use fintrack_store::{EntityStore, MemoryEntityStore, MemoryOutbox, OutboxStore};

    fn coordinator() -> (SyncCoordinator, Arc<MemoryOutbox>, Arc<MemoryEntityStore<Category>>) {
        let outbox = Arc::new(MemoryOutbox::new());
        let categories = Arc::new(MemoryEntityStore::<Category>::new());
        let coordinator = SyncCoordinator::new();
        coordinator
            .register(TableReconciler::<Category>::new(
                categories.clone(),
                outbox.clone(),
                Arc::new(MockRemote::<Category>::new()),
            ))
            .register(TableReconciler::<Budget>::new(
                Arc::new(MemoryEntityStore::<Budget>::new()),
                outbox.clone(),
                Arc::new(MockRemote::<Budget>::new()),
            ));
        (coordinator, outbox, categories)
    }

    #[test]
    fn tables_are_sorted() {
        let (coordinator, _, _) = coordinator();
        assert_eq!(coordinator.tables(), vec!["budgets", "categories"]);
    }

    #[test]
    fn unknown_table_is_rejected() {
        let (coordinator, _, _) = coordinator();
        assert!(matches!(
            coordinator.synchronize("accounts"),
            Err(SyncError::UnknownTable(_))
        ));
        assert!(coordinator.observe("accounts").is_err());
        assert!(coordinator.state("accounts").is_err());
    }

    #[test]
    fn run_on_worker() {
        let (coordinator, outbox, categories) = coordinator();
        categories.put(&Category::expense(1, "Rent")).unwrap();
        outbox.append(ChangeLogEntry::pending("categories", 1)).unwrap();

        let rx = coordinator.observe("categories").unwrap();
        assert_eq!(*rx.borrow(), SyncState::Idle);

        let report = coordinator.synchronize("categories").unwrap().wait().unwrap().unwrap();
        assert_eq!(report.state, SyncState::Success);
        assert_eq!(*rx.borrow(), SyncState::Success);
        assert_eq!(coordinator.state("categories").unwrap(), SyncState::Success);
        assert_eq!(coordinator.state("budgets").unwrap(), SyncState::Idle);
        assert_eq!(categories.get(1).unwrap().unwrap().remote_id, Some(1000));
    }

    #[test]
    fn synchronize_all_runs_each_table() {
        let (coordinator, _, _) = coordinator();
        let triggers = coordinator.synchronize_all().unwrap();
        assert_eq!(triggers.len(), 2);

        for trigger in triggers {
            let report = trigger.wait().unwrap().unwrap();
            assert_eq!(report.state, SyncState::NoChanges);
        }
        assert_eq!(coordinator.stats("budgets").unwrap().runs_completed, 1);
    }
}
