//! Per-table reconciliation.

use crate::catch_up::CatchUpReport;
use crate::error::{StaleReason, SyncError, SyncResult};
use crate::remote::{CreateOutcome, RemoteEntityClient};
use crate::status::{StatusPublisher, SyncState};
use fintrack_model::{Category, ChangeLogEntry, LogStatus, SyncEntity};
use fintrack_store::{EntityStore, OutboxStore, ReplayOrder};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;

/// Exclusive right to run one table's reconciliation.
///
/// Acquired with an atomic compare-and-set and released on drop, including
/// when the run unwinds.
#[derive(Debug)]
pub struct RunGuard {
    flag: Arc<AtomicBool>,
}

impl RunGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self {
                flag: Arc::clone(flag),
            })
    }

    /// Returns true if this guard was taken on `flag`.
    fn guards(&self, flag: &Arc<AtomicBool>) -> bool {
        Arc::ptr_eq(&self.flag, flag)
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Summary of one reconciliation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// Table that was reconciled.
    pub table: String,
    /// Terminal state the run published.
    pub state: SyncState,
    /// Entries replayed against the backend and removed.
    pub synced: usize,
    /// Stale or unrecognized entries removed without a remote call.
    pub discarded: usize,
    /// Entries left in the outbox by an abort.
    pub remaining: usize,
    /// Cause of the abort, if any.
    pub error: Option<String>,
    /// Wall-clock duration of the run.
    pub duration: Duration,
}

impl RunReport {
    fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            state: SyncState::Checking,
            synced: 0,
            discarded: 0,
            remaining: 0,
            error: None,
            duration: Duration::ZERO,
        }
    }
}

/// Result of asking for a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The run happened.
    Completed(RunReport),
    /// Another run of the same table was in flight; nothing was done.
    AlreadyRunning,
}

impl RunOutcome {
    /// Returns the report if the run happened.
    pub fn report(&self) -> Option<&RunReport> {
        match self {
            RunOutcome::Completed(report) => Some(report),
            RunOutcome::AlreadyRunning => None,
        }
    }

    /// Consumes the outcome, returning the report if the run happened.
    pub fn into_report(self) -> Option<RunReport> {
        match self {
            RunOutcome::Completed(report) => Some(report),
            RunOutcome::AlreadyRunning => None,
        }
    }
}

/// Cumulative statistics of one reconciler.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Runs that reached a terminal state.
    pub runs_completed: u64,
    /// Runs that ended in [`SyncState::Error`].
    pub runs_failed: u64,
    /// Entries replayed against the backend.
    pub entries_synced: u64,
    /// Entries discarded without a remote call.
    pub entries_discarded: u64,
    /// Time the last run finished.
    pub last_run: Option<Instant>,
    /// Cause of the last failed run. Cleared by a successful run.
    pub last_error: Option<String>,
}

/// What happened to one entry.
enum EntryOutcome {
    /// Replayed and removed.
    Synced,
    /// Removed without replay; carries the reason for the log.
    Discarded(SyncError),
}

/// Object-safe view of a reconciler, used to drive tables of different
/// record kinds from one coordinator.
pub trait Reconcile: Send + Sync {
    /// Table this reconciler owns.
    fn table(&self) -> &str;

    /// Current published state.
    fn state(&self) -> SyncState;

    /// Receiver for the published state.
    fn subscribe(&self) -> watch::Receiver<SyncState>;

    /// Takes the run guard if no run is in flight.
    fn try_begin(&self) -> Option<RunGuard>;

    /// Performs one run while holding `guard`.
    ///
    /// A guard taken from another reconciler does not count; the run then
    /// needs this table's own guard.
    fn run(&self, guard: RunGuard) -> RunOutcome;

    /// Repairs missing remote ids by matching names.
    fn catch_up(&self) -> SyncResult<CatchUpReport>;

    /// Cumulative statistics.
    fn stats(&self) -> SyncStats;
}

/// Replays one table's outbox against the backend.
///
/// Entries are processed one at a time in the order the outbox returns
/// them. The first unrecoverable failure stops the run and leaves the
/// failing entry and every later entry in the outbox; entries committed
/// before the failure stay committed.
pub struct TableReconciler<E: SyncEntity> {
    pub(crate) entities: Arc<dyn EntityStore<E>>,
    pub(crate) outbox: Arc<dyn OutboxStore>,
    pub(crate) remote: Arc<dyn RemoteEntityClient<E>>,
    pub(crate) order: ReplayOrder,
    categories: Option<Arc<dyn EntityStore<Category>>>,
    status: StatusPublisher,
    running: Arc<AtomicBool>,
    stats: RwLock<SyncStats>,
}

impl<E: SyncEntity> TableReconciler<E> {
    /// Creates a reconciler replaying oldest entries first.
    pub fn new(
        entities: Arc<dyn EntityStore<E>>,
        outbox: Arc<dyn OutboxStore>,
        remote: Arc<dyn RemoteEntityClient<E>>,
    ) -> Self {
        Self {
            entities,
            outbox,
            remote,
            order: ReplayOrder::OldestFirst,
            categories: None,
            status: StatusPublisher::new(),
            running: Arc::new(AtomicBool::new(false)),
            stats: RwLock::new(SyncStats::default()),
        }
    }

    /// Sets the replay order.
    pub fn with_order(mut self, order: ReplayOrder) -> Self {
        self.order = order;
        self
    }

    /// Resolves category references through `categories`.
    ///
    /// Required for kinds that refer to a category; without it such records
    /// cannot be sent and the run aborts.
    pub fn with_categories(mut self, categories: Arc<dyn EntityStore<Category>>) -> Self {
        self.categories = Some(categories);
        self
    }

    /// Returns the table name.
    pub fn table(&self) -> &'static str {
        E::TABLE
    }

    /// Returns the replay order.
    pub fn order(&self) -> ReplayOrder {
        self.order
    }

    /// Gets the current state.
    pub fn state(&self) -> SyncState {
        self.status.current()
    }

    /// Returns a receiver for state changes.
    pub fn subscribe(&self) -> watch::Receiver<SyncState> {
        self.status.subscribe()
    }

    /// Gets the current stats.
    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    /// Returns true while a run holds the guard.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Takes the run guard if no run is in flight.
    pub fn try_begin(&self) -> Option<RunGuard> {
        RunGuard::acquire(&self.running)
    }

    /// Runs on the calling thread unless a run is already in flight.
    pub fn synchronize(&self) -> RunOutcome {
        match self.try_begin() {
            Some(guard) => RunOutcome::Completed(self.execute(guard)),
            None => {
                tracing::debug!(table = E::TABLE, "run already in progress, skipping");
                RunOutcome::AlreadyRunning
            }
        }
    }

    /// Performs one run under `guard`, which is released when this returns.
    ///
    /// A guard taken from another reconciler is dropped and this table's own
    /// guard is tried instead, so a run in flight is never doubled.
    pub fn run(&self, guard: RunGuard) -> RunOutcome {
        if !guard.guards(&self.running) {
            tracing::warn!(table = E::TABLE, "guard belongs to another table");
            drop(guard);
            return self.synchronize();
        }
        RunOutcome::Completed(self.execute(guard))
    }

    fn execute(&self, guard: RunGuard) -> RunReport {
        let start = Instant::now();
        let mut report = RunReport::new(E::TABLE);

        let result = self.reconcile(&mut report);
        report.state = match &result {
            Ok(state) => *state,
            Err(_) => SyncState::Error,
        };
        report.error = result.err().map(|e| e.to_string());
        report.duration = start.elapsed();

        {
            let mut stats = self.stats.write();
            stats.runs_completed += 1;
            stats.entries_synced += report.synced as u64;
            stats.entries_discarded += report.discarded as u64;
            stats.last_run = Some(Instant::now());
            if report.state == SyncState::Error {
                stats.runs_failed += 1;
                stats.last_error = report.error.clone();
            } else {
                stats.last_error = None;
            }
        }

        self.status.publish(report.state);
        drop(guard);
        report
    }

    /// Executes the batch and returns the terminal state on success.
    fn reconcile(&self, report: &mut RunReport) -> SyncResult<SyncState> {
        self.status.publish(SyncState::Checking);

        let entries = self.outbox.list_pending(E::TABLE, self.order)?;
        if entries.is_empty() {
            tracing::debug!(table = E::TABLE, "outbox empty");
            return Ok(SyncState::NoChanges);
        }

        self.status.publish(SyncState::Processing);
        tracing::info!(table = E::TABLE, entries = entries.len(), "replaying outbox");

        for (index, entry) in entries.iter().enumerate() {
            match self.apply(entry) {
                Ok(EntryOutcome::Synced) => report.synced += 1,
                Ok(EntryOutcome::Discarded(reason)) => {
                    tracing::debug!(
                        table = E::TABLE,
                        entry_id = entry.id,
                        record_id = entry.record_id,
                        %reason,
                        "discarded entry"
                    );
                    report.discarded += 1;
                }
                Err(err) => {
                    report.remaining = entries.len() - index;
                    tracing::warn!(
                        table = E::TABLE,
                        entry_id = entry.id,
                        record_id = entry.record_id,
                        status = %entry.status,
                        remaining = report.remaining,
                        error = %err,
                        "reconciliation aborted"
                    );
                    return Err(err);
                }
            }
        }

        tracing::info!(
            table = E::TABLE,
            synced = report.synced,
            discarded = report.discarded,
            "reconciliation finished"
        );
        Ok(SyncState::Success)
    }

    /// Replays one entry and removes it from the outbox unless it fails.
    ///
    /// Errors that do not abort the run discard the entry instead.
    fn apply(&self, entry: &ChangeLogEntry) -> SyncResult<EntryOutcome> {
        let result = match &entry.status {
            LogStatus::Pending => self.replay_create(entry),
            LogStatus::Updated => self.replay_update(entry),
            LogStatus::Deleted => self.replay_delete(entry),
            LogStatus::Unrecognized(tag) => Err(SyncError::UnknownLogStatus {
                status: tag.clone(),
            }),
        };
        let outcome = match result {
            Ok(()) => EntryOutcome::Synced,
            Err(err) if !err.aborts_run() => EntryOutcome::Discarded(err),
            Err(err) => return Err(err),
        };
        self.outbox.remove(entry)?;
        Ok(outcome)
    }

    fn replay_create(&self, entry: &ChangeLogEntry) -> SyncResult<()> {
        // Deleted locally before it was ever synced.
        let Some(mut entity) = self.entities.get(entry.record_id)? else {
            return Err(self.stale(entry, StaleReason::MissingRecord));
        };
        // Create already confirmed by an earlier entry or catch-up.
        if entity.remote_id().is_some() {
            return Err(self.stale(entry, StaleReason::AlreadyCreated));
        }

        match self.remote.create(&self.outgoing(&entity)?)? {
            CreateOutcome::Created(record) => {
                entity.assign_remote_id(record.id)?;
                self.entities.put(&entity)?;
                tracing::debug!(
                    table = E::TABLE,
                    local_id = entity.local_id(),
                    remote_id = record.id,
                    "created remotely"
                );
            }
            CreateOutcome::EmptyBody => {
                // Accepted, but the record stays without a remote id until
                // catch-up matches it.
                tracing::warn!(
                    table = E::TABLE,
                    local_id = entity.local_id(),
                    "create acknowledged without a body; remote id unknown"
                );
            }
        }
        Ok(())
    }

    fn replay_update(&self, entry: &ChangeLogEntry) -> SyncResult<()> {
        let Some(entity) = self.entities.get(entry.record_id)? else {
            return Err(self.stale(entry, StaleReason::MissingRecord));
        };
        let Some(remote_id) = entity.remote_id() else {
            return Err(self.stale(entry, StaleReason::MissingRemoteId));
        };

        self.remote.update(remote_id, &self.outgoing(&entity)?)
    }

    fn replay_delete(&self, entry: &ChangeLogEntry) -> SyncResult<()> {
        // record_id of a DELETED entry is the remote id; 404 is handled by the client.
        self.remote.delete(entry.record_id)
    }

    /// Returns the copy of `entity` sent to the backend, with its category
    /// reference rewritten from the local to the remote id.
    ///
    /// A category deleted locally is sent as no category. A category the
    /// backend has not acknowledged yet aborts the run, so the entry is
    /// retried once the categories table has synced.
    fn outgoing(&self, entity: &E) -> SyncResult<E> {
        let Some(category_id) = entity.category_ref() else {
            return Ok(entity.clone());
        };
        let unresolved = || SyncError::UnresolvedReference {
            table: E::TABLE.to_string(),
            local_id: entity.local_id(),
            category_id,
        };
        let Some(categories) = &self.categories else {
            return Err(unresolved());
        };

        match categories.get(category_id)? {
            None => Ok(entity.with_category_ref(None)),
            Some(category) => match category.remote_id() {
                Some(remote_id) => Ok(entity.with_category_ref(Some(remote_id))),
                None => Err(unresolved()),
            },
        }
    }

    fn stale(&self, entry: &ChangeLogEntry, reason: StaleReason) -> SyncError {
        SyncError::stale(E::TABLE, entry.record_id, reason)
    }
}

impl<E: SyncEntity> Reconcile for TableReconciler<E> {
    fn table(&self) -> &str {
        E::TABLE
    }

    fn state(&self) -> SyncState {
        TableReconciler::state(self)
    }

    fn subscribe(&self) -> watch::Receiver<SyncState> {
        TableReconciler::subscribe(self)
    }

    fn try_begin(&self) -> Option<RunGuard> {
        TableReconciler::try_begin(self)
    }

    fn run(&self, guard: RunGuard) -> RunOutcome {
        TableReconciler::run(self, guard)
    }

    fn catch_up(&self) -> SyncResult<CatchUpReport> {
        TableReconciler::catch_up(self)
    }

    fn stats(&self) -> SyncStats {
        TableReconciler::stats(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::{MockRemote, RemoteCall};
    use fintrack_model::{Budget, RemoteRecord, Transaction};
    use fintrack_store::{MemoryEntityStore, MemoryOutbox};

    struct Fixture {
        store: Arc<MemoryEntityStore<Category>>,
        outbox: Arc<MemoryOutbox>,
        remote: Arc<MockRemote<Category>>,
        reconciler: TableReconciler<Category>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryEntityStore::<Category>::new());
        let outbox = Arc::new(MemoryOutbox::new());
        let remote = Arc::new(MockRemote::<Category>::new());
        let reconciler = TableReconciler::<Category>::new(store.clone(), outbox.clone(), remote.clone());
        Fixture {
            store,
            outbox,
            remote,
            reconciler,
        }
    }

    fn synced(id: u64, remote_id: u64, name: &str) -> Category {
        let mut category = Category::expense(id, name);
        category.remote_id = Some(remote_id);
        category
    }

    fn run(f: &Fixture) -> RunReport {
        f.reconciler.synchronize().into_report().unwrap()
    }

    #[test]
    fn initial_state_is_idle() {
        let f = fixture();
        assert_eq!(f.reconciler.state(), SyncState::Idle);
        assert_eq!(f.reconciler.stats().runs_completed, 0);
        assert!(!f.reconciler.is_running());
    }

    #[test]
    fn empty_outbox_reports_no_changes() {
        let f = fixture();
        let report = run(&f);
        assert_eq!(report.state, SyncState::NoChanges);
        assert_eq!(f.reconciler.state(), SyncState::NoChanges);
        assert_eq!(f.remote.call_count(), 0);
    }

    #[test]
    fn pending_create_assigns_remote_id() {
        let f = fixture();
        f.store.put(&Category::expense(1, "Rent")).unwrap();
        f.outbox.append(ChangeLogEntry::pending("categories", 1)).unwrap();
        f.remote.push_create(Ok(CreateOutcome::Created(RemoteRecord {
            id: 42,
            local_id: None,
            name: None,
        })));

        let report = run(&f);
        assert_eq!(report.state, SyncState::Success);
        assert_eq!(report.synced, 1);
        assert_eq!(f.store.get(1).unwrap().unwrap().remote_id, Some(42));
        assert!(f.outbox.is_empty().unwrap());
    }

    #[test]
    fn empty_create_body_leaves_remote_id_unset() {
        let f = fixture();
        f.store.put(&Category::expense(1, "Rent")).unwrap();
        f.outbox.append(ChangeLogEntry::pending("categories", 1)).unwrap();
        f.remote.push_create(Ok(CreateOutcome::EmptyBody));

        let report = run(&f);
        assert_eq!(report.state, SyncState::Success);
        assert_eq!(f.store.get(1).unwrap().unwrap().remote_id, None);
        assert!(f.outbox.is_empty().unwrap());
    }

    #[test]
    fn pending_for_deleted_record_is_discarded() {
        let f = fixture();
        f.outbox.append(ChangeLogEntry::pending("categories", 5)).unwrap();

        let report = run(&f);
        assert_eq!(report.state, SyncState::Success);
        assert_eq!(report.discarded, 1);
        assert_eq!(f.remote.call_count(), 0);
        assert!(f.outbox.is_empty().unwrap());
    }

    #[test]
    fn pending_for_already_created_record_is_discarded() {
        let f = fixture();
        f.store.put(&synced(1, 42, "Rent")).unwrap();
        f.outbox.append(ChangeLogEntry::pending("categories", 1)).unwrap();

        let report = run(&f);
        assert_eq!(report.discarded, 1);
        assert_eq!(f.remote.call_count(), 0);
        assert_eq!(f.store.get(1).unwrap().unwrap().remote_id, Some(42));
    }

    #[test]
    fn update_without_remote_id_is_discarded() {
        let f = fixture();
        f.store.put(&Category::expense(1, "Rent")).unwrap();
        f.outbox.append(ChangeLogEntry::updated("categories", 1)).unwrap();
        f.outbox.append(ChangeLogEntry::updated("categories", 2)).unwrap();

        let report = run(&f);
        assert_eq!(report.state, SyncState::Success);
        assert_eq!(report.discarded, 2);
        assert_eq!(f.remote.call_count(), 0);
    }

    #[test]
    fn update_uses_remote_id() {
        let f = fixture();
        f.store.put(&synced(1, 42, "Rent")).unwrap();
        f.outbox.append(ChangeLogEntry::updated("categories", 1)).unwrap();

        let report = run(&f);
        assert_eq!(report.synced, 1);
        assert_eq!(f.remote.calls(), vec![RemoteCall::Update(42)]);
    }

    #[test]
    fn delete_uses_record_id() {
        let f = fixture();
        f.outbox.append(ChangeLogEntry::deleted("categories", 42)).unwrap();

        let report = run(&f);
        assert_eq!(report.synced, 1);
        assert_eq!(f.remote.calls(), vec![RemoteCall::Delete(42)]);
        assert!(f.outbox.is_empty().unwrap());
    }

    #[test]
    fn unknown_status_is_discarded() {
        let f = fixture();
        f.outbox
            .append(ChangeLogEntry::new("categories", 1, LogStatus::parse("ARCHIVED")))
            .unwrap();

        let report = run(&f);
        assert_eq!(report.state, SyncState::Success);
        assert_eq!(report.discarded, 1);
        assert!(f.outbox.is_empty().unwrap());
    }

    #[test]
    fn failure_stops_the_batch() {
        let f = fixture();
        f.store.put(&synced(1, 11, "a")).unwrap();
        f.store.put(&synced(2, 12, "b")).unwrap();
        f.store.put(&synced(3, 13, "c")).unwrap();
        let first = f.outbox.append(ChangeLogEntry::updated("categories", 1).with_timestamp(1)).unwrap();
        let second = f.outbox.append(ChangeLogEntry::updated("categories", 2).with_timestamp(2)).unwrap();
        let third = f.outbox.append(ChangeLogEntry::updated("categories", 3).with_timestamp(3)).unwrap();

        f.remote.push_update(Ok(()));
        f.remote.push_update(Err(SyncError::Server {
            status: 500,
            body: "boom".into(),
        }));

        let report = run(&f);
        assert_eq!(report.state, SyncState::Error);
        assert_eq!(report.synced, 1);
        assert_eq!(report.remaining, 2);
        assert!(report.error.unwrap().contains("500"));

        assert!(!f.outbox.contains(first.id));
        assert!(f.outbox.contains(second.id));
        assert!(f.outbox.contains(third.id));
        // the third entry was never attempted
        assert_eq!(f.remote.calls(), vec![RemoteCall::Update(11), RemoteCall::Update(12)]);

        let stats = f.reconciler.stats();
        assert_eq!(stats.runs_failed, 1);
        assert!(stats.last_error.is_some());
    }

    #[test]
    fn rerun_resumes_from_failed_entry() {
        let f = fixture();
        f.store.put(&synced(1, 11, "a")).unwrap();
        f.store.put(&synced(2, 12, "b")).unwrap();
        f.outbox.append(ChangeLogEntry::updated("categories", 1).with_timestamp(1)).unwrap();
        f.outbox.append(ChangeLogEntry::updated("categories", 2).with_timestamp(2)).unwrap();
        f.remote.push_update(Err(SyncError::Network("timed out".into())));

        assert_eq!(run(&f).state, SyncState::Error);
        assert_eq!(f.outbox.len().unwrap(), 2);

        let report = run(&f);
        assert_eq!(report.state, SyncState::Success);
        assert_eq!(report.synced, 2);
        assert_eq!(run(&f).state, SyncState::NoChanges);
        assert!(f.reconciler.stats().last_error.is_none());
    }

    #[test]
    fn guard_blocks_second_run() {
        let f = fixture();
        let guard = f.reconciler.try_begin().unwrap();
        assert!(f.reconciler.is_running());
        assert_eq!(f.reconciler.synchronize(), RunOutcome::AlreadyRunning);
        assert!(f.reconciler.try_begin().is_none());

        drop(guard);
        assert!(!f.reconciler.is_running());
        assert!(f.reconciler.synchronize().report().is_some());
    }

    #[test]
    fn foreign_guard_does_not_start_a_second_run() {
        let f = fixture();
        let budgets = TableReconciler::<Budget>::new(
            Arc::new(MemoryEntityStore::<Budget>::new()),
            f.outbox.clone(),
            Arc::new(MockRemote::<Budget>::new()),
        );
        f.store.put(&Category::expense(1, "Rent")).unwrap();
        f.outbox.append(ChangeLogEntry::pending("categories", 1)).unwrap();

        let held = f.reconciler.try_begin().unwrap();
        let foreign = budgets.try_begin().unwrap();
        assert_eq!(f.reconciler.run(foreign), RunOutcome::AlreadyRunning);
        assert_eq!(f.remote.call_count(), 0);
        assert!(f.reconciler.is_running());
        assert!(!budgets.is_running());
        assert_eq!(f.outbox.len().unwrap(), 1);

        // with the own guard released, the foreign one falls back to it
        drop(held);
        let report = f.reconciler.run(budgets.try_begin().unwrap()).into_report().unwrap();
        assert_eq!(report.table, "categories");
        assert_eq!(report.synced, 1);
        assert!(!f.reconciler.is_running());
    }

    #[test]
    fn own_guard_runs() {
        let f = fixture();
        let guard = f.reconciler.try_begin().unwrap();
        let report = f.reconciler.run(guard).into_report().unwrap();
        assert_eq!(report.state, SyncState::NoChanges);
        assert!(!f.reconciler.is_running());
    }

    fn transactions(
        categories: Option<Arc<MemoryEntityStore<Category>>>,
    ) -> (
        Arc<MemoryEntityStore<Transaction>>,
        Arc<MemoryOutbox>,
        Arc<MockRemote<Transaction>>,
        TableReconciler<Transaction>,
    ) {
        let store = Arc::new(MemoryEntityStore::<Transaction>::new());
        let outbox = Arc::new(MemoryOutbox::new());
        let remote = Arc::new(MockRemote::<Transaction>::new());
        let mut reconciler =
            TableReconciler::<Transaction>::new(store.clone(), outbox.clone(), remote.clone());
        if let Some(categories) = categories {
            reconciler = reconciler.with_categories(categories);
        }
        (store, outbox, remote, reconciler)
    }

    #[test]
    fn unsynced_category_aborts_and_keeps_entry() {
        let categories = Arc::new(MemoryEntityStore::<Category>::new());
        categories.put(&Category::expense(3, "Food")).unwrap();
        let (store, outbox, remote, reconciler) = transactions(Some(categories.clone()));
        store
            .put(&Transaction::new(1, "Lunch", -1_250, "2024-03-01").in_category(3))
            .unwrap();
        outbox.append(ChangeLogEntry::pending("transactions", 1)).unwrap();

        let report = reconciler.synchronize().into_report().unwrap();
        assert_eq!(report.state, SyncState::Error);
        assert!(report.error.unwrap().contains("category 3"));
        assert_eq!(outbox.len().unwrap(), 1);
        assert_eq!(remote.call_count(), 0);

        categories.put(&synced(3, 30, "Food")).unwrap();
        let report = reconciler.synchronize().into_report().unwrap();
        assert_eq!(report.state, SyncState::Success);
        assert_eq!(remote.calls(), vec![RemoteCall::Create(1)]);
        // the local record keeps the local category id
        assert_eq!(store.get(1).unwrap().unwrap().category_id, Some(3));
    }

    #[test]
    fn category_reference_needs_a_resolver() {
        let (store, outbox, remote, reconciler) = transactions(None);
        store
            .put(&Transaction::new(1, "Lunch", -1_250, "2024-03-01").in_category(3))
            .unwrap();
        store.put(&Transaction::new(2, "Cash", -2_000, "2024-03-02")).unwrap();
        outbox.append(ChangeLogEntry::pending("transactions", 2).with_timestamp(1)).unwrap();
        outbox.append(ChangeLogEntry::pending("transactions", 1).with_timestamp(2)).unwrap();

        let report = reconciler.synchronize().into_report().unwrap();
        assert_eq!(report.state, SyncState::Error);
        assert_eq!(report.synced, 1);
        assert_eq!(remote.calls(), vec![RemoteCall::Create(2)]);
    }

    #[test]
    fn deleted_category_is_sent_as_uncategorized() {
        let categories = Arc::new(MemoryEntityStore::<Category>::new());
        let (store, outbox, remote, reconciler) = transactions(Some(categories));
        store
            .put(&Transaction::new(1, "Lunch", -1_250, "2024-03-01").in_category(9))
            .unwrap();
        outbox.append(ChangeLogEntry::pending("transactions", 1)).unwrap();

        let report = reconciler.synchronize().into_report().unwrap();
        assert_eq!(report.state, SyncState::Success);
        assert_eq!(remote.calls(), vec![RemoteCall::Create(1)]);
    }

    #[test]
    fn only_own_table_is_replayed() {
        let f = fixture();
        f.outbox.append(ChangeLogEntry::pending("budgets", 1)).unwrap();

        let report = run(&f);
        assert_eq!(report.state, SyncState::NoChanges);
        assert_eq!(f.outbox.len().unwrap(), 1);
    }

    struct ObservingRemote {
        inner: MockRemote<Category>,
        rx: parking_lot::Mutex<Option<watch::Receiver<SyncState>>>,
        seen: parking_lot::Mutex<Vec<SyncState>>,
    }

    impl RemoteEntityClient<Category> for ObservingRemote {
        fn list(&self) -> SyncResult<Vec<Category>> {
            self.inner.list()
        }

        fn create(&self, entity: &Category) -> SyncResult<CreateOutcome> {
            if let Some(rx) = self.rx.lock().as_ref() {
                self.seen.lock().push(*rx.borrow());
            }
            self.inner.create(entity)
        }

        fn update(&self, remote_id: u64, entity: &Category) -> SyncResult<()> {
            self.inner.update(remote_id, entity)
        }

        fn delete(&self, remote_id: u64) -> SyncResult<()> {
            self.inner.delete(remote_id)
        }
    }

    #[test]
    fn processing_is_visible_during_remote_calls() {
        let store = Arc::new(MemoryEntityStore::<Category>::new());
        let outbox = Arc::new(MemoryOutbox::new());
        let remote = Arc::new(ObservingRemote {
            inner: MockRemote::new(),
            rx: parking_lot::Mutex::new(None),
            seen: parking_lot::Mutex::new(Vec::new()),
        });
        let reconciler = TableReconciler::<Category>::new(store.clone(), outbox.clone(), remote.clone());
        *remote.rx.lock() = Some(reconciler.subscribe());

        store.put(&Category::expense(1, "Rent")).unwrap();
        outbox.append(ChangeLogEntry::pending("categories", 1)).unwrap();

        let report = reconciler.synchronize().into_report().unwrap();
        assert_eq!(report.state, SyncState::Success);
        assert_eq!(*remote.seen.lock(), vec![SyncState::Processing]);
    }

    #[test]
    fn newest_first_discards_update_before_create() {
        let f = fixture();
        let reconciler = TableReconciler::<Category>::new(f.store.clone(), f.outbox.clone(), f.remote.clone())
            .with_order(ReplayOrder::NewestFirst);
        f.store.put(&Category::expense(1, "Rent")).unwrap();
        f.outbox.append(ChangeLogEntry::pending("categories", 1).with_timestamp(1)).unwrap();
        f.outbox.append(ChangeLogEntry::updated("categories", 1).with_timestamp(2)).unwrap();

        let report = reconciler.synchronize().into_report().unwrap();
        assert_eq!(report.synced, 1);
        assert_eq!(report.discarded, 1);
        assert_eq!(f.remote.calls(), vec![RemoteCall::Create(1)]);
    }
}
