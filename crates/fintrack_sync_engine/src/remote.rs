//! Remote entity client abstraction.

use crate::error::{SyncError, SyncResult};
use fintrack_model::{RemoteRecord, SyncEntity};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Result of a successful create call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome {
    /// The backend returned the created record.
    Created(RemoteRecord),
    /// The backend answered 2xx with an empty body. Accepted as success.
    EmptyBody,
}

/// Client for one record kind on the backend.
///
/// All calls block until the backend answers or the request fails. This
/// trait abstracts the network layer so the engine can be driven by the
/// REST adapter, a mock, or an in-process fake backend.
pub trait RemoteEntityClient<E: SyncEntity>: Send + Sync {
    /// Lists every record of this kind.
    fn list(&self) -> SyncResult<Vec<E>>;

    /// Creates a record.
    fn create(&self, entity: &E) -> SyncResult<CreateOutcome>;

    /// Replaces the record with the given remote id.
    fn update(&self, remote_id: u64, entity: &E) -> SyncResult<()>;

    /// Deletes the record with the given remote id. A record that is
    /// already gone counts as deleted.
    fn delete(&self, remote_id: u64) -> SyncResult<()>;
}

/// A call observed by [`MockRemote`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteCall {
    /// `list()`.
    List,
    /// `create()` for the given local id.
    Create(u64),
    /// `update()` for the given remote id.
    Update(u64),
    /// `delete()` for the given remote id.
    Delete(u64),
}

/// A scripted remote client for testing.
///
/// Each call pops the next queued result for its kind. With nothing queued,
/// creates succeed with ids counting up from 1000 and other calls succeed.
pub struct MockRemote<E> {
    connected: AtomicBool,
    next_id: AtomicU64,
    calls: Mutex<Vec<RemoteCall>>,
    listing: Mutex<Vec<E>>,
    create_results: Mutex<VecDeque<SyncResult<CreateOutcome>>>,
    update_results: Mutex<VecDeque<SyncResult<()>>>,
    delete_results: Mutex<VecDeque<SyncResult<()>>>,
}

impl<E: SyncEntity> MockRemote<E> {
    /// Creates a connected mock with nothing queued.
    pub fn new() -> Self {
        Self {
            connected: AtomicBool::new(true),
            next_id: AtomicU64::new(1000),
            calls: Mutex::new(Vec::new()),
            listing: Mutex::new(Vec::new()),
            create_results: Mutex::new(VecDeque::new()),
            update_results: Mutex::new(VecDeque::new()),
            delete_results: Mutex::new(VecDeque::new()),
        }
    }

    /// Queues the result of the next `create()`.
    pub fn push_create(&self, result: SyncResult<CreateOutcome>) {
        self.create_results.lock().push_back(result);
    }

    /// Queues the result of the next `update()`.
    pub fn push_update(&self, result: SyncResult<()>) {
        self.update_results.lock().push_back(result);
    }

    /// Queues the result of the next `delete()`.
    pub fn push_delete(&self, result: SyncResult<()>) {
        self.delete_results.lock().push_back(result);
    }

    /// Sets what `list()` returns.
    pub fn set_listing(&self, records: Vec<E>) {
        *self.listing.lock() = records;
    }

    /// Sets the connected state. A disconnected mock fails every call.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Returns every call made so far.
    pub fn calls(&self) -> Vec<RemoteCall> {
        self.calls.lock().clone()
    }

    /// Returns the number of calls made so far.
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    fn record(&self, call: RemoteCall) -> SyncResult<()> {
        self.calls.lock().push(call);
        if self.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(SyncError::Network("connection refused".into()))
        }
    }
}

impl<E: SyncEntity> Default for MockRemote<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: SyncEntity> RemoteEntityClient<E> for MockRemote<E> {
    fn list(&self) -> SyncResult<Vec<E>> {
        self.record(RemoteCall::List)?;
        Ok(self.listing.lock().clone())
    }

    fn create(&self, entity: &E) -> SyncResult<CreateOutcome> {
        self.record(RemoteCall::Create(entity.local_id()))?;
        self.create_results.lock().pop_front().unwrap_or_else(|| {
            Ok(CreateOutcome::Created(RemoteRecord {
                id: self.next_id.fetch_add(1, Ordering::SeqCst),
                local_id: Some(entity.local_id()),
                name: Some(entity.name().to_string()),
            }))
        })
    }

    fn update(&self, remote_id: u64, _entity: &E) -> SyncResult<()> {
        self.record(RemoteCall::Update(remote_id))?;
        self.update_results.lock().pop_front().unwrap_or(Ok(()))
    }

    fn delete(&self, remote_id: u64) -> SyncResult<()> {
        self.record(RemoteCall::Delete(remote_id))?;
        self.delete_results.lock().pop_front().unwrap_or(Ok(()))
    }
}
