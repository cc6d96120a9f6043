//! JSON-file stores for persistent storage.
//!
//! A data directory holds one `<table>.json` per record kind, the shared
//! `outbox.json` and an advisory `LOCK` file. Handles keep no snapshot:
//! every operation takes the lock and reads the file, and mutations write
//! the result back before the lock is released. Several handles, in one
//! process or several, can therefore share a directory without losing
//! each other's writes.
//!
//! Files are written to a sibling temp file, synced, then renamed over the
//! original so a crash never leaves a half-written file behind.

use crate::entity_store::EntityStore;
use crate::error::StoreResult;
use crate::outbox::{OutboxStore, ReplayOrder};
use fintrack_model::{ChangeLogEntry, SyncEntity};
use fs2::FileExt;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

/// Name of the outbox file inside a data directory.
const OUTBOX_FILE: &str = "outbox.json";

/// Name of the advisory lock file inside a data directory.
const LOCK_FILE: &str = "LOCK";

/// Advisory lock on a data directory, held for one store operation.
///
/// Released when dropped.
struct DirLock {
    _file: File,
}

impl DirLock {
    fn open(path: &Path) -> StoreResult<File> {
        Ok(OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?)
    }

    /// Blocks until no writer holds the lock.
    fn shared(path: &Path) -> StoreResult<Self> {
        let file = Self::open(path)?;
        FileExt::lock_shared(&file)?;
        Ok(Self { _file: file })
    }

    /// Blocks until no other handle holds the lock.
    fn exclusive(path: &Path) -> StoreResult<Self> {
        let file = Self::open(path)?;
        FileExt::lock_exclusive(&file)?;
        Ok(Self { _file: file })
    }
}

fn read_json<T: DeserializeOwned + Default>(path: &Path) -> StoreResult<T> {
    if !path.exists() {
        return Ok(T::default());
    }
    let bytes = fs::read(path)?;
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    Ok(serde_json::from_slice(&bytes)?)
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> StoreResult<()> {
    let bytes = serde_json::to_vec_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    {
        let mut file = File::create(&tmp)?;
        file.write_all(&bytes)?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

/// A file-backed entity store holding one record kind.
///
/// Records live in `<dir>/<table>.json` as a JSON array.
///
/// # Example
///
/// ```no_run
/// use fintrack_model::Category;
/// use fintrack_store::{EntityStore, FileEntityStore};
/// use std::path::Path;
///
/// let store = FileEntityStore::<Category>::open(Path::new("data")).unwrap();
/// store.put(&Category::expense(1, "Rent")).unwrap();
/// ```
#[derive(Debug)]
pub struct FileEntityStore<E> {
    path: PathBuf,
    lock_path: PathBuf,
    _kind: PhantomData<fn() -> E>,
}

impl<E: SyncEntity> FileEntityStore<E> {
    /// Opens or creates the store inside `dir`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or an existing
    /// file cannot be decoded.
    pub fn open(dir: &Path) -> StoreResult<Self> {
        fs::create_dir_all(dir)?;
        let store = Self {
            path: dir.join(format!("{}.json", E::TABLE)),
            lock_path: dir.join(LOCK_FILE),
            _kind: PhantomData,
        };
        let records = {
            let _lock = DirLock::shared(&store.lock_path)?;
            store.load()?
        };
        tracing::debug!(table = E::TABLE, records = records.len(), "opened entity file");
        Ok(store)
    }

    /// Returns the path to the underlying file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the file. The caller holds the directory lock.
    fn load(&self) -> StoreResult<BTreeMap<u64, E>> {
        let list: Vec<E> = read_json(&self.path)?;
        Ok(list.into_iter().map(|e| (e.local_id(), e)).collect())
    }

    /// Writes the file. The caller holds the directory lock exclusively.
    fn persist(&self, records: &BTreeMap<u64, E>) -> StoreResult<()> {
        let list: Vec<&E> = records.values().collect();
        write_json(&self.path, &list)
    }
}

impl<E: SyncEntity> EntityStore<E> for FileEntityStore<E> {
    fn get(&self, local_id: u64) -> StoreResult<Option<E>> {
        let _lock = DirLock::shared(&self.lock_path)?;
        Ok(self.load()?.remove(&local_id))
    }

    fn put(&self, entity: &E) -> StoreResult<()> {
        let _lock = DirLock::exclusive(&self.lock_path)?;
        let mut records = self.load()?;
        records.insert(entity.local_id(), entity.clone());
        self.persist(&records)
    }

    fn remove(&self, local_id: u64) -> StoreResult<Option<E>> {
        let _lock = DirLock::exclusive(&self.lock_path)?;
        let mut records = self.load()?;
        let removed = records.remove(&local_id);
        if removed.is_some() {
            self.persist(&records)?;
        }
        Ok(removed)
    }

    fn list(&self) -> StoreResult<Vec<E>> {
        let _lock = DirLock::shared(&self.lock_path)?;
        Ok(self.load()?.into_values().collect())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OutboxFile {
    next_id: u64,
    entries: Vec<ChangeLogEntry>,
}

impl Default for OutboxFile {
    fn default() -> Self {
        Self {
            next_id: 1,
            entries: Vec::new(),
        }
    }
}

/// A file-backed outbox shared by all tables of a data directory.
///
/// Entry ids come from a counter stored in the file, so ids stay unique
/// across handles and restarts.
#[derive(Debug)]
pub struct FileOutbox {
    path: PathBuf,
    lock_path: PathBuf,
}

impl FileOutbox {
    /// Opens or creates `<dir>/outbox.json`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or an existing
    /// file cannot be decoded.
    pub fn open(dir: &Path) -> StoreResult<Self> {
        fs::create_dir_all(dir)?;
        let outbox = Self {
            path: dir.join(OUTBOX_FILE),
            lock_path: dir.join(LOCK_FILE),
        };
        let state = {
            let _lock = DirLock::shared(&outbox.lock_path)?;
            outbox.load()?
        };
        tracing::debug!(entries = state.entries.len(), "opened outbox file");
        Ok(outbox)
    }

    /// Returns the path to the underlying file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns every entry across all tables in insertion order.
    pub fn entries(&self) -> StoreResult<Vec<ChangeLogEntry>> {
        let _lock = DirLock::shared(&self.lock_path)?;
        Ok(self.load()?.entries)
    }

    fn load(&self) -> StoreResult<OutboxFile> {
        read_json(&self.path)
    }
}

impl OutboxStore for FileOutbox {
    fn list_pending(&self, table: &str, order: ReplayOrder) -> StoreResult<Vec<ChangeLogEntry>> {
        let mut pending: Vec<_> = self
            .entries()?
            .into_iter()
            .filter(|e| e.table_name == table)
            .collect();
        order.sort(&mut pending);
        Ok(pending)
    }

    fn append(&self, mut entry: ChangeLogEntry) -> StoreResult<ChangeLogEntry> {
        let _lock = DirLock::exclusive(&self.lock_path)?;
        let mut state = self.load()?;
        entry.id = state.next_id;
        state.next_id += 1;
        state.entries.push(entry.clone());
        write_json(&self.path, &state)?;
        Ok(entry)
    }

    fn remove(&self, entry: &ChangeLogEntry) -> StoreResult<bool> {
        let _lock = DirLock::exclusive(&self.lock_path)?;
        let mut state = self.load()?;
        let before = state.entries.len();
        state.entries.retain(|e| e.id != entry.id);
        if state.entries.len() == before {
            return Ok(false);
        }
        write_json(&self.path, &state)?;
        Ok(true)
    }

    fn len(&self) -> StoreResult<usize> {
        Ok(self.entries()?.len())
    }
}
