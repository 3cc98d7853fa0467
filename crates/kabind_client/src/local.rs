//! Embedded local store.

use crate::client::{PatternMatch, SlotState, StoreClient};
use crate::engine::{LastError, RecordMap};
use crate::error::{ErrorCode, StoreError, StoreResult};
use crate::snapshot;
use parking_lot::{Mutex, RwLock};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

/// Path that opens a store with no snapshot file.
pub const MEMORY_PATH: &str = ":memory:";

/// Access mode of a local store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OpenMode {
    /// Read-only access; every mutation fails with `NoPermission`.
    Read,
    /// Read and write access (there is no write-only mode).
    #[default]
    Write,
}

/// Options for opening a local store.
#[derive(Debug, Clone)]
pub struct LocalOptions {
    /// Access mode.
    pub mode: OpenMode,
    /// Whether a missing snapshot is created (write mode only).
    pub create_if_missing: bool,
    /// Whether `close` writes the snapshot.
    pub sync_on_close: bool,
}

impl Default for LocalOptions {
    fn default() -> Self {
        Self {
            mode: OpenMode::Write,
            create_if_missing: true,
            sync_on_close: true,
        }
    }
}

impl LocalOptions {
    /// Creates options with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the access mode.
    #[must_use]
    pub const fn mode(mut self, mode: OpenMode) -> Self {
        self.mode = mode;
        self
    }

    /// Sets whether a missing snapshot is created.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets whether `close` writes the snapshot.
    #[must_use]
    pub const fn sync_on_close(mut self, value: bool) -> Self {
        self.sync_on_close = value;
        self
    }
}

/// An open transaction: the records as they were when it began.
#[derive(Debug)]
struct Transaction {
    backup: RecordMap,
    hard: bool,
}

/// Waits for a walk started by [`LocalStore::apply_async`].
#[derive(Debug)]
pub struct ApplyWaiter {
    handle: JoinHandle<()>,
}

impl ApplyWaiter {
    /// Blocks until every record has been visited.
    ///
    /// Fails with `System` when the callback panicked.
    pub fn wait(self) -> StoreResult<()> {
        self.handle
            .join()
            .map_err(|_| StoreError::new(ErrorCode::System, "apply callback panicked"))
    }
}

/// An embedded key-value store backed by an optional CBOR snapshot.
///
/// All records are held in memory behind a read-write lock, so the store can
/// be shared across threads. The snapshot is written on [`LocalStore::sync`]
/// and, unless disabled, on close.
///
/// # Example
///
/// ```rust
/// use kabind_client::{LocalStore, StoreClient};
///
/// let store = LocalStore::in_memory();
/// store.set(b"user:1", b"ada").unwrap();
/// assert_eq!(store.get(b"user:1").unwrap(), Some(b"ada".to_vec()));
/// ```
#[derive(Debug)]
pub struct LocalStore {
    path: Option<PathBuf>,
    options: LocalOptions,
    records: RwLock<RecordMap>,
    transaction: Mutex<Option<Transaction>>,
    closed: AtomicBool,
    last_error: LastError,
}

impl LocalStore {
    /// Opens a purely in-memory store in write mode.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::with_records(None, LocalOptions::default(), RecordMap::new())
    }

    /// Opens the store at `path` with default options for `mode`.
    pub fn open(path: impl AsRef<Path>, mode: OpenMode) -> StoreResult<Self> {
        Self::open_with_options(path, LocalOptions::default().mode(mode))
    }

    /// Opens the store at `path`.
    ///
    /// `":memory:"` opens an in-memory store. A missing snapshot is created
    /// in write mode when `create_if_missing` is set, and fails with
    /// `NoRepository` otherwise.
    pub fn open_with_options(path: impl AsRef<Path>, options: LocalOptions) -> StoreResult<Self> {
        let path = path.as_ref();
        if path.as_os_str() == MEMORY_PATH {
            return Ok(Self::with_records(None, options, RecordMap::new()));
        }

        let records = if path.exists() {
            RecordMap::from_records(snapshot::load(path)?)
        } else if options.mode == OpenMode::Write && options.create_if_missing {
            let records = RecordMap::new();
            snapshot::save(path, records.records())?;
            records
        } else {
            return Err(StoreError::new(
                ErrorCode::NoRepository,
                format!("no store at {}", path.display()),
            ));
        };

        info!(path = %path.display(), mode = ?options.mode, records = records.len(), "opened local store");
        Ok(Self::with_records(Some(path.to_path_buf()), options, records))
    }

    fn with_records(path: Option<PathBuf>, options: LocalOptions, records: RecordMap) -> Self {
        Self {
            path,
            options,
            records: RwLock::new(records),
            transaction: Mutex::new(None),
            closed: AtomicBool::new(false),
            last_error: LastError::default(),
        }
    }

    /// Returns the snapshot path, `None` for in-memory stores.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Returns the access mode.
    pub fn mode(&self) -> OpenMode {
        self.options.mode
    }

    /// Writes the snapshot. A no-op for in-memory stores.
    pub fn sync(&self) -> StoreResult<()> {
        self.last_error.track(self.sync_inner())
    }

    fn sync_inner(&self) -> StoreResult<()> {
        self.check_writable()?;
        if let Some(path) = &self.path {
            let records = self.records.read();
            snapshot::save(path, records.records())?;
            debug!(path = %path.display(), records = records.len(), "wrote snapshot");
        }
        Ok(())
    }

    /// Sets `key` to `new` only if its current value is `old`.
    pub fn compare_and_swap(&self, key: &[u8], old: &[u8], new: &[u8]) -> StoreResult<()> {
        self.last_error.track(self.write(|r| r.compare_and_swap(key, old, new)))
    }

    /// Begins a transaction.
    ///
    /// A hard transaction writes the snapshot when it commits; a soft one
    /// only makes its changes visible. Only one transaction may be open at
    /// a time; beginning a second fails with `Logic`.
    pub fn begin_transaction(&self, hard: bool) -> StoreResult<()> {
        self.last_error.track(self.begin_inner(hard))
    }

    fn begin_inner(&self, hard: bool) -> StoreResult<()> {
        self.check_writable()?;
        let mut transaction = self.transaction.lock();
        if transaction.is_some() {
            return Err(StoreError::new(
                ErrorCode::Logic,
                "a transaction is already in progress",
            ));
        }
        let backup = self.records.read().clone();
        *transaction = Some(Transaction { backup, hard });
        debug!(hard, "began transaction");
        Ok(())
    }

    /// Commits the open transaction.
    pub fn commit(&self) -> StoreResult<()> {
        self.last_error.track(self.end_transaction(true))
    }

    /// Discards every change made since the transaction began.
    pub fn rollback(&self) -> StoreResult<()> {
        self.last_error.track(self.end_transaction(false))
    }

    /// Returns true while a transaction is open.
    pub fn in_transaction(&self) -> bool {
        self.transaction.lock().is_some()
    }

    fn end_transaction(&self, commit: bool) -> StoreResult<()> {
        self.check_open()?;
        let transaction = self
            .transaction
            .lock()
            .take()
            .ok_or_else(|| StoreError::new(ErrorCode::Invalid, "no transaction in progress"))?;
        if !commit {
            *self.records.write() = transaction.backup;
        } else if transaction.hard {
            self.sync_inner()?;
        }
        debug!(commit, hard = transaction.hard, "ended transaction");
        Ok(())
    }

    /// Calls `f` with every record in ascending key order.
    ///
    /// The walk sees the records as they were when it began, so `f` may
    /// write to the store.
    pub fn apply<F>(&self, mut f: F) -> StoreResult<()>
    where
        F: FnMut(&[u8], &[u8]),
    {
        let records = self.last_error.track(self.read(|r| Ok(r.clone())))?;
        for (key, value) in records.records() {
            f(key, value);
        }
        Ok(())
    }

    /// Like [`LocalStore::apply`], walking the records on a background thread.
    pub fn apply_async<F>(&self, mut f: F) -> StoreResult<ApplyWaiter>
    where
        F: FnMut(&[u8], &[u8]) + Send + 'static,
    {
        let records = self.last_error.track(self.read(|r| Ok(r.clone())))?;
        let handle = thread::Builder::new()
            .name("kabind-apply".to_string())
            .spawn(move || {
                for (key, value) in records.records() {
                    f(key, value);
                }
            })?;
        Ok(ApplyWaiter { handle })
    }

    fn check_open(&self) -> StoreResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StoreError::closed());
        }
        Ok(())
    }

    fn check_writable(&self) -> StoreResult<()> {
        self.check_open()?;
        if self.options.mode == OpenMode::Read {
            return Err(StoreError::read_only());
        }
        Ok(())
    }

    fn read<T>(&self, f: impl FnOnce(&RecordMap) -> StoreResult<T>) -> StoreResult<T> {
        self.check_open()?;
        f(&self.records.read())
    }

    fn write<T>(&self, f: impl FnOnce(&mut RecordMap) -> StoreResult<T>) -> StoreResult<T> {
        self.check_writable()?;
        f(&mut self.records.write())
    }
}

impl StoreClient for LocalStore {
    fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        let value = self.last_error.track(self.read(|r| Ok(r.get(key).cloned())))?;
        if value.is_none() {
            self.last_error.set(ErrorCode::NoRecord);
        }
        Ok(value)
    }

    fn set(&self, key: &[u8], value: &[u8]) -> StoreResult<()> {
        self.last_error.track(self.write(|r| {
            r.set(key, value);
            Ok(())
        }))
    }

    fn add(&self, key: &[u8], value: &[u8]) -> StoreResult<()> {
        self.last_error.track(self.write(|r| r.add(key, value)))
    }

    fn replace(&self, key: &[u8], value: &[u8]) -> StoreResult<()> {
        self.last_error.track(self.write(|r| r.replace(key, value)))
    }

    fn append(&self, key: &[u8], value: &[u8]) -> StoreResult<()> {
        self.last_error.track(self.write(|r| {
            r.append(key, value);
            Ok(())
        }))
    }

    fn remove(&self, key: &[u8]) -> StoreResult<()> {
        self.last_error.track(self.write(|r| r.remove(key)))
    }

    fn increment(&self, key: &[u8], delta: i64, initial: i64) -> StoreResult<i64> {
        self.last_error.track(self.write(|r| r.increment(key, delta, initial)))
    }

    fn count(&self) -> StoreResult<i64> {
        self.last_error.track(self.read(|r| Ok(r.len() as i64)))
    }

    fn clear(&self) -> StoreResult<()> {
        self.last_error.track(self.write(|r| {
            r.clear();
            Ok(())
        }))
    }

    fn close(&self) -> StoreResult<()> {
        let result = self.check_open().and_then(|()| {
            if let Some(transaction) = self.transaction.lock().take() {
                warn!(path = ?self.path, "rolling back transaction left open at close");
                *self.records.write() = transaction.backup;
            }
            if self.options.sync_on_close && self.options.mode == OpenMode::Write {
                self.sync_inner()?;
            }
            self.closed.store(true, Ordering::Release);
            Ok(())
        });
        if result.is_ok() {
            info!(path = ?self.path, "closed local store");
        }
        self.last_error.track(result)
    }

    fn last_error(&self) -> ErrorCode {
        self.last_error.get()
    }

    fn record_error(&self, code: ErrorCode) {
        self.last_error.set(code);
    }

    fn match_prefix_into(&self, prefix: &[u8], slots: &mut [Vec<u8>]) -> StoreResult<usize> {
        self.last_error
            .track(self.read(|r| Ok(r.match_prefix_into(prefix, slots))))
    }

    fn get_bulk_into(
        &self,
        keys: &[&[u8]],
        slots: &mut [Vec<u8>],
        states: &mut [SlotState],
    ) -> StoreResult<usize> {
        self.last_error
            .track(self.read(|r| r.get_bulk_into(keys, slots, states)))
    }

    fn set_bulk(&self, pairs: &[(&[u8], &[u8])]) -> StoreResult<usize> {
        self.last_error.track(self.write(|r| Ok(r.set_bulk(pairs))))
    }

    fn remove_bulk(&self, keys: &[&[u8]]) -> StoreResult<usize> {
        self.last_error.track(self.write(|r| Ok(r.remove_bulk(keys))))
    }
}

impl PatternMatch for LocalStore {
    fn match_regex_into(&self, pattern: &str, slots: &mut [Vec<u8>]) -> StoreResult<usize> {
        self.last_error
            .track(self.read(|r| r.match_regex_into(pattern, slots)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn in_memory_basic_ops() {
        let store = LocalStore::in_memory();
        store.set(b"k", b"v").unwrap();
        store.append(b"k", b"w").unwrap();
        assert_eq!(store.get(b"k").unwrap(), Some(b"vw".to_vec()));
        assert_eq!(store.count().unwrap(), 1);

        store.remove(b"k").unwrap();
        assert_eq!(store.get(b"k").unwrap(), None);
        assert_eq!(store.last_error(), ErrorCode::NoRecord);
    }

    #[test]
    fn failed_remove_records_last_error() {
        let store = LocalStore::in_memory();
        let err = store.remove(b"missing").unwrap_err();
        assert_eq!(err.code(), ErrorCode::NoRecord);
        assert_eq!(store.last_error(), ErrorCode::NoRecord);

        store.set(b"k", b"v").unwrap();
        assert_eq!(store.last_error(), ErrorCode::Success);
    }

    #[test]
    fn read_mode_rejects_writes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.kab");
        {
            let store = LocalStore::open(&path, OpenMode::Write).unwrap();
            store.set(b"k", b"v").unwrap();
            store.close().unwrap();
        }

        let store = LocalStore::open(&path, OpenMode::Read).unwrap();
        assert_eq!(store.get(b"k").unwrap(), Some(b"v".to_vec()));
        let err = store.set(b"k", b"w").unwrap_err();
        assert_eq!(err.code(), ErrorCode::NoPermission);
        assert_eq!(store.last_error(), ErrorCode::NoPermission);
    }

    #[test]
    fn read_mode_missing_file_fails() {
        let dir = TempDir::new().unwrap();
        let err = LocalStore::open(dir.path().join("none.kab"), OpenMode::Read).unwrap_err();
        assert_eq!(err.code(), ErrorCode::NoRepository);
    }

    #[test]
    fn close_persists_and_reopen_restores() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.kab");

        let store = LocalStore::open(&path, OpenMode::Write).unwrap();
        store.set(b"a", b"1").unwrap();
        store.increment(b"n", 2, 0).unwrap();
        store.close().unwrap();

        let reopened = LocalStore::open(&path, OpenMode::Write).unwrap();
        assert_eq!(reopened.count().unwrap(), 2);
        assert_eq!(reopened.increment(b"n", 1, 0).unwrap(), 3);
    }

    #[test]
    fn sync_on_close_disabled_discards_changes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.kab");
        let options = LocalOptions::new().sync_on_close(false);

        let store = LocalStore::open_with_options(&path, options.clone()).unwrap();
        store.set(b"a", b"1").unwrap();
        store.close().unwrap();

        let reopened = LocalStore::open_with_options(&path, options).unwrap();
        assert_eq!(reopened.count().unwrap(), 0);
    }

    #[test]
    fn operations_after_close_are_invalid() {
        let store = LocalStore::in_memory();
        store.close().unwrap();
        assert_eq!(store.get(b"k").unwrap_err().code(), ErrorCode::Invalid);
        assert_eq!(store.close().unwrap_err().code(), ErrorCode::Invalid);
    }

    #[test]
    fn memory_path_opens_in_memory() {
        let store = LocalStore::open(MEMORY_PATH, OpenMode::Write).unwrap();
        assert!(store.path().is_none());
        store.sync().unwrap();
    }

    #[test]
    fn rollback_restores_records() {
        let store = LocalStore::in_memory();
        store.set(b"a", b"1").unwrap();

        store.begin_transaction(false).unwrap();
        assert!(store.in_transaction());
        store.set(b"a", b"2").unwrap();
        store.set(b"b", b"3").unwrap();
        store.rollback().unwrap();

        assert!(!store.in_transaction());
        assert_eq!(store.get(b"a").unwrap(), Some(b"1".to_vec()));
        assert_eq!(store.get(b"b").unwrap(), None);
    }

    #[test]
    fn transaction_misuse() {
        let store = LocalStore::in_memory();
        assert_eq!(store.commit().unwrap_err().code(), ErrorCode::Invalid);
        assert_eq!(store.last_error(), ErrorCode::Invalid);

        store.begin_transaction(true).unwrap();
        assert_eq!(store.begin_transaction(false).unwrap_err().code(), ErrorCode::Logic);
        store.commit().unwrap();
        assert_eq!(store.last_error(), ErrorCode::Success);
    }

    #[test]
    fn hard_commit_writes_snapshot() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.kab");
        let store = LocalStore::open_with_options(&path, LocalOptions::new().sync_on_close(false))
            .unwrap();

        store.begin_transaction(true).unwrap();
        store.set(b"k", b"v").unwrap();
        store.commit().unwrap();
        store.close().unwrap();

        let reopened = LocalStore::open(&path, OpenMode::Read).unwrap();
        assert_eq!(reopened.get(b"k").unwrap(), Some(b"v".to_vec()));
    }

    #[test]
    fn close_rolls_back_open_transaction() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.kab");
        let store = LocalStore::open(&path, OpenMode::Write).unwrap();
        store.set(b"kept", b"1").unwrap();
        store.begin_transaction(false).unwrap();
        store.set(b"lost", b"2").unwrap();
        store.close().unwrap();

        let reopened = LocalStore::open(&path, OpenMode::Read).unwrap();
        assert_eq!(reopened.count().unwrap(), 1);
        assert_eq!(reopened.get(b"lost").unwrap(), None);
    }

    #[test]
    fn read_mode_cannot_begin() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.kab");
        LocalStore::open(&path, OpenMode::Write).unwrap().close().unwrap();
        let store = LocalStore::open(&path, OpenMode::Read).unwrap();
        let err = store.begin_transaction(false).unwrap_err();
        assert_eq!(err.code(), ErrorCode::NoPermission);
    }

    #[test]
    fn apply_visits_records_in_order() {
        let store = LocalStore::in_memory();
        for key in ["b", "a", "c"] {
            store.set(key.as_bytes(), b"v").unwrap();
        }
        let mut seen = Vec::new();
        store
            .apply(|key, _| {
                seen.push(key.to_vec());
                store.remove(key).unwrap();
            })
            .unwrap();
        assert_eq!(seen, vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn apply_async_walks_on_another_thread() {
        let store = LocalStore::in_memory();
        store.set(b"x", b"12").unwrap();
        store.set(b"y", b"345").unwrap();

        let total = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = total.clone();
        let waiter = store
            .apply_async(move |_, value| {
                counter.fetch_add(value.len(), Ordering::Relaxed);
            })
            .unwrap();
        waiter.wait().unwrap();
        assert_eq!(total.load(Ordering::Relaxed), 5);
    }

    #[test]
    fn record_error_overrides_last_success() {
        let store = LocalStore::in_memory();
        store.set(b"k", b"v").unwrap();
        store.record_error(ErrorCode::Invalid);
        assert_eq!(store.last_error(), ErrorCode::Invalid);
    }

    #[test]
    fn compare_and_swap_updates_last_error() {
        let store = LocalStore::in_memory();
        store.set(b"k", b"a").unwrap();
        assert!(store.compare_and_swap(b"k", b"b", b"c").is_err());
        assert_eq!(store.last_error(), ErrorCode::Logic);
        store.compare_and_swap(b"k", b"a", b"c").unwrap();
        assert_eq!(store.get(b"k").unwrap(), Some(b"c".to_vec()));
    }
}
