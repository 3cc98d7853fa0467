//! Type definitions for FFI.

use kabind_client::{LocalStore, OpenMode, RemoteStore};
use kabind_marshal::Marshaler;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// An opaque local store handle.
///
/// This is a pointer to the internal store structure.
/// Never dereference or modify directly.
#[repr(C)]
pub struct KabLocalDb {
    _private: [u8; 0],
}

/// An opaque remote store handle.
#[repr(C)]
pub struct KabRemoteDb {
    _private: [u8; 0],
}

/// Access mode for `kab_local_open`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KabOpenMode {
    /// Read-only; every mutation fails with `ReadOnly`.
    Read = 1,
    /// Read and write.
    Write = 2,
}

impl KabOpenMode {
    /// Converts a raw C value, `None` for anything but 1 or 2.
    pub fn from_raw(mode: i32) -> Option<Self> {
        match mode {
            1 => Some(KabOpenMode::Read),
            2 => Some(KabOpenMode::Write),
            _ => None,
        }
    }
}

impl From<KabOpenMode> for OpenMode {
    fn from(mode: KabOpenMode) -> Self {
        match mode {
            KabOpenMode::Read => OpenMode::Read,
            KabOpenMode::Write => OpenMode::Write,
        }
    }
}

/// Bulk operation statistics snapshot.
///
/// Counters are cumulative since the handle was opened.
/// Use `kab_local_stats()` or `kab_remote_stats()` to read them.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KabStats {
    /// Number of prefix match calls.
    pub match_prefix_calls: u64,
    /// Number of pattern match calls.
    pub match_regex_calls: u64,
    /// Number of bulk get calls.
    pub get_bulk_calls: u64,
    /// Number of bulk set calls.
    pub set_bulk_calls: u64,
    /// Number of bulk remove calls.
    pub remove_bulk_calls: u64,
    /// Number of procedure calls.
    pub play_script_calls: u64,
    /// Microseconds spent in prefix matches.
    pub match_prefix_micros: u64,
    /// Microseconds spent in pattern matches.
    pub match_regex_micros: u64,
    /// Microseconds spent in bulk gets.
    pub get_bulk_micros: u64,
    /// Microseconds spent in bulk sets.
    pub set_bulk_micros: u64,
    /// Microseconds spent in bulk removes.
    pub remove_bulk_micros: u64,
    /// Microseconds spent in procedure calls.
    pub play_script_micros: u64,
    /// Number of bulk calls that failed.
    pub failures: u64,
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum BulkOp {
    MatchPrefix,
    MatchRegex,
    GetBulk,
    SetBulk,
    RemoveBulk,
    PlayScript,
}

const BULK_OPS: usize = 6;

/// Atomic per-operation counters behind [`KabStats`].
#[derive(Debug, Default)]
pub(crate) struct OpStats {
    calls: [AtomicU64; BULK_OPS],
    micros: [AtomicU64; BULK_OPS],
    failures: AtomicU64,
}

impl OpStats {
    pub(crate) fn record(&self, op: BulkOp, elapsed: Duration, ok: bool) {
        let i = op as usize;
        self.calls[i].fetch_add(1, Ordering::Relaxed);
        let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        self.micros[i].fetch_add(micros, Ordering::Relaxed);
        if !ok {
            self.failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn snapshot(&self) -> KabStats {
        let calls = |op: BulkOp| self.calls[op as usize].load(Ordering::Relaxed);
        let micros = |op: BulkOp| self.micros[op as usize].load(Ordering::Relaxed);
        KabStats {
            match_prefix_calls: calls(BulkOp::MatchPrefix),
            match_regex_calls: calls(BulkOp::MatchRegex),
            get_bulk_calls: calls(BulkOp::GetBulk),
            set_bulk_calls: calls(BulkOp::SetBulk),
            remove_bulk_calls: calls(BulkOp::RemoveBulk),
            play_script_calls: calls(BulkOp::PlayScript),
            match_prefix_micros: micros(BulkOp::MatchPrefix),
            match_regex_micros: micros(BulkOp::MatchRegex),
            get_bulk_micros: micros(BulkOp::GetBulk),
            set_bulk_micros: micros(BulkOp::SetBulk),
            remove_bulk_micros: micros(BulkOp::RemoveBulk),
            play_script_micros: micros(BulkOp::PlayScript),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }
}

/// What an opaque store handle points to.
#[derive(Debug)]
pub(crate) struct StoreHandle<C> {
    pub(crate) client: C,
    pub(crate) marshaler: Marshaler,
    pub(crate) stats: OpStats,
}

impl<C> StoreHandle<C> {
    pub(crate) fn new(client: C) -> Self {
        Self {
            client,
            marshaler: Marshaler::default(),
            stats: OpStats::default(),
        }
    }
}

pub(crate) type LocalHandle = StoreHandle<LocalStore>;
pub(crate) type RemoteHandle = StoreHandle<RemoteStore>;

/// Borrows the store behind a local handle, `None` when null.
///
/// # Safety
///
/// `handle` must be null or a live handle from `kab_local_open`.
pub(crate) unsafe fn local_handle<'a>(handle: *mut KabLocalDb) -> Option<&'a LocalHandle> {
    (handle as *const LocalHandle).as_ref()
}

/// Borrows the store behind a remote handle, `None` when null.
///
/// # Safety
///
/// `handle` must be null or a live handle from `kab_remote_open`.
pub(crate) unsafe fn remote_handle<'a>(handle: *mut KabRemoteDb) -> Option<&'a RemoteHandle> {
    (handle as *const RemoteHandle).as_ref()
}
