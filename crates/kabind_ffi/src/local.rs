//! Local store FFI functions.

use crate::buffer::{read_str, KabBuffer, KabSlice};
use crate::error::{clear_last_error, null_argument, store_failure, ArgError, KabResult};
use crate::passthrough;
use crate::types::{local_handle, KabLocalDb, KabOpenMode, KabStats, LocalHandle};
use kabind_client::{LocalStore, StoreClient, MEMORY_PATH};
use std::ffi::{c_char, c_void};

/// Opens a local store.
///
/// # Arguments
///
/// * `path` - Snapshot path, or null / `":memory:"` for an in-memory store
/// * `mode` - `KabOpenMode` value, `Read` (1) or `Write` (2); write mode
///   creates a missing snapshot. Other values fail with `InvalidArgument`.
/// * `out_handle` - Output pointer for the store handle
///
/// # Returns
///
/// `KabResult::Ok` on success, error code otherwise.
///
/// # Safety
///
/// - `path` must be null or a valid null-terminated UTF-8 string
/// - `out_handle` must be a valid pointer
#[no_mangle]
pub unsafe extern "C" fn kab_local_open(
    path: *const c_char,
    mode: i32,
    out_handle: *mut *mut KabLocalDb,
) -> KabResult {
    clear_last_error();

    if out_handle.is_null() {
        return null_argument();
    }
    *out_handle = std::ptr::null_mut();

    let Some(mode) = KabOpenMode::from_raw(mode) else {
        return ArgError::Unknown("mode", mode).report();
    };
    let path = if path.is_null() {
        MEMORY_PATH
    } else {
        match read_str(path, "path") {
            Ok(path) => path,
            Err(e) => return e.report(),
        }
    };

    match LocalStore::open(path, mode.into()) {
        Ok(store) => {
            let boxed = Box::new(LocalHandle::new(store));
            *out_handle = Box::into_raw(boxed).cast();
            KabResult::Ok
        }
        Err(e) => store_failure(&e),
    }
}

/// Closes a local store, writing its snapshot, and frees the handle.
///
/// The handle is freed even when writing the snapshot fails.
///
/// # Safety
///
/// The handle must have been returned by `kab_local_open` and must not be
/// used after this call.
#[no_mangle]
pub unsafe extern "C" fn kab_local_close(handle: *mut KabLocalDb) -> KabResult {
    clear_last_error();

    if handle.is_null() {
        return null_argument();
    }

    // Take ownership and drop
    let handle = Box::from_raw(handle.cast::<LocalHandle>());
    passthrough::close(&handle.client)
}

/// Gets the value of `key`.
///
/// Returns `NotFound` with an empty buffer when the key is missing.
/// Free the buffer with `kab_free_buffer`.
///
/// # Safety
///
/// - `handle` must be a valid local store handle
/// - `key` must describe readable memory
/// - `out_buffer` must be a valid pointer
#[no_mangle]
pub unsafe extern "C" fn kab_local_get(
    handle: *mut KabLocalDb,
    key: KabSlice,
    out_buffer: *mut KabBuffer,
) -> KabResult {
    clear_last_error();
    match local_handle(handle) {
        Some(h) => passthrough::get(&h.client, key, out_buffer),
        None => null_argument(),
    }
}

/// Sets `key` to `value`, overwriting any previous value.
///
/// # Safety
///
/// - `handle` must be a valid local store handle
/// - `key` and `value` must describe readable memory
#[no_mangle]
pub unsafe extern "C" fn kab_local_set(
    handle: *mut KabLocalDb,
    key: KabSlice,
    value: KabSlice,
) -> KabResult {
    clear_last_error();
    match local_handle(handle) {
        Some(h) => passthrough::write(&h.client, key, value, |c, k, v| c.set(k, v)),
        None => null_argument(),
    }
}

/// Adds `key` only if it does not exist yet.
///
/// # Safety
///
/// - `handle` must be a valid local store handle
/// - `key` and `value` must describe readable memory
#[no_mangle]
pub unsafe extern "C" fn kab_local_add(
    handle: *mut KabLocalDb,
    key: KabSlice,
    value: KabSlice,
) -> KabResult {
    clear_last_error();
    match local_handle(handle) {
        Some(h) => passthrough::write(&h.client, key, value, |c, k, v| c.add(k, v)),
        None => null_argument(),
    }
}

/// Replaces the value of an existing `key`.
///
/// # Safety
///
/// - `handle` must be a valid local store handle
/// - `key` and `value` must describe readable memory
#[no_mangle]
pub unsafe extern "C" fn kab_local_replace(
    handle: *mut KabLocalDb,
    key: KabSlice,
    value: KabSlice,
) -> KabResult {
    clear_last_error();
    match local_handle(handle) {
        Some(h) => passthrough::write(&h.client, key, value, |c, k, v| c.replace(k, v)),
        None => null_argument(),
    }
}

/// Appends `value` to `key`, creating it when missing.
///
/// # Safety
///
/// - `handle` must be a valid local store handle
/// - `key` and `value` must describe readable memory
#[no_mangle]
pub unsafe extern "C" fn kab_local_append(
    handle: *mut KabLocalDb,
    key: KabSlice,
    value: KabSlice,
) -> KabResult {
    clear_last_error();
    match local_handle(handle) {
        Some(h) => passthrough::write(&h.client, key, value, |c, k, v| c.append(k, v)),
        None => null_argument(),
    }
}

/// Removes `key`.
///
/// # Safety
///
/// - `handle` must be a valid local store handle
/// - `key` must describe readable memory
#[no_mangle]
pub unsafe extern "C" fn kab_local_remove(handle: *mut KabLocalDb, key: KabSlice) -> KabResult {
    clear_last_error();
    match local_handle(handle) {
        Some(h) => passthrough::remove(&h.client, key),
        None => null_argument(),
    }
}

/// Adds `delta` to the counter at `key`, starting from `initial` when
/// missing. `*out_value` receives the new value.
///
/// # Safety
///
/// - `handle` must be a valid local store handle
/// - `key` must describe readable memory
/// - `out_value` must be a valid pointer
#[no_mangle]
pub unsafe extern "C" fn kab_local_increment(
    handle: *mut KabLocalDb,
    key: KabSlice,
    delta: i64,
    initial: i64,
    out_value: *mut i64,
) -> KabResult {
    clear_last_error();
    match local_handle(handle) {
        Some(h) => passthrough::increment(&h.client, key, delta, initial, out_value),
        None => null_argument(),
    }
}

/// Gets the number of records.
///
/// # Safety
///
/// - `handle` must be a valid local store handle
/// - `out_count` must be a valid pointer
#[no_mangle]
pub unsafe extern "C" fn kab_local_count(handle: *mut KabLocalDb, out_count: *mut i64) -> KabResult {
    clear_last_error();
    match local_handle(handle) {
        Some(h) => passthrough::count(&h.client, out_count),
        None => null_argument(),
    }
}

/// Removes every record.
///
/// # Safety
///
/// `handle` must be a valid local store handle.
#[no_mangle]
pub unsafe extern "C" fn kab_local_clear(handle: *mut KabLocalDb) -> KabResult {
    clear_last_error();
    match local_handle(handle) {
        Some(h) => passthrough::clear(&h.client),
        None => null_argument(),
    }
}

/// Sets `key` to `new_value` only if its current value is `old_value`.
///
/// # Safety
///
/// - `handle` must be a valid local store handle
/// - `key`, `old_value` and `new_value` must describe readable memory
#[no_mangle]
pub unsafe extern "C" fn kab_local_cas(
    handle: *mut KabLocalDb,
    key: KabSlice,
    old_value: KabSlice,
    new_value: KabSlice,
) -> KabResult {
    clear_last_error();
    let Some(h) = local_handle(handle) else {
        return null_argument();
    };
    let args = (
        key.as_bytes("key"),
        old_value.as_bytes("old_value"),
        new_value.as_bytes("new_value"),
    );
    let (key, old, new) = match args {
        (Ok(key), Ok(old), Ok(new)) => (key, old, new),
        (Err(e), _, _) | (_, Err(e), _) | (_, _, Err(e)) => return e.report(),
    };
    match h.client.compare_and_swap(key, old, new) {
        Ok(()) => KabResult::Ok,
        Err(e) => store_failure(&e),
    }
}

/// Writes the snapshot to disk. A no-op for in-memory stores.
///
/// # Safety
///
/// `handle` must be a valid local store handle.
#[no_mangle]
pub unsafe extern "C" fn kab_local_sync(handle: *mut KabLocalDb) -> KabResult {
    clear_last_error();
    let Some(h) = local_handle(handle) else {
        return null_argument();
    };
    match h.client.sync() {
        Ok(()) => KabResult::Ok,
        Err(e) => store_failure(&e),
    }
}

/// Begins a transaction. A hard transaction writes the snapshot when it
/// commits.
///
/// Fails with `Error` when a transaction is already open and with
/// `ReadOnly` in read mode.
///
/// # Safety
///
/// `handle` must be a valid local store handle.
#[no_mangle]
pub unsafe extern "C" fn kab_local_begin(handle: *mut KabLocalDb, hard: bool) -> KabResult {
    clear_last_error();
    let Some(h) = local_handle(handle) else {
        return null_argument();
    };
    match h.client.begin_transaction(hard) {
        Ok(()) => KabResult::Ok,
        Err(e) => store_failure(&e),
    }
}

/// Commits the open transaction. Fails with `InvalidArgument` when none is
/// open.
///
/// # Safety
///
/// `handle` must be a valid local store handle.
#[no_mangle]
pub unsafe extern "C" fn kab_local_commit(handle: *mut KabLocalDb) -> KabResult {
    clear_last_error();
    let Some(h) = local_handle(handle) else {
        return null_argument();
    };
    match h.client.commit() {
        Ok(()) => KabResult::Ok,
        Err(e) => store_failure(&e),
    }
}

/// Discards every change made since `kab_local_begin`.
///
/// # Safety
///
/// `handle` must be a valid local store handle.
#[no_mangle]
pub unsafe extern "C" fn kab_local_rollback(handle: *mut KabLocalDb) -> KabResult {
    clear_last_error();
    let Some(h) = local_handle(handle) else {
        return null_argument();
    };
    match h.client.rollback() {
        Ok(()) => KabResult::Ok,
        Err(e) => store_failure(&e),
    }
}

/// Callback invoked by `kab_local_apply` once per record.
///
/// The slices are only valid for the duration of the call.
pub type KabApplyFn = unsafe extern "C" fn(key: KabSlice, value: KabSlice, user_data: *mut c_void);

/// Calls `callback` with every record in ascending key order.
///
/// The walk sees the records as they were when it began; the callback may
/// write to the store.
///
/// # Safety
///
/// - `handle` must be a valid local store handle
/// - `callback` must be safe to call with `user_data`
#[no_mangle]
pub unsafe extern "C" fn kab_local_apply(
    handle: *mut KabLocalDb,
    callback: Option<KabApplyFn>,
    user_data: *mut c_void,
) -> KabResult {
    clear_last_error();
    let (Some(h), Some(callback)) = (local_handle(handle), callback) else {
        return null_argument();
    };
    let result = h.client.apply(|key, value| {
        callback(KabSlice::from_bytes(key), KabSlice::from_bytes(value), user_data);
    });
    match result {
        Ok(()) => KabResult::Ok,
        Err(e) => store_failure(&e),
    }
}

/// Returns the store error code of the most recent operation, or `-1` for
/// a null handle. Name it with `kab_error_name`.
///
/// # Safety
///
/// `handle` must be null or a valid local store handle.
#[no_mangle]
pub unsafe extern "C" fn kab_local_last_error_code(handle: *mut KabLocalDb) -> i32 {
    local_handle(handle).map_or(-1, |h| h.client.last_error().as_raw())
}

/// Gets bulk operation statistics.
///
/// # Safety
///
/// - `handle` must be a valid local store handle
/// - `out_stats` must be a valid pointer
#[no_mangle]
pub unsafe extern "C" fn kab_local_stats(handle: *mut KabLocalDb, out_stats: *mut KabStats) -> KabResult {
    clear_last_error();
    match local_handle(handle) {
        Some(h) if !out_stats.is_null() => {
            *out_stats = h.stats.snapshot();
            KabResult::Ok
        }
        _ => null_argument(),
    }
}
