//! Remote store FFI functions.

use crate::buffer::{read_str, KabBuffer, KabSlice};
use crate::error::{clear_last_error, null_argument, store_failure, KabResult};
use crate::passthrough;
use crate::types::{remote_handle, KabRemoteDb, KabStats, RemoteHandle};
use kabind_client::loopback::Endpoint;
use kabind_client::{RemoteOptions, RemoteStore, StoreClient};
use std::ffi::c_char;

/// Connects to a remote store.
///
/// # Arguments
///
/// * `host` - Host name (null-terminated UTF-8)
/// * `port` - Port number
/// * `timeout_secs` - Timeout in seconds; negative means the client default
/// * `out_handle` - Output pointer for the store handle
///
/// # Returns
///
/// `KabResult::Ok` on success, `KabResult::Network` when nothing answers at
/// the endpoint.
///
/// # Safety
///
/// - `host` must be a valid null-terminated UTF-8 string
/// - `out_handle` must be a valid pointer
#[no_mangle]
pub unsafe extern "C" fn kab_remote_open(
    host: *const c_char,
    port: u16,
    timeout_secs: f64,
    out_handle: *mut *mut KabRemoteDb,
) -> KabResult {
    clear_last_error();

    if out_handle.is_null() {
        return null_argument();
    }
    *out_handle = std::ptr::null_mut();

    let host = match read_str(host, "host") {
        Ok(host) => host,
        Err(e) => return e.report(),
    };
    let endpoint = Endpoint::new(host, port);

    match RemoteStore::connect(&endpoint, RemoteOptions::from_secs(timeout_secs)) {
        Ok(store) => {
            let boxed = Box::new(RemoteHandle::new(store));
            *out_handle = Box::into_raw(boxed).cast();
            KabResult::Ok
        }
        Err(e) => store_failure(&e),
    }
}

/// Closes the connection and frees the handle.
///
/// # Safety
///
/// The handle must have been returned by `kab_remote_open` and must not be
/// used after this call.
#[no_mangle]
pub unsafe extern "C" fn kab_remote_close(handle: *mut KabRemoteDb) -> KabResult {
    clear_last_error();

    if handle.is_null() {
        return null_argument();
    }

    let handle = Box::from_raw(handle.cast::<RemoteHandle>());
    passthrough::close(&handle.client)
}

/// Gets the value of `key`. See `kab_local_get`.
///
/// # Safety
///
/// - `handle` must be a valid remote store handle
/// - `key` must describe readable memory
/// - `out_buffer` must be a valid pointer
#[no_mangle]
pub unsafe extern "C" fn kab_remote_get(
    handle: *mut KabRemoteDb,
    key: KabSlice,
    out_buffer: *mut KabBuffer,
) -> KabResult {
    clear_last_error();
    match remote_handle(handle) {
        Some(h) => passthrough::get(&h.client, key, out_buffer),
        None => null_argument(),
    }
}

/// Sets `key` to `value`.
///
/// # Safety
///
/// - `handle` must be a valid remote store handle
/// - `key` and `value` must describe readable memory
#[no_mangle]
pub unsafe extern "C" fn kab_remote_set(
    handle: *mut KabRemoteDb,
    key: KabSlice,
    value: KabSlice,
) -> KabResult {
    clear_last_error();
    match remote_handle(handle) {
        Some(h) => passthrough::write(&h.client, key, value, |c, k, v| c.set(k, v)),
        None => null_argument(),
    }
}

/// Adds `key` only if it does not exist yet.
///
/// # Safety
///
/// - `handle` must be a valid remote store handle
/// - `key` and `value` must describe readable memory
#[no_mangle]
pub unsafe extern "C" fn kab_remote_add(
    handle: *mut KabRemoteDb,
    key: KabSlice,
    value: KabSlice,
) -> KabResult {
    clear_last_error();
    match remote_handle(handle) {
        Some(h) => passthrough::write(&h.client, key, value, |c, k, v| c.add(k, v)),
        None => null_argument(),
    }
}

/// Replaces the value of an existing `key`.
///
/// # Safety
///
/// - `handle` must be a valid remote store handle
/// - `key` and `value` must describe readable memory
#[no_mangle]
pub unsafe extern "C" fn kab_remote_replace(
    handle: *mut KabRemoteDb,
    key: KabSlice,
    value: KabSlice,
) -> KabResult {
    clear_last_error();
    match remote_handle(handle) {
        Some(h) => passthrough::write(&h.client, key, value, |c, k, v| c.replace(k, v)),
        None => null_argument(),
    }
}

/// Appends `value` to `key`, creating it when missing.
///
/// # Safety
///
/// - `handle` must be a valid remote store handle
/// - `key` and `value` must describe readable memory
#[no_mangle]
pub unsafe extern "C" fn kab_remote_append(
    handle: *mut KabRemoteDb,
    key: KabSlice,
    value: KabSlice,
) -> KabResult {
    clear_last_error();
    match remote_handle(handle) {
        Some(h) => passthrough::write(&h.client, key, value, |c, k, v| c.append(k, v)),
        None => null_argument(),
    }
}

/// Removes `key`.
///
/// # Safety
///
/// - `handle` must be a valid remote store handle
/// - `key` must describe readable memory
#[no_mangle]
pub unsafe extern "C" fn kab_remote_remove(handle: *mut KabRemoteDb, key: KabSlice) -> KabResult {
    clear_last_error();
    match remote_handle(handle) {
        Some(h) => passthrough::remove(&h.client, key),
        None => null_argument(),
    }
}

/// Adds `delta` to the counter at `key`. See `kab_local_increment`.
///
/// # Safety
///
/// - `handle` must be a valid remote store handle
/// - `key` must describe readable memory
/// - `out_value` must be a valid pointer
#[no_mangle]
pub unsafe extern "C" fn kab_remote_increment(
    handle: *mut KabRemoteDb,
    key: KabSlice,
    delta: i64,
    initial: i64,
    out_value: *mut i64,
) -> KabResult {
    clear_last_error();
    match remote_handle(handle) {
        Some(h) => passthrough::increment(&h.client, key, delta, initial, out_value),
        None => null_argument(),
    }
}

/// Gets the number of records.
///
/// # Safety
///
/// - `handle` must be a valid remote store handle
/// - `out_count` must be a valid pointer
#[no_mangle]
pub unsafe extern "C" fn kab_remote_count(handle: *mut KabRemoteDb, out_count: *mut i64) -> KabResult {
    clear_last_error();
    match remote_handle(handle) {
        Some(h) => passthrough::count(&h.client, out_count),
        None => null_argument(),
    }
}

/// Removes every record.
///
/// # Safety
///
/// `handle` must be a valid remote store handle.
#[no_mangle]
pub unsafe extern "C" fn kab_remote_clear(handle: *mut KabRemoteDb) -> KabResult {
    clear_last_error();
    match remote_handle(handle) {
        Some(h) => passthrough::clear(&h.client),
        None => null_argument(),
    }
}

/// Returns the store error code of the most recent operation, or `-1` for
/// a null handle.
///
/// # Safety
///
/// `handle` must be null or a valid remote store handle.
#[no_mangle]
pub unsafe extern "C" fn kab_remote_last_error_code(handle: *mut KabRemoteDb) -> i32 {
    remote_handle(handle).map_or(-1, |h| h.client.last_error().as_raw())
}

/// Gets bulk operation statistics.
///
/// # Safety
///
/// - `handle` must be a valid remote store handle
/// - `out_stats` must be a valid pointer
#[no_mangle]
pub unsafe extern "C" fn kab_remote_stats(
    handle: *mut KabRemoteDb,
    out_stats: *mut KabStats,
) -> KabResult {
    clear_last_error();
    match remote_handle(handle) {
        Some(h) if !out_stats.is_null() => {
            *out_stats = h.stats.snapshot();
            KabResult::Ok
        }
        _ => null_argument(),
    }
}
