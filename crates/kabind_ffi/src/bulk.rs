//! Bulk operation FFI functions.
//!
//! Container-returning calls follow one contract:
//!
//! - on success `*out_container` receives a complete container and the
//!   result is `Ok`, even when it holds zero slots
//! - when the store call fails the result is the mapped error code and
//!   `*out_container` still receives a container: empty, with a failed
//!   status, and releasable with `kab_container_free`
//! - when an argument is malformed no container is produced,
//!   `*out_container` is set to null and the handle's last error code
//!   becomes `Invalid`
//!
//! A native layer that reports more results than the capacity it was given
//! aborts the process.

use crate::buffer::{read_slices, read_str, KabSlice};
use crate::container::{into_handle, KabContainer};
use crate::error::{clear_last_error, null_argument, set_last_error, ArgError, KabResult};
use crate::types::{local_handle, remote_handle, BulkOp, KabLocalDb, KabRemoteDb, StoreHandle};
use kabind_client::{ErrorCode, ParamMap, PatternMatch, ProcedureCall, StoreClient};
use kabind_marshal::{Container, ContainerKind, MarshalError, MarshalResult, Marshaler};
use std::ffi::c_char;
use std::time::Instant;
use tracing::{error, warn};

fn timed<C, T>(
    handle: &StoreHandle<C>,
    op: BulkOp,
    call: impl FnOnce(&Marshaler, &C) -> MarshalResult<T>,
) -> MarshalResult<T> {
    let started = Instant::now();
    let result = call(&handle.marshaler, &handle.client);
    handle.stats.record(op, started.elapsed(), result.is_ok());
    result
}

/// Turns a marshaling failure into a result code.
///
/// Protocol violations never return.
fn report(err: &MarshalError) -> KabResult {
    if err.is_protocol_violation() {
        error!(%err, "native layer broke the capacity contract, aborting");
        std::process::abort();
    }
    warn!(%err, "bulk operation failed");
    set_last_error(err.to_string());
    err.into()
}

/// Reports a malformed argument and records it as the handle's last error.
fn reject<C: StoreClient>(handle: &StoreHandle<C>, err: ArgError) -> KabResult {
    handle.client.record_error(ErrorCode::Invalid);
    err.report()
}

unsafe fn emit(
    out_container: *mut *mut KabContainer,
    kind: ContainerKind,
    result: MarshalResult<Container>,
) -> KabResult {
    let (container, code) = match result {
        Ok(container) => (container, KabResult::Ok),
        Err(e) => {
            let code = report(&e);
            (Container::failed(kind, e.code()), code)
        }
    };
    *out_container = into_handle(container, code);
    code
}

unsafe fn emit_count(out_count: *mut usize, result: MarshalResult<usize>) -> KabResult {
    match result {
        Ok(n) => {
            *out_count = n;
            KabResult::Ok
        }
        Err(e) => {
            *out_count = 0;
            report(&e)
        }
    }
}

unsafe fn match_prefix<C: StoreClient>(
    handle: Option<&StoreHandle<C>>,
    prefix: KabSlice,
    max: i64,
    out_container: *mut *mut KabContainer,
) -> KabResult {
    let Some(handle) = handle else {
        return null_argument();
    };
    if out_container.is_null() {
        return reject(handle, ArgError::Null("out_container"));
    }
    *out_container = std::ptr::null_mut();

    let prefix = match prefix.as_bytes("prefix") {
        Ok(prefix) => prefix,
        Err(e) => return reject(handle, e),
    };
    let max = handle.marshaler.match_max(usize::try_from(max).ok());
    let result = timed(handle, BulkOp::MatchPrefix, |m, c| m.match_prefix(c, prefix, max));
    emit(out_container, ContainerKind::Keys, result)
}

unsafe fn get_bulk<C: StoreClient>(
    handle: Option<&StoreHandle<C>>,
    keys: *const KabSlice,
    key_count: usize,
    out_container: *mut *mut KabContainer,
) -> KabResult {
    let Some(handle) = handle else {
        return null_argument();
    };
    if out_container.is_null() {
        return reject(handle, ArgError::Null("out_container"));
    }
    *out_container = std::ptr::null_mut();

    let keys = match read_slices(keys, key_count, "keys") {
        Ok(keys) => keys,
        Err(e) => return reject(handle, e),
    };
    let result = timed(handle, BulkOp::GetBulk, |m, c| m.get_bulk(c, &keys));
    emit(out_container, ContainerKind::Values, result)
}

unsafe fn set_bulk<C: StoreClient>(
    handle: Option<&StoreHandle<C>>,
    keys: *const KabSlice,
    values: *const KabSlice,
    count: usize,
    out_applied: *mut usize,
) -> KabResult {
    let Some(handle) = handle else {
        return null_argument();
    };
    if out_applied.is_null() {
        return reject(handle, ArgError::Null("out_applied"));
    }
    *out_applied = 0;

    let (keys, values) = match (
        read_slices(keys, count, "keys"),
        read_slices(values, count, "values"),
    ) {
        (Ok(keys), Ok(values)) => (keys, values),
        (Err(e), _) | (_, Err(e)) => return reject(handle, e),
    };
    let pairs: Vec<(&[u8], &[u8])> = keys.into_iter().zip(values).collect();
    let result = timed(handle, BulkOp::SetBulk, |m, c| m.set_bulk(c, &pairs));
    emit_count(out_applied, result)
}

unsafe fn remove_bulk<C: StoreClient>(
    handle: Option<&StoreHandle<C>>,
    keys: *const KabSlice,
    key_count: usize,
    out_removed: *mut usize,
) -> KabResult {
    let Some(handle) = handle else {
        return null_argument();
    };
    if out_removed.is_null() {
        return reject(handle, ArgError::Null("out_removed"));
    }
    *out_removed = 0;

    let keys = match read_slices(keys, key_count, "keys") {
        Ok(keys) => keys,
        Err(e) => return reject(handle, e),
    };
    let result = timed(handle, BulkOp::RemoveBulk, |m, c| m.remove_bulk(c, &keys));
    emit_count(out_removed, result)
}

unsafe fn match_regex<C: PatternMatch>(
    handle: Option<&StoreHandle<C>>,
    pattern: *const c_char,
    max: i64,
    out_container: *mut *mut KabContainer,
) -> KabResult {
    let Some(handle) = handle else {
        return null_argument();
    };
    if out_container.is_null() {
        return reject(handle, ArgError::Null("out_container"));
    }
    *out_container = std::ptr::null_mut();

    let pattern = match read_str(pattern, "pattern") {
        Ok(pattern) => pattern,
        Err(e) => return reject(handle, e),
    };
    let max = handle.marshaler.match_max(usize::try_from(max).ok());
    let result = timed(handle, BulkOp::MatchRegex, |m, c| m.match_regex(c, pattern, max));
    emit(out_container, ContainerKind::Keys, result)
}

unsafe fn read_params(params: *const KabSlice, param_count: usize) -> Result<ParamMap, ArgError> {
    if param_count % 2 != 0 {
        return Err(ArgError::Unpaired("params", param_count));
    }
    let flat = read_slices(params, param_count, "params")?;
    Ok(flat
        .chunks_exact(2)
        .map(|pair| (pair[0].to_vec(), pair[1].to_vec()))
        .collect())
}

unsafe fn play_script<C: ProcedureCall>(
    handle: Option<&StoreHandle<C>>,
    name: *const c_char,
    params: *const KabSlice,
    param_count: usize,
    out_container: *mut *mut KabContainer,
) -> KabResult {
    let Some(handle) = handle else {
        return null_argument();
    };
    if out_container.is_null() {
        return reject(handle, ArgError::Null("out_container"));
    }
    *out_container = std::ptr::null_mut();

    let name = match read_str(name, "name") {
        Ok(name) => name,
        Err(e) => return reject(handle, e),
    };
    let params = match read_params(params, param_count) {
        Ok(params) => params,
        Err(e) => return reject(handle, e),
    };
    let result = timed(handle, BulkOp::PlayScript, |m, c| m.play_script(c, name, &params));
    emit(out_container, ContainerKind::Pairs, result)
}

/// Collects up to `max` keys starting with `prefix`, in ascending order.
///
/// A negative `max` uses the default cap (1000).
///
/// # Safety
///
/// - `handle` must be a valid local store handle
/// - `prefix` must describe readable memory
/// - `out_container` must be a valid pointer
#[no_mangle]
pub unsafe extern "C" fn kab_local_match_prefix(
    handle: *mut KabLocalDb,
    prefix: KabSlice,
    max: i64,
    out_container: *mut *mut KabContainer,
) -> KabResult {
    clear_last_error();
    match_prefix(local_handle(handle), prefix, max, out_container)
}

/// Collects up to `max` keys matching the regular expression `pattern`.
///
/// A negative `max` uses the default cap (1000). An invalid pattern fails
/// with `InvalidArgument` and a failed container.
///
/// # Safety
///
/// - `handle` must be a valid local store handle
/// - `pattern` must be a valid null-terminated UTF-8 string
/// - `out_container` must be a valid pointer
#[no_mangle]
pub unsafe extern "C" fn kab_local_match_regex(
    handle: *mut KabLocalDb,
    pattern: *const c_char,
    max: i64,
    out_container: *mut *mut KabContainer,
) -> KabResult {
    clear_last_error();
    match_regex(local_handle(handle), pattern, max, out_container)
}

/// Fetches `key_count` keys. Slot `i` of the container answers `keys[i]`;
/// missing keys are absent slots.
///
/// # Safety
///
/// - `handle` must be a valid local store handle
/// - `keys` must point to `key_count` slices (or be null when zero)
/// - `out_container` must be a valid pointer
#[no_mangle]
pub unsafe extern "C" fn kab_local_get_bulk(
    handle: *mut KabLocalDb,
    keys: *const KabSlice,
    key_count: usize,
    out_container: *mut *mut KabContainer,
) -> KabResult {
    clear_last_error();
    get_bulk(local_handle(handle), keys, key_count, out_container)
}

/// Stores `count` key/value pairs; `*out_applied` receives how many were
/// stored.
///
/// # Safety
///
/// - `handle` must be a valid local store handle
/// - `keys` and `values` must each point to `count` slices
/// - `out_applied` must be a valid pointer
#[no_mangle]
pub unsafe extern "C" fn kab_local_set_bulk(
    handle: *mut KabLocalDb,
    keys: *const KabSlice,
    values: *const KabSlice,
    count: usize,
    out_applied: *mut usize,
) -> KabResult {
    clear_last_error();
    set_bulk(local_handle(handle), keys, values, count, out_applied)
}

/// Removes `key_count` keys; `*out_removed` receives how many existed.
///
/// # Safety
///
/// - `handle` must be a valid local store handle
/// - `keys` must point to `key_count` slices (or be null when zero)
/// - `out_removed` must be a valid pointer
#[no_mangle]
pub unsafe extern "C" fn kab_local_remove_bulk(
    handle: *mut KabLocalDb,
    keys: *const KabSlice,
    key_count: usize,
    out_removed: *mut usize,
) -> KabResult {
    clear_last_error();
    remove_bulk(local_handle(handle), keys, key_count, out_removed)
}

/// Remote variant of `kab_local_match_prefix`.
///
/// # Safety
///
/// - `handle` must be a valid remote store handle
/// - `prefix` must describe readable memory
/// - `out_container` must be a valid pointer
#[no_mangle]
pub unsafe extern "C" fn kab_remote_match_prefix(
    handle: *mut KabRemoteDb,
    prefix: KabSlice,
    max: i64,
    out_container: *mut *mut KabContainer,
) -> KabResult {
    clear_last_error();
    match_prefix(remote_handle(handle), prefix, max, out_container)
}

/// Remote variant of `kab_local_get_bulk`.
///
/// # Safety
///
/// - `handle` must be a valid remote store handle
/// - `keys` must point to `key_count` slices (or be null when zero)
/// - `out_container` must be a valid pointer
#[no_mangle]
pub unsafe extern "C" fn kab_remote_get_bulk(
    handle: *mut KabRemoteDb,
    keys: *const KabSlice,
    key_count: usize,
    out_container: *mut *mut KabContainer,
) -> KabResult {
    clear_last_error();
    get_bulk(remote_handle(handle), keys, key_count, out_container)
}

/// Remote variant of `kab_local_set_bulk`.
///
/// # Safety
///
/// - `handle` must be a valid remote store handle
/// - `keys` and `values` must each point to `count` slices
/// - `out_applied` must be a valid pointer
#[no_mangle]
pub unsafe extern "C" fn kab_remote_set_bulk(
    handle: *mut KabRemoteDb,
    keys: *const KabSlice,
    values: *const KabSlice,
    count: usize,
    out_applied: *mut usize,
) -> KabResult {
    clear_last_error();
    set_bulk(remote_handle(handle), keys, values, count, out_applied)
}

/// Remote variant of `kab_local_remove_bulk`.
///
/// # Safety
///
/// - `handle` must be a valid remote store handle
/// - `keys` must point to `key_count` slices (or be null when zero)
/// - `out_removed` must be a valid pointer
#[no_mangle]
pub unsafe extern "C" fn kab_remote_remove_bulk(
    handle: *mut KabRemoteDb,
    keys: *const KabSlice,
    key_count: usize,
    out_removed: *mut usize,
) -> KabResult {
    clear_last_error();
    remove_bulk(remote_handle(handle), keys, key_count, out_removed)
}

/// Invokes the server-side procedure `name`.
///
/// `params` holds `param_count` slices alternating key, value. The result
/// container holds key/value pairs in ascending key order; read it with
/// `kab_container_pair_key` and `kab_container_pair_value`. A result larger
/// than the script capacity (32 pairs) fails with `Overflow`.
///
/// # Safety
///
/// - `handle` must be a valid remote store handle
/// - `name` must be a valid null-terminated UTF-8 string
/// - `params` must point to `param_count` slices (or be null when zero)
/// - `out_container` must be a valid pointer
#[no_mangle]
pub unsafe extern "C" fn kab_remote_play_script(
    handle: *mut KabRemoteDb,
    name: *const c_char,
    params: *const KabSlice,
    param_count: usize,
    out_container: *mut *mut KabContainer,
) -> KabResult {
    clear_last_error();
    play_script(remote_handle(handle), name, params, param_count, out_container)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::{kab_container_count, kab_container_free, kab_container_status};
    use crate::local::{kab_local_count, kab_local_last_error_code};
    use crate::types::LocalHandle;
    use kabind_client::LocalStore;

    fn local(records: &[(&str, &str)]) -> *mut KabLocalDb {
        let store = LocalStore::in_memory();
        for (k, v) in records {
            store.set(k.as_bytes(), v.as_bytes()).unwrap();
        }
        Box::into_raw(Box::new(LocalHandle::new(store))).cast()
    }

    unsafe fn release(handle: *mut KabLocalDb) {
        drop(Box::from_raw(handle.cast::<LocalHandle>()));
    }

    #[test]
    fn negative_max_uses_default() {
        let handle = local(&[("k1", "a"), ("k2", "b")]);
        let mut out = std::ptr::null_mut();
        unsafe {
            let result = kab_local_match_prefix(handle, KabSlice::from_bytes(b"k"), -1, &mut out);
            assert_eq!(result, KabResult::Ok);
            assert_eq!(kab_container_count(out), 2);
            kab_container_free(out);
            release(handle);
        }
    }

    #[test]
    fn invalid_pattern_yields_failed_container() {
        let handle = local(&[("k1", "a")]);
        let mut out = std::ptr::null_mut();
        unsafe {
            let result = kab_local_match_regex(handle, c"(".as_ptr(), 10, &mut out);
            assert_eq!(result, KabResult::InvalidArgument);
            assert!(!out.is_null());
            assert_eq!(kab_container_count(out), 0);
            assert_eq!(
                kab_container_status(out, std::ptr::null_mut()),
                KabResult::InvalidArgument
            );
            kab_container_free(out);
            release(handle);
        }
    }

    #[test]
    fn null_out_pointer() {
        let handle = local(&[]);
        unsafe {
            let result = kab_local_match_prefix(
                handle,
                KabSlice::from_bytes(b""),
                10,
                std::ptr::null_mut(),
            );
            assert_eq!(result, KabResult::NullPointer);
            release(handle);
        }
    }

    #[test]
    fn odd_params_are_rejected() {
        let params = [KabSlice::from_bytes(b"k")];
        assert!(matches!(
            unsafe { read_params(params.as_ptr(), 1) },
            Err(ArgError::Unpaired("params", 1))
        ));

        let params = [
            KabSlice::from_bytes(b"b"),
            KabSlice::from_bytes(b"2"),
            KabSlice::from_bytes(b"a"),
            KabSlice::from_bytes(b"1"),
        ];
        let map = unsafe { read_params(params.as_ptr(), 4) }.unwrap();
        assert_eq!(map.keys().next().map(Vec::as_slice), Some(b"a".as_slice()));
    }

    #[test]
    fn closed_store_container_reports_closed() {
        let handle = LocalHandle::new(LocalStore::in_memory());
        handle.client.close().unwrap();
        let mut out = std::ptr::null_mut();
        let mut code = 0;
        unsafe {
            let result = match_prefix(Some(&handle), KabSlice::from_bytes(b""), 10, &mut out);
            assert_eq!(result, KabResult::Closed);
            assert_eq!(kab_container_status(out, &mut code), KabResult::Closed);
            assert_eq!(code, ErrorCode::Invalid.as_raw());
            kab_container_free(out);
        }
    }

    #[test]
    fn rejected_argument_sets_last_error_code() {
        let handle = local(&[("k1", "a")]);
        let keys = [KabSlice {
            data: std::ptr::null(),
            len: 3,
        }];
        let mut out = std::ptr::null_mut();
        unsafe {
            assert_eq!(kab_local_count(handle, &mut 0), KabResult::Ok);
            let result = kab_local_get_bulk(handle, keys.as_ptr(), 1, &mut out);
            assert_eq!(result, KabResult::NullPointer);
            assert!(out.is_null());
            assert_eq!(kab_local_last_error_code(handle), ErrorCode::Invalid.as_raw());

            let result = kab_local_match_regex(handle, c"k".as_ptr(), 5, std::ptr::null_mut());
            assert_eq!(result, KabResult::NullPointer);
            assert_eq!(kab_local_last_error_code(handle), ErrorCode::Invalid.as_raw());
            release(handle);
        }
    }

    #[test]
    fn oversized_max_still_returns_matches() {
        let handle = local(&[("k1", "a"), ("other", "b")]);
        let mut out = std::ptr::null_mut();
        unsafe {
            let result =
                kab_local_match_prefix(handle, KabSlice::from_bytes(b"k"), 100_000, &mut out);
            assert_eq!(result, KabResult::Ok);
            assert_eq!(kab_container_count(out), 1);
            assert_eq!(kab_local_last_error_code(handle), ErrorCode::Success.as_raw());
            kab_container_free(out);
            release(handle);
        }
    }

    #[test]
    fn stats_count_bulk_calls() {
        let handle = local(&[("a", "1")]);
        let keys = [KabSlice::from_bytes(b"a"), KabSlice::from_bytes(b"b")];
        let mut out = std::ptr::null_mut();
        unsafe {
            assert_eq!(kab_local_get_bulk(handle, keys.as_ptr(), 2, &mut out), KabResult::Ok);
            kab_container_free(out);
            let stats = local_handle(handle).unwrap().stats.snapshot();
            assert_eq!(stats.get_bulk_calls, 1);
            assert_eq!(stats.failures, 0);
            release(handle);
        }
    }
}
