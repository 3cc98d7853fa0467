//! Result container FFI functions.
//!
//! A container returned by a bulk call is owned by the caller until it is
//! passed to `kab_container_free`, exactly once. Every accessor is
//! bounds-checked: an out-of-range index yields null or `-1`, never a read
//! past the populated slots. Item pointers stay valid until the container
//! is freed.

use crate::error::{null_argument, KabResult};
use kabind_client::ErrorCode;
use kabind_marshal::{Container, ContainerStatus};
use std::ffi::c_char;

/// An opaque result container handle.
#[repr(C)]
pub struct KabContainer {
    _private: [u8; 0],
}

/// Length reported for an absent or out-of-range slot.
pub const KAB_ABSENT: i64 = -1;

/// What a container handle points to: the slots plus the result code the
/// producing call returned.
struct HeldContainer {
    container: Container,
    result: KabResult,
}

/// Moves a container behind an opaque handle.
pub(crate) fn into_handle(container: Container, result: KabResult) -> *mut KabContainer {
    Box::into_raw(Box::new(HeldContainer { container, result })).cast()
}

unsafe fn held<'a>(container: *const KabContainer) -> Option<&'a HeldContainer> {
    container.cast::<HeldContainer>().as_ref()
}

unsafe fn borrow<'a>(container: *const KabContainer) -> Option<&'a Container> {
    held(container).map(|h| &h.container)
}

fn item_ptr(bytes: Option<&[u8]>) -> *const c_char {
    bytes.map_or(std::ptr::null(), |bytes| bytes.as_ptr().cast())
}

/// Returns the number of populated slots, 0 for a null handle.
///
/// # Safety
///
/// `container` must be null or a live container handle.
#[no_mangle]
pub unsafe extern "C" fn kab_container_count(container: *const KabContainer) -> usize {
    borrow(container).map_or(0, Container::len)
}

/// Returns slot `index` as a NUL-terminated byte string.
///
/// Returns null when the index is out of range or the slot is absent.
/// Values may themselves contain NUL bytes; use `kab_container_item_len`
/// for the exact length.
///
/// # Safety
///
/// `container` must be null or a live container handle.
#[no_mangle]
pub unsafe extern "C" fn kab_container_item(
    container: *const KabContainer,
    index: usize,
) -> *const c_char {
    item_ptr(borrow(container).and_then(|c| c.get_with_nul(index)))
}

/// Returns the length of slot `index` without its terminator.
///
/// Returns `KAB_ABSENT` (-1) when the slot is absent or out of range.
///
/// # Safety
///
/// `container` must be null or a live container handle.
#[no_mangle]
pub unsafe extern "C" fn kab_container_item_len(container: *const KabContainer, index: usize) -> i64 {
    borrow(container)
        .and_then(|c| c.size(index))
        .and_then(|state| state.len())
        .map_or(KAB_ABSENT, |len| len as i64)
}

/// Returns true when slot `index` exists and holds a value.
///
/// # Safety
///
/// `container` must be null or a live container handle.
#[no_mangle]
pub unsafe extern "C" fn kab_container_present(container: *const KabContainer, index: usize) -> bool {
    borrow(container).is_some_and(|c| c.is_present(index))
}

/// Returns the number of key/value pairs in a procedure result.
///
/// # Safety
///
/// `container` must be null or a live container handle.
#[no_mangle]
pub unsafe extern "C" fn kab_container_pair_count(container: *const KabContainer) -> usize {
    borrow(container).map_or(0, Container::pair_count)
}

/// Returns the key of pair `index`, or null when out of range.
///
/// # Safety
///
/// `container` must be null or a live container handle.
#[no_mangle]
pub unsafe extern "C" fn kab_container_pair_key(
    container: *const KabContainer,
    index: usize,
) -> *const c_char {
    item_ptr(
        borrow(container)
            .filter(|c| index < c.pair_count())
            .and_then(|c| c.get_with_nul(2 * index)),
    )
}

/// Returns the value of pair `index`, or null when out of range.
///
/// # Safety
///
/// `container` must be null or a live container handle.
#[no_mangle]
pub unsafe extern "C" fn kab_container_pair_value(
    container: *const KabContainer,
    index: usize,
) -> *const c_char {
    item_ptr(
        borrow(container)
            .filter(|c| index < c.pair_count())
            .and_then(|c| c.get_with_nul(2 * index + 1)),
    )
}

/// Returns the outcome of the call that produced the container.
///
/// `Ok` means the slots are the complete result, possibly zero of them.
/// Any other code is the one the producing call returned; the container is
/// then empty. `out_error_code`, when not null, receives the store error
/// code.
///
/// # Safety
///
/// - `container` must be a live container handle
/// - `out_error_code` must be null or a valid pointer
#[no_mangle]
pub unsafe extern "C" fn kab_container_status(
    container: *const KabContainer,
    out_error_code: *mut i32,
) -> KabResult {
    let Some(held) = held(container) else {
        return null_argument();
    };
    let code = match held.container.status() {
        ContainerStatus::Complete => ErrorCode::Success,
        ContainerStatus::Failed(code) => code,
    };
    if !out_error_code.is_null() {
        *out_error_code = code.as_raw();
    }
    held.result
}

/// Releases a container and every buffer it holds.
///
/// # Safety
///
/// The handle must have been returned by a kabind bulk function.
/// The handle and every pointer read from it must not be used after this
/// call.
#[no_mangle]
pub unsafe extern "C" fn kab_container_free(container: *mut KabContainer) -> KabResult {
    if container.is_null() {
        return null_argument();
    }
    drop(Box::from_raw(container.cast::<HeldContainer>()));
    KabResult::Ok
}
