//! End-to-end tests of the C surface.

use kabind_client::ErrorCode;
use kabind_ffi::*;
use kabind_testkit::prelude::*;
use std::ffi::{CStr, CString};
use std::ptr;

fn open_local(path: Option<&std::path::Path>, mode: KabOpenMode) -> (KabResult, *mut KabLocalDb) {
    let path = path.map(|p| CString::new(p.to_str().unwrap()).unwrap());
    let mut handle = ptr::null_mut();
    let result = unsafe {
        kab_local_open(
            path.as_ref().map_or(ptr::null(), |p| p.as_ptr()),
            mode as i32,
            &mut handle,
        )
    };
    (result, handle)
}

fn seeded(records: &[(&str, &str)]) -> *mut KabLocalDb {
    let (result, handle) = open_local(None, KabOpenMode::Write);
    assert_eq!(result, KabResult::Ok);
    for (k, v) in records {
        let result = unsafe {
            kab_local_set(
                handle,
                KabSlice::from_bytes(k.as_bytes()),
                KabSlice::from_bytes(v.as_bytes()),
            )
        };
        assert_eq!(result, KabResult::Ok);
    }
    handle
}

unsafe fn item(container: *const KabContainer, index: usize) -> Option<&'static [u8]> {
    let ptr = kab_container_item(container, index);
    if ptr.is_null() {
        None
    } else {
        Some(CStr::from_ptr(ptr).to_bytes())
    }
}

unsafe fn last_error() -> String {
    CStr::from_ptr(kab_get_last_error()).to_string_lossy().into_owned()
}

#[test]
fn prefix_match_returns_exactly_the_matches() {
    let handle = seeded(&[
        ("user:alice", "a"),
        ("user:bob", "b"),
        ("user:carol", "c"),
        ("order:1", "o"),
    ]);
    let mut container = ptr::null_mut();
    unsafe {
        let result = kab_local_match_prefix(handle, KabSlice::from_bytes(b"user:"), 10, &mut container);
        assert_eq!(result, KabResult::Ok);
        assert_eq!(kab_container_count(container), 3);
        assert_eq!(item(container, 0), Some(b"user:alice".as_slice()));
        assert_eq!(item(container, 2), Some(b"user:carol".as_slice()));
        assert_eq!(item(container, 5), None);
        assert_eq!(kab_container_status(container, ptr::null_mut()), KabResult::Ok);
        assert_eq!(kab_container_free(container), KabResult::Ok);
        kab_local_close(handle);
    }
}

#[test]
fn no_matches_is_not_a_failure() {
    let handle = seeded(&[("a", "1")]);
    let mut container = ptr::null_mut();
    unsafe {
        let result = kab_local_match_prefix(handle, KabSlice::from_bytes(b"zzz"), 10, &mut container);
        assert_eq!(result, KabResult::Ok);
        assert_eq!(kab_container_count(container), 0);
        let mut code = -1;
        assert_eq!(kab_container_status(container, &mut code), KabResult::Ok);
        assert_eq!(code, ErrorCode::Success.as_raw());
        kab_container_free(container);
        kab_local_close(handle);
    }
}

#[test]
fn regex_match_is_capped() {
    let handle = seeded(&[("k1", ""), ("k2", ""), ("k3", ""), ("x", "")]);
    let mut container = ptr::null_mut();
    unsafe {
        let result = kab_local_match_regex(handle, c"^k[0-9]$".as_ptr(), 2, &mut container);
        assert_eq!(result, KabResult::Ok);
        assert_eq!(kab_container_count(container), 2);
        assert_eq!(item(container, 1), Some(b"k2".as_slice()));
        kab_container_free(container);
        kab_local_close(handle);
    }
}

#[test]
fn bulk_get_reports_presence_positionally() {
    let handle = seeded(&[("a", "1"), ("c", "3")]);
    let keys = [
        KabSlice::from_bytes(b"a"),
        KabSlice::from_bytes(b"b"),
        KabSlice::from_bytes(b"c"),
    ];
    let mut container = ptr::null_mut();
    unsafe {
        let result = kab_local_get_bulk(handle, keys.as_ptr(), keys.len(), &mut container);
        assert_eq!(result, KabResult::Ok);
        assert_eq!(kab_container_count(container), 3);

        assert!(kab_container_present(container, 0));
        assert!(!kab_container_present(container, 1));
        assert!(kab_container_present(container, 2));
        assert_eq!(kab_container_item_len(container, 1), KAB_ABSENT);
        assert_eq!(item(container, 2), Some(b"3".as_slice()));
        assert!(!kab_container_present(container, 3));

        kab_container_free(container);
        kab_local_close(handle);
    }
}

#[test]
fn bulk_set_and_remove_counts() {
    let handle = seeded(&[]);
    let keys = [KabSlice::from_bytes(b"a"), KabSlice::from_bytes(b"b")];
    let values = [KabSlice::from_bytes(b"1"), KabSlice::from_bytes(b"2")];
    unsafe {
        let mut applied = 0;
        let result = kab_local_set_bulk(handle, keys.as_ptr(), values.as_ptr(), 2, &mut applied);
        assert_eq!(result, KabResult::Ok);
        assert_eq!(applied, 2);

        let gone = [KabSlice::from_bytes(b"a"), KabSlice::from_bytes(b"missing")];
        let mut removed = 0;
        let result = kab_local_remove_bulk(handle, gone.as_ptr(), 2, &mut removed);
        assert_eq!(result, KabResult::Ok);
        assert_eq!(removed, 1);

        let mut count = 0;
        kab_local_count(handle, &mut count);
        assert_eq!(count, 1);

        let mut stats = KabStats::default();
        assert_eq!(kab_local_stats(handle, &mut stats), KabResult::Ok);
        assert_eq!(stats.set_bulk_calls, 1);
        assert_eq!(stats.remove_bulk_calls, 1);
        kab_local_close(handle);
    }
}

#[test]
fn read_only_store_rejects_bulk_writes() {
    let temp = tempfile::TempDir::new().unwrap();
    let path = temp.path().join("store.kab");

    let (result, writer) = open_local(Some(&path), KabOpenMode::Write);
    assert_eq!(result, KabResult::Ok);
    unsafe {
        kab_local_set(writer, KabSlice::from_bytes(b"k"), KabSlice::from_bytes(b"v"));
        assert_eq!(kab_local_close(writer), KabResult::Ok);
    }

    let (result, reader) = open_local(Some(&path), KabOpenMode::Read);
    assert_eq!(result, KabResult::Ok);
    let keys = [KabSlice::from_bytes(b"k")];
    unsafe {
        let mut removed = 99;
        let result = kab_local_remove_bulk(reader, keys.as_ptr(), 1, &mut removed);
        assert_eq!(result, KabResult::ReadOnly);
        assert_eq!(removed, 0);
        assert!(last_error().contains("read-only"));
        assert_eq!(kab_local_last_error_code(reader), ErrorCode::NoPermission.as_raw());

        let mut container = ptr::null_mut();
        let result = kab_local_get_bulk(reader, keys.as_ptr(), 1, &mut container);
        assert_eq!(result, KabResult::Ok);
        assert_eq!(item(container, 0), Some(b"v".as_slice()));
        kab_container_free(container);

        let mut stats = KabStats::default();
        kab_local_stats(reader, &mut stats);
        assert_eq!(stats.failures, 1);
        kab_local_close(reader);
    }
}

#[test]
fn opening_a_missing_store_read_only_fails() {
    let temp = tempfile::TempDir::new().unwrap();
    let (result, handle) = open_local(Some(&temp.path().join("absent.kab")), KabOpenMode::Read);
    assert_eq!(result, KabResult::Error);
    assert!(handle.is_null());
}

fn open_remote(served: &ServedEndpoint) -> *mut KabRemoteDb {
    let host = CString::new(served.endpoint.host.as_str()).unwrap();
    let mut handle = ptr::null_mut();
    let result = unsafe { kab_remote_open(host.as_ptr(), served.endpoint.port, -1.0, &mut handle) };
    assert_eq!(result, KabResult::Ok);
    handle
}

#[test]
fn remote_bulk_operations() {
    let served = ServedEndpoint::new();
    let handle = open_remote(&served);
    let keys = [KabSlice::from_bytes(b"user:1"), KabSlice::from_bytes(b"user:2")];
    let values = [KabSlice::from_bytes(b"ada"), KabSlice::from_bytes(b"bob")];
    unsafe {
        let mut applied = 0;
        kab_remote_set_bulk(handle, keys.as_ptr(), values.as_ptr(), 2, &mut applied);
        assert_eq!(applied, 2);

        let mut container = ptr::null_mut();
        let result = kab_remote_match_prefix(handle, KabSlice::from_bytes(b"user:"), -1, &mut container);
        assert_eq!(result, KabResult::Ok);
        assert_eq!(kab_container_count(container), 2);
        kab_container_free(container);

        let mut container = ptr::null_mut();
        kab_remote_get_bulk(handle, keys.as_ptr(), 2, &mut container);
        assert_eq!(item(container, 1), Some(b"bob".as_slice()));
        kab_container_free(container);

        let mut removed = 0;
        kab_remote_remove_bulk(handle, keys.as_ptr(), 2, &mut removed);
        assert_eq!(removed, 2);
        kab_remote_close(handle);
    }
}

#[test]
fn play_script_returns_sorted_pairs() {
    let served = ServedEndpoint::new();
    let handle = open_remote(&served);
    let params = [
        KabSlice::from_bytes(b"zeta"),
        KabSlice::from_bytes(b"26"),
        KabSlice::from_bytes(b"alpha"),
        KabSlice::from_bytes(b"1"),
    ];
    let mut container = ptr::null_mut();
    unsafe {
        let result = kab_remote_play_script(handle, c"echo".as_ptr(), params.as_ptr(), 4, &mut container);
        assert_eq!(result, KabResult::Ok);
        assert_eq!(kab_container_pair_count(container), 2);
        assert_eq!(CStr::from_ptr(kab_container_pair_key(container, 0)).to_bytes(), b"alpha");
        assert_eq!(CStr::from_ptr(kab_container_pair_value(container, 0)).to_bytes(), b"1");
        assert_eq!(CStr::from_ptr(kab_container_pair_key(container, 1)).to_bytes(), b"zeta");
        assert!(kab_container_pair_key(container, 2).is_null());
        kab_container_free(container);
        kab_remote_close(handle);
    }
}

#[test]
fn oversized_script_result_is_overflow() {
    let served = ServedEndpoint::new();
    let handle = open_remote(&served);
    let names: Vec<Vec<u8>> = (0..40).map(|i| format!("k{i:02}").into_bytes()).collect();
    let params: Vec<KabSlice> = names
        .iter()
        .flat_map(|name| [KabSlice::from_bytes(name), KabSlice::from_bytes(b"v")])
        .collect();
    let mut container = ptr::null_mut();
    unsafe {
        let result = kab_remote_play_script(
            handle,
            c"echo".as_ptr(),
            params.as_ptr(),
            params.len(),
            &mut container,
        );
        assert_eq!(result, KabResult::Overflow);
        assert!(!container.is_null());
        assert_eq!(kab_container_count(container), 0);
        let mut code = 0;
        assert_eq!(kab_container_status(container, &mut code), KabResult::Overflow);
        assert_eq!(code, ErrorCode::Overflow.as_raw());
        assert_eq!(kab_container_free(container), KabResult::Ok);
        kab_remote_close(handle);
    }
}

#[test]
fn unknown_procedure_fails_cleanly() {
    let served = ServedEndpoint::new();
    let handle = open_remote(&served);
    let mut container = ptr::null_mut();
    unsafe {
        let result = kab_remote_play_script(handle, c"nope".as_ptr(), ptr::null(), 0, &mut container);
        assert_eq!(result, KabResult::InvalidArgument);
        assert_eq!(kab_container_count(container), 0);
        assert_eq!(kab_remote_last_error_code(handle), ErrorCode::NotImplemented.as_raw());
        let name = CStr::from_ptr(kab_error_name(kab_remote_last_error_code(handle)));
        assert_eq!(name.to_str().unwrap(), "not implemented");
        kab_container_free(container);
        kab_remote_close(handle);
    }
}

#[test]
fn odd_parameter_list_is_rejected_without_container() {
    let served = ServedEndpoint::new();
    let handle = open_remote(&served);
    let params = [KabSlice::from_bytes(b"lonely")];
    let mut container = ptr::null_mut();
    unsafe {
        let result = kab_remote_play_script(handle, c"echo".as_ptr(), params.as_ptr(), 1, &mut container);
        assert_eq!(result, KabResult::InvalidArgument);
        assert!(container.is_null());
        kab_remote_close(handle);
    }
}
