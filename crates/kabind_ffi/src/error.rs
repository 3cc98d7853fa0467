//! Error codes and result types.

use kabind_client::{ErrorCode, StoreError};
use kabind_marshal::MarshalError;
use std::cell::RefCell;
use std::ffi::{c_char, CString};
use thiserror::Error;

/// Result code for FFI functions.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KabResult {
    /// Operation succeeded.
    Ok = 0,
    /// Generic error.
    Error = 1,
    /// Invalid argument or operation.
    InvalidArgument = 2,
    /// Record not found.
    NotFound = 3,
    /// Null pointer.
    NullPointer = 4,
    /// The store was opened read-only.
    ReadOnly = 5,
    /// The remote endpoint is unreachable or timed out.
    Network = 6,
    /// A result did not fit in the offered capacity.
    Overflow = 7,
    /// The store has been closed.
    Closed = 8,
}

impl KabResult {
    /// Returns true if the result indicates success.
    pub fn is_ok(self) -> bool {
        self == KabResult::Ok
    }

    /// Returns true if the result indicates an error.
    pub fn is_err(self) -> bool {
        self != KabResult::Ok
    }
}

impl From<ErrorCode> for KabResult {
    fn from(code: ErrorCode) -> Self {
        match code {
            ErrorCode::Success => KabResult::Ok,
            ErrorCode::Invalid | ErrorCode::NotImplemented => KabResult::InvalidArgument,
            ErrorCode::NoRecord => KabResult::NotFound,
            ErrorCode::NoPermission => KabResult::ReadOnly,
            ErrorCode::Network | ErrorCode::Timeout => KabResult::Network,
            ErrorCode::Overflow => KabResult::Overflow,
            _ => KabResult::Error,
        }
    }
}

impl From<&StoreError> for KabResult {
    fn from(err: &StoreError) -> Self {
        if err.is_closed() {
            return KabResult::Closed;
        }
        err.code().into()
    }
}

impl From<&MarshalError> for KabResult {
    fn from(err: &MarshalError) -> Self {
        match err {
            MarshalError::Store(store) => store.into(),
            _ => KabResult::Error,
        }
    }
}

/// A malformed argument passed across the C boundary.
#[derive(Debug, Error)]
pub(crate) enum ArgError {
    /// A required pointer was null.
    #[error("null pointer argument: {0}")]
    Null(&'static str),

    /// A string argument was not valid UTF-8.
    #[error("invalid UTF-8 in {0}")]
    Utf8(&'static str),

    /// An enumerated argument had no matching value.
    #[error("unknown {0} value {1}")]
    Unknown(&'static str, i32),

    /// A key/value parameter list had an odd length.
    #[error("{0} must hold key/value pairs, got {1} entries")]
    Unpaired(&'static str, usize),
}

impl ArgError {
    /// Records the error as the thread's last error and returns its code.
    pub(crate) fn report(self) -> KabResult {
        let code = match self {
            ArgError::Null(_) => KabResult::NullPointer,
            ArgError::Utf8(_) | ArgError::Unknown(..) | ArgError::Unpaired(..) => {
                KabResult::InvalidArgument
            }
        };
        set_last_error(self.to_string());
        code
    }
}

/// Records a store failure as the thread's last error and returns its code.
pub(crate) fn store_failure(err: &StoreError) -> KabResult {
    set_last_error(err.to_string());
    err.into()
}

/// Reports a null handle or output pointer.
pub(crate) fn null_argument() -> KabResult {
    set_last_error("null pointer argument");
    KabResult::NullPointer
}

// Thread-local storage for last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

/// Sets the last error message.
pub fn set_last_error(message: impl Into<String>) {
    let msg = message.into();
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

/// Clears the last error.
pub fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

/// Gets the last error message as a C string.
///
/// Returns null if no error is set.
///
/// # Safety
///
/// The returned pointer is valid until the next FFI call on this thread.
#[no_mangle]
pub extern "C" fn kab_get_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match e.borrow().as_ref() {
        Some(cstr) => cstr.as_ptr(),
        None => std::ptr::null(),
    })
}

/// Clears the last error message.
#[no_mangle]
pub extern "C" fn kab_clear_error() {
    clear_last_error();
}

/// Returns the static name of a store error code.
///
/// Unknown codes are named like `Misc`. The pointer is never null and
/// never needs to be freed.
#[no_mangle]
pub extern "C" fn kab_error_name(code: i32) -> *const c_char {
    ErrorCode::from_raw(code).c_name().as_ptr()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CStr;

    #[test]
    fn result_codes() {
        assert_eq!(KabResult::Ok as i32, 0);
        assert_eq!(KabResult::NullPointer as i32, 4);
        assert_eq!(KabResult::Closed as i32, 8);
        assert!(KabResult::Ok.is_ok());
        assert!(KabResult::Error.is_err());
    }

    #[test]
    fn store_error_mapping() {
        let err = StoreError::new(ErrorCode::NoPermission, "read-only");
        assert_eq!(KabResult::from(&err), KabResult::ReadOnly);

        let err = StoreError::new(ErrorCode::Timeout, "slow");
        assert_eq!(KabResult::from(&err), KabResult::Network);

        let err = StoreError::new(ErrorCode::Duplicate, "exists");
        assert_eq!(KabResult::from(&err), KabResult::Error);

        let err = MarshalError::from(StoreError::new(ErrorCode::Overflow, "big"));
        assert_eq!(KabResult::from(&err), KabResult::Overflow);
    }

    #[test]
    fn arg_error_sets_message() {
        clear_last_error();
        assert_eq!(ArgError::Utf8("path").report(), KabResult::InvalidArgument);
        let msg = unsafe { CStr::from_ptr(kab_get_last_error()) };
        assert_eq!(msg.to_str().unwrap(), "invalid UTF-8 in path");
    }

    #[test]
    fn last_error() {
        clear_last_error();
        assert!(kab_get_last_error().is_null());

        set_last_error("test error");
        let ptr = kab_get_last_error();
        assert!(!ptr.is_null());

        // Safety: we just set it
        let msg = unsafe { CStr::from_ptr(ptr) };
        assert_eq!(msg.to_str().unwrap(), "test error");

        kab_clear_error();
        assert!(kab_get_last_error().is_null());
    }

    #[test]
    fn error_names() {
        let name = unsafe { CStr::from_ptr(kab_error_name(7)) };
        assert_eq!(name.to_str().unwrap(), "no record");

        let name = unsafe { CStr::from_ptr(kab_error_name(99)) };
        assert_eq!(name.to_str().unwrap(), "miscellaneous error");
    }
}
