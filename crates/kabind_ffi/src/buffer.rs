//! Buffer types for FFI.

use crate::error::ArgError;
use std::ffi::{c_char, CStr};

/// A borrowed byte range passed in by the caller.
///
/// Rust never frees or retains the memory. A null `data` is accepted only
/// with `len == 0`.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct KabSlice {
    /// Pointer to the first byte.
    pub data: *const u8,
    /// Length in bytes.
    pub len: usize,
}

impl KabSlice {
    /// Borrows a Rust byte slice.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            data: bytes.as_ptr(),
            len: bytes.len(),
        }
    }

    /// Views the slice as bytes.
    ///
    /// # Safety
    ///
    /// `data` must point to `len` readable bytes that outlive `'a`.
    pub(crate) unsafe fn as_bytes<'a>(self, what: &'static str) -> Result<&'a [u8], ArgError> {
        if self.data.is_null() {
            return if self.len == 0 {
                Ok(&[])
            } else {
                Err(ArgError::Null(what))
            };
        }
        Ok(std::slice::from_raw_parts(self.data, self.len))
    }
}

/// Reads `count` slices starting at `ptr`.
///
/// # Safety
///
/// `ptr` must point to `count` valid [`KabSlice`]s, each satisfying
/// [`KabSlice::as_bytes`].
pub(crate) unsafe fn read_slices<'a>(
    ptr: *const KabSlice,
    count: usize,
    what: &'static str,
) -> Result<Vec<&'a [u8]>, ArgError> {
    if count == 0 {
        return Ok(Vec::new());
    }
    if ptr.is_null() {
        return Err(ArgError::Null(what));
    }
    std::slice::from_raw_parts(ptr, count)
        .iter()
        .map(|slice| slice.as_bytes(what))
        .collect()
}

/// Reads a NUL-terminated UTF-8 string.
///
/// # Safety
///
/// `ptr` must be null or a valid NUL-terminated string.
pub(crate) unsafe fn read_str<'a>(ptr: *const c_char, what: &'static str) -> Result<&'a str, ArgError> {
    if ptr.is_null() {
        return Err(ArgError::Null(what));
    }
    CStr::from_ptr(ptr).to_str().map_err(|_| ArgError::Utf8(what))
}

/// A byte buffer for FFI.
///
/// Memory is owned by Rust. Call `kab_free_buffer` to release.
#[repr(C)]
pub struct KabBuffer {
    /// Pointer to data.
    pub data: *mut u8,
    /// Length in bytes.
    pub len: usize,
    /// Capacity (for internal use).
    pub capacity: usize,
}

impl KabBuffer {
    /// Creates a new buffer from a Vec.
    pub fn from_vec(vec: Vec<u8>) -> Self {
        let mut vec = std::mem::ManuallyDrop::new(vec.into_boxed_slice());
        let len = vec.len();
        Self {
            data: vec.as_mut_ptr(),
            len,
            capacity: len,
        }
    }

    /// Creates an empty buffer.
    pub fn empty() -> Self {
        Self {
            data: std::ptr::null_mut(),
            len: 0,
            capacity: 0,
        }
    }

    /// Returns true if the buffer is null/empty.
    pub fn is_null(&self) -> bool {
        self.data.is_null()
    }

    /// Converts back to a Vec, consuming the buffer.
    ///
    /// # Safety
    ///
    /// The buffer must have been created by [`KabBuffer::from_vec`].
    pub unsafe fn into_vec(self) -> Vec<u8> {
        if self.data.is_null() {
            return Vec::new();
        }
        Vec::from_raw_parts(self.data, self.len, self.capacity)
    }
}

/// Frees a buffer returned by a kabind function.
///
/// # Safety
///
/// The buffer must have been returned by a kabind function and not freed
/// before.
#[no_mangle]
pub unsafe extern "C" fn kab_free_buffer(buffer: KabBuffer) {
    drop(buffer.into_vec());
}
