//! # kabind FFI
//!
//! Stable C ABI for kabind bindings.
//!
//! This crate provides:
//! - Opaque local and remote store handles
//! - Bulk operations returning caller-owned result containers
//! - Bounds-checked container accessors and a single release call
//! - Error code mapping and a thread-local last-error message
//!
//! ## Ownership
//!
//! Every handle, container and buffer returned by this library is owned by
//! the caller and released with its matching `*_close` / `*_free` call,
//! exactly once. Inputs ([`KabSlice`], C strings) are only borrowed for
//! the duration of a call.
//!
//! ## Logging
//!
//! The library emits `tracing` events but never installs a subscriber.

#![warn(missing_docs)]

mod buffer;
mod bulk;
mod container;
mod error;
mod local;
mod passthrough;
mod remote;
mod types;

pub use buffer::{kab_free_buffer, KabBuffer, KabSlice};
pub use bulk::*;
pub use container::*;
pub use error::{
    clear_last_error, kab_clear_error, kab_error_name, kab_get_last_error, set_last_error,
    KabResult,
};
pub use local::*;
pub use remote::*;
pub use types::{KabLocalDb, KabOpenMode, KabRemoteDb, KabStats};

use std::ffi::c_char;

const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), "\0");

/// Returns the library version as a static NUL-terminated string.
#[no_mangle]
pub extern "C" fn kab_version() -> *const c_char {
    VERSION.as_ptr().cast()
}
