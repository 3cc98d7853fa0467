//! # kabind marshal
//!
//! Packages the results of multi-value store calls into caller-owned
//! [`Container`]s.
//!
//! This crate provides:
//! - [`Container`] - move-only bundle of owned, NUL-terminated result buffers
//!   with per-slot presence for bulk gets
//! - the allocation/trim protocol in [`alloc`]
//! - [`Marshaler`] - one adapter per native multi-value operation
//!
//! ## Failure policy
//!
//! A failed native call releases every preallocated slot and yields an error;
//! the C surface turns it into an empty container whose count is zero and
//! whose status is `Failed`. "No results" and "call failed" are never the
//! same state.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod adapters;
pub mod alloc;
mod config;
mod container;
mod error;

pub use adapters::Marshaler;
pub use config::{
    MarshalConfig, DEFAULT_MATCH_MAX, DEFAULT_MAX_SLOTS, DEFAULT_RECORD_CAPACITY,
    DEFAULT_SCRIPT_CAPACITY,
};
pub use container::{Container, ContainerKind, ContainerStatus};
pub use error::{MarshalError, MarshalResult};
pub use kabind_client::SlotState;
