//! # kabind client
//!
//! The store-client capability set driven by the kabind marshaling layer,
//! plus the two reference clients it ships with.
//!
//! ## Variants
//!
//! - [`LocalStore`] - embedded store with prefix and regex key matching
//! - [`RemoteStore`] - connection to a [`RemoteServer`] with server-side
//!   procedures, reached through the [`loopback`] endpoint registry
//!
//! Both implement [`StoreClient`]; the variant-only capabilities are the
//! [`PatternMatch`] and [`ProcedureCall`] traits.
//!
//! ## Example
//!
//! ```rust
//! use kabind_client::{LocalStore, StoreClient};
//!
//! let store = LocalStore::in_memory();
//! store.set(b"user:1", b"ada").unwrap();
//! let mut slots = vec![Vec::new(); 4];
//! let n = store.match_prefix_into(b"user:", &mut slots).unwrap();
//! assert_eq!(n, 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod client;
mod engine;
mod error;
mod local;
pub mod loopback;
mod remote;
pub mod snapshot;

pub use client::{ParamMap, PatternMatch, ProcedureCall, SlotState, StoreClient};
pub use engine::RecordMap;
pub use error::{ErrorCode, StoreError, StoreResult};
pub use local::{ApplyWaiter, LocalOptions, LocalStore, OpenMode, MEMORY_PATH};
pub use loopback::{Endpoint, RemoteServer};
pub use remote::{RemoteOptions, RemoteStore};
