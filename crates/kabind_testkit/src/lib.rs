//! # kabind testkit
//!
//! Test utilities for kabind.
//!
//! This crate provides:
//! - Store fixtures (seeded in-memory stores, temp snapshot dirs, served
//!   remote endpoints that unbind on drop)
//! - Property-based test generators using proptest
//! - Misbehaving clients for failure and protocol-violation tests

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod faulty;
pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::faulty::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use faulty::*;
pub use fixtures::*;
pub use generators::*;
