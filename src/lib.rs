//! Handset firmware library.
//!
//! Exposes the serial packet link and the handset payloads for
//! integration testing and host simulation. All ESP-IDF-specific code is
//! guarded by `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod adapters;
pub mod config;
pub mod diagnostics;
pub mod drivers;
pub mod error;
pub mod link;
pub mod pool;
pub mod remote;

pub use error::{Error, Result};
