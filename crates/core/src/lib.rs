//! Check-in Core - Shared types library.
//!
//! This crate provides the types exchanged between the kiosk server's
//! components:
//! - `kiosk` - HTTP server (scan endpoint, identity gate, kiosk page)
//! - `integration-tests` - in-process router tests
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no HTTP clients, no session
//! handling. The directory lookup, activity logger and identity gate all live
//! in the kiosk crate and exchange these values.
//!
//! # Modules
//!
//! - [`types`] - Scan identifiers, person records, identity claims and scan log rows

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
