//! Core types for the check-in kiosk.
//!
//! This module provides type-safe wrappers for the values that flow through
//! a single scan: the raw scan identifier, the person it resolves to, the
//! operator who scanned it, and the log row recorded for it.

pub mod identity;
pub mod person;
pub mod scan_id;
pub mod scan_log;

pub use identity::IdentityClaims;
pub use person::PersonRecord;
pub use scan_id::{ScanId, ScanIdError};
pub use scan_log::{SCAN_LOG_HEADER, ScanLogEntry, ScanOutcome};
