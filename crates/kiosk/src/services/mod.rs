//! Business logic services for the kiosk.
//!
//! # Services
//!
//! - [`directory`] - Scan identifier to person record (static table or remote API)
//! - [`identity`] - Operator login (SAML or development bypass)
//! - [`scan_log`] - Append-only record of every scan attempt

pub mod directory;
pub mod identity;
pub mod scan_log;
