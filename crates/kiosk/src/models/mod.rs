//! Session-stored types for the kiosk.

pub mod session;

pub use session::keys as session_keys;
