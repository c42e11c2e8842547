//! Session-related types for operator authentication.
//!
//! The session holds the operator's [`IdentityClaims`](checkin_core::IdentityClaims)
//! as-is; nothing else is stored server-side.

/// Session keys for operator authentication data.
pub mod keys {
    /// Key for storing the signed-in operator's identity claims.
    pub const CURRENT_OPERATOR: &str = "current_operator";
}
