//! Identity claims for the signed-in operator.

use serde::{Deserialize, Serialize};

/// Claims describing the operator running the kiosk.
///
/// Derived once per login from the identity provider's assertion (or
/// synthesised by the development bypass) and kept in the server-side
/// session until logout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityClaims {
    /// Stable subject identifier (SAML `NameID`).
    pub subject_id: String,
    /// Display name, recorded in the "Scanned By" log column.
    pub display_name: String,
    /// Email address; empty when the provider did not release one.
    pub email: String,
    /// Local campus identifier.
    pub local_id: String,
}

impl IdentityClaims {
    /// The fixed identity used when SSO is bypassed for local development.
    #[must_use]
    pub fn development() -> Self {
        Self {
            subject_id: "dev-user".to_string(),
            display_name: "Dev User".to_string(),
            email: "dev@example.com".to_string(),
            local_id: "devuser".to_string(),
        }
    }

    /// Returns the email if one was released by the provider.
    #[must_use]
    pub fn email(&self) -> Option<&str> {
        if self.email.is_empty() {
            None
        } else {
            Some(&self.email)
        }
    }
}
