//! Development bypass: every login succeeds as the fixed development identity.

use checkin_core::IdentityClaims;

use super::{AuthError, AuthStart, IdentityProvider};

/// Identity provider that skips SSO entirely.
#[derive(Debug, Clone, Copy, Default)]
pub struct BypassProvider;

impl IdentityProvider for BypassProvider {
    fn name(&self) -> &'static str {
        "development bypass"
    }

    fn begin_auth(&self, _relay_state: Option<&str>) -> Result<AuthStart, AuthError> {
        Ok(AuthStart::Authenticated(IdentityClaims::development()))
    }

    fn handle_callback(&self, _saml_response: &str) -> Result<IdentityClaims, AuthError> {
        Err(AuthError::UnexpectedCallback(self.name()))
    }
}
