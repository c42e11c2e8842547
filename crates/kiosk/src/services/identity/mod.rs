//! Identity gate: who is operating the kiosk.
//!
//! Login is delegated to an [`IdentityProvider`], chosen once from
//! configuration:
//!
//! - [`BypassProvider`] - local development, no SSO round trip
//! - [`SamlProvider`] - SAML 2.0 (HTTP-Redirect request, HTTP-POST response)
//!
//! The resulting [`IdentityClaims`] are stored in the session by the auth
//! routes; providers themselves are stateless.

mod bypass;
mod error;
mod saml;
mod xml;
mod xmldsig;

pub use bypass::BypassProvider;
pub use error::AuthError;
pub use saml::SamlProvider;

use std::fmt::Debug;
use std::sync::Arc;

use checkin_core::IdentityClaims;

use crate::config::AuthConfig;

/// What the login route should do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthStart {
    /// The caller is authenticated immediately.
    Authenticated(IdentityClaims),
    /// Send the browser to the identity provider.
    Redirect(String),
}

/// A source of operator identities.
pub trait IdentityProvider: Debug + Send + Sync {
    /// Short name, for logging.
    fn name(&self) -> &'static str;

    /// Start a login.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider cannot build its request.
    fn begin_auth(&self, relay_state: Option<&str>) -> Result<AuthStart, AuthError>;

    /// Complete a login from the identity provider's posted response.
    ///
    /// # Errors
    ///
    /// Returns an error if the response is malformed, unsuccessful, or fails
    /// validation.
    fn handle_callback(&self, saml_response: &str) -> Result<IdentityClaims, AuthError>;
}

/// Build the provider described by the configuration.
///
/// # Errors
///
/// Returns an error if SAML is selected without an entry point or with an
/// undecodable certificate.
pub fn provider_from_config(config: &AuthConfig) -> Result<Arc<dyn IdentityProvider>, AuthError> {
    if config.mock {
        return Ok(Arc::new(BypassProvider));
    }
    Ok(Arc::new(SamlProvider::from_config(&config.saml)?))
}
