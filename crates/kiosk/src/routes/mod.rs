//! HTTP route handlers for the kiosk.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health              - Health check
//!
//! # Kiosk (operator required)
//! GET  /                    - Kiosk page
//! POST /scan                - Look up and log a badge scan
//!
//! # Auth
//! GET  /auth/login          - Start login (bypass or SSO redirect)
//! POST /auth/saml/callback  - SSO assertion consumer
//! GET  /auth/logout         - Logout
//!
//! # Assets
//! GET  /static/*            - Kiosk script and stylesheet
//! ```

pub mod auth;
pub mod health;
pub mod home;
pub mod scan;

use axum::Router;

use crate::state::AppState;

/// Build the application router (without state or middleware).
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(home::router())
        .merge(scan::router())
        .merge(auth::router())
}
