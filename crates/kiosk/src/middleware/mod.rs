//! HTTP middleware stack for the kiosk.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (capture errors, transactions)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (add unique ID to each request)
//! 4. Security headers (CSP, framing, caching)
//! 5. Session layer (tower-sessions, in-memory store, signed cookie)
//!
//! Authentication is enforced per handler by the [`RequireOperator`] extractor.

pub mod auth;
pub mod request_id;
pub mod security_headers;
pub mod session;

pub use auth::{OptionalOperator, RequireOperator, clear_current_operator, set_current_operator};
pub use request_id::request_id_middleware;
pub use security_headers::security_headers_middleware;
pub use session::create_session_layer;
