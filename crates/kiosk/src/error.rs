//! Unified error handling for the kiosk.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use checkin_core::IdentityClaims;
use serde_json::json;
use thiserror::Error;

use crate::services::directory::DirectoryError;

/// Application-level error type for the kiosk's JSON endpoints.
///
/// Every variant renders as `{ "success": false, "error": "..." }`.
#[derive(Debug, Error)]
pub enum AppError {
    /// Directory lookup failed.
    #[error("Directory error: {0}")]
    Directory(#[from] DirectoryError),

    /// Session store operation failed.
    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// Caller has no operator identity.
    #[error("Not authenticated")]
    Unauthorized,

    /// Bad request from client.
    #[error("{0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    const fn status(&self) -> StatusCode {
        match self {
            Self::Directory(_) | Self::Session(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Log server errors with Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Kiosk request error"
            );
        }

        // Don't expose internal error details to clients
        let message = if status.is_server_error() {
            "System error".to_string()
        } else {
            self.to_string()
        };

        (status, Json(json!({ "success": false, "error": message }))).into_response()
    }
}

/// Set the Sentry user context from the operator's claims.
pub fn set_sentry_user(claims: &IdentityClaims) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(claims.subject_id.clone()),
            username: Some(claims.local_id.clone()),
            email: claims.email().map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}
