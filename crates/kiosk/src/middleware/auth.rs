//! Authentication extractors for the kiosk.
//!
//! The operator's identity claims are read from the session on every request.

use axum::{
    extract::FromRequestParts,
    http::{header::ACCEPT, request::Parts},
    response::{IntoResponse, Redirect, Response},
};
use checkin_core::IdentityClaims;
use tower_sessions::Session;

use crate::error::AppError;
use crate::models::session_keys;

/// Extractor that requires a signed-in operator.
///
/// Browser requests without one are redirected to `/auth/login`; API
/// requests get a 401 JSON body.
pub struct RequireOperator(pub IdentityClaims);

/// Error returned when an operator is required but nobody is signed in.
#[derive(Debug)]
pub enum OperatorRejection {
    /// Redirect to login page (for HTML requests).
    RedirectToLogin,
    /// Unauthorized response (for API requests).
    Unauthorized,
}

impl IntoResponse for OperatorRejection {
    fn into_response(self) -> Response {
        match self {
            Self::RedirectToLogin => Redirect::to("/auth/login").into_response(),
            Self::Unauthorized => AppError::Unauthorized.into_response(),
        }
    }
}

/// Whether the caller expects JSON rather than a page.
fn is_api_request(parts: &Parts) -> bool {
    parts.uri.path() == "/scan"
        || parts.uri.path().starts_with("/api/")
        || parts
            .headers
            .get(ACCEPT)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|accept| accept.contains("application/json"))
}

impl<S> FromRequestParts<S> for RequireOperator
where
    S: Send + Sync,
{
    type Rejection = OperatorRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let rejection = if is_api_request(parts) {
            OperatorRejection::Unauthorized
        } else {
            OperatorRejection::RedirectToLogin
        };

        // Get the session from extensions (set by SessionManagerLayer)
        let Some(session) = parts.extensions.get::<Session>() else {
            return Err(rejection);
        };

        let operator: IdentityClaims = session
            .get(session_keys::CURRENT_OPERATOR)
            .await
            .ok()
            .flatten()
            .ok_or(rejection)?;

        Ok(Self(operator))
    }
}

/// Extractor that optionally gets the current operator.
///
/// Unlike `RequireOperator`, this does not reject the request if nobody is signed in.
pub struct OptionalOperator(pub Option<IdentityClaims>);

impl<S> FromRequestParts<S> for OptionalOperator
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let operator = match parts.extensions.get::<Session>() {
            Some(session) => session
                .get::<IdentityClaims>(session_keys::CURRENT_OPERATOR)
                .await
                .ok()
                .flatten(),
            None => None,
        };

        Ok(Self(operator))
    }
}

/// Store the operator in a fresh session (login).
///
/// The session id is cycled first so a pre-login cookie cannot be reused.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_operator(
    session: &Session,
    operator: &IdentityClaims,
) -> Result<(), tower_sessions::session::Error> {
    session.cycle_id().await?;
    session.insert(session_keys::CURRENT_OPERATOR, operator).await
}

/// Discard the whole session (logout).
///
/// # Errors
///
/// Returns an error if the session store cannot delete the session.
pub async fn clear_current_operator(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session.flush().await
}
