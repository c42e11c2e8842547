//! Authentication route handlers.
//!
//! Login is delegated to the configured identity provider. The bypass
//! provider signs the caller in immediately; SAML sends the browser to the
//! identity provider and completes on the callback.

use axum::{
    Form, Router,
    extract::{State, rejection::FormRejection},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use checkin_core::IdentityClaims;
use serde::Deserialize;
use tower_sessions::Session;

use crate::error::{AppError, clear_sentry_user, set_sentry_user};
use crate::middleware::{OptionalOperator, clear_current_operator, set_current_operator};
use crate::services::identity::AuthStart;
use crate::state::AppState;

/// Build the auth router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/login", get(login))
        .route("/auth/saml/callback", post(saml_callback))
        .route("/auth/logout", get(logout))
}

/// Form posted by the identity provider.
#[derive(Debug, Deserialize)]
struct SamlCallbackForm {
    #[serde(rename = "SAMLResponse")]
    saml_response: String,
    #[serde(rename = "RelayState")]
    relay_state: Option<String>,
}

/// Start a login.
///
/// GET /auth/login
async fn login(
    State(state): State<AppState>,
    session: Session,
    OptionalOperator(current): OptionalOperator,
) -> Result<Response, AppError> {
    if current.is_some() {
        return Ok(Redirect::to("/").into_response());
    }

    let start = state.identity().begin_auth(None).map_err(|e| {
        AppError::Internal(format!("{} login could not start: {e}", state.identity().name()))
    })?;

    match start {
        AuthStart::Authenticated(claims) => {
            complete_login(&session, &claims, state.identity().name()).await?;
            Ok(Redirect::to("/").into_response())
        }
        AuthStart::Redirect(location) => Ok(Redirect::to(&location).into_response()),
    }
}

/// Complete a SAML login.
///
/// POST /auth/saml/callback
async fn saml_callback(
    State(state): State<AppState>,
    session: Session,
    form: Result<Form<SamlCallbackForm>, FormRejection>,
) -> Result<Redirect, AppError> {
    let Form(form) = match form {
        Ok(form) => form,
        Err(e) => {
            tracing::warn!(error = %e, "SSO callback without a SAMLResponse");
            return Ok(Redirect::to("/auth/login"));
        }
    };

    let claims = match state.identity().handle_callback(&form.saml_response) {
        Ok(claims) => claims,
        Err(e) => {
            tracing::warn!(error = %e, "SSO callback rejected");
            return Ok(Redirect::to("/auth/login"));
        }
    };

    complete_login(&session, &claims, state.identity().name()).await?;

    let target = form
        .relay_state
        .as_deref()
        .filter(|path| is_local_path(path))
        .unwrap_or("/");
    Ok(Redirect::to(target))
}

/// Sign out and discard the session.
///
/// GET /auth/logout
async fn logout(
    session: Session,
    OptionalOperator(current): OptionalOperator,
) -> Result<Redirect, AppError> {
    clear_current_operator(&session).await?;
    clear_sentry_user();

    if let Some(operator) = current {
        tracing::info!(operator = %operator.local_id, "Operator signed out");
    }
    Ok(Redirect::to("/auth/login"))
}

async fn complete_login(
    session: &Session,
    claims: &IdentityClaims,
    provider: &str,
) -> Result<(), AppError> {
    set_current_operator(session, claims).await?;
    set_sentry_user(claims);
    tracing::info!(
        operator = %claims.local_id,
        name = %claims.display_name,
        provider,
        "Operator signed in"
    );
    Ok(())
}

/// Only same-site paths are followed after login.
fn is_local_path(path: &str) -> bool {
    path.starts_with('/') && !path.starts_with("//") && !path.contains('\\')
}
