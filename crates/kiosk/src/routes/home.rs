//! Kiosk page route handler.

use askama::Template;
use askama_web::WebTemplate;
use axum::{Router, response::IntoResponse, routing::get};
use tracing::instrument;

use crate::middleware::RequireOperator;
use crate::state::AppState;

/// Build the kiosk page router.
pub fn router() -> Router<AppState> {
    Router::new().route("/", get(index))
}

/// Kiosk page template.
#[derive(Template, WebTemplate)]
#[template(path = "index.html")]
pub struct KioskTemplate {
    /// Display name of the signed-in operator.
    pub operator_name: String,
}

/// Display the kiosk page.
///
/// GET /
#[instrument(skip_all)]
async fn index(RequireOperator(operator): RequireOperator) -> impl IntoResponse {
    KioskTemplate {
        operator_name: operator.display_name,
    }
}
