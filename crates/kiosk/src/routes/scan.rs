//! Scan endpoint: lookup, log, respond.

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    response::{IntoResponse, Response},
    routing::post,
};
use checkin_core::{PersonRecord, ScanId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::instrument;

use crate::error::AppError;
use crate::middleware::RequireOperator;
use crate::state::AppState;

/// Error message for a missing or blank scan identifier.
const MISSING_ID: &str = "No RFID ID provided";

/// Error message for an unknown scan identifier.
const NOT_FOUND: &str = "Student not found";

/// Build the scan router.
pub fn router() -> Router<AppState> {
    Router::new().route("/scan", post(scan))
}

/// Request body for `POST /scan`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScanRequest {
    /// Usually a string; some readers are configured to send a number.
    #[serde(default)]
    rfid_id: Option<Value>,
}

impl ScanRequest {
    /// Parse the raw body into a scan identifier.
    fn scan_id(body: &[u8]) -> Option<ScanId> {
        let request: Self = serde_json::from_slice(body).ok()?;
        let raw = match request.rfid_id? {
            Value::String(s) => s,
            Value::Number(n) => n.to_string(),
            _ => return None,
        };
        ScanId::parse(&raw).ok()
    }
}

/// Response body for `POST /scan`.
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum ScanResponse {
    Found { success: bool, person: PersonRecord },
    NotFound { success: bool, error: &'static str },
}

impl IntoResponse for ScanResponse {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

/// Look up a scanned badge and record the attempt.
///
/// POST /scan
#[instrument(skip_all, fields(operator = %operator.local_id))]
async fn scan(
    RequireOperator(operator): RequireOperator,
    State(state): State<AppState>,
    body: Bytes,
) -> Result<ScanResponse, AppError> {
    let scan_id =
        ScanRequest::scan_id(&body).ok_or_else(|| AppError::BadRequest(MISSING_ID.to_string()))?;

    let person = state.directory().lookup(&scan_id).await?;

    state
        .logger()
        .record(person.as_ref(), person.is_some(), Some(&operator))
        .await;

    Ok(match person {
        Some(person) => {
            tracing::info!(scan_id = %scan_id, person_id = %person.short_id, "Scan matched");
            ScanResponse::Found {
                success: true,
                person,
            }
        }
        None => {
            tracing::info!(scan_id = %scan_id, "Scan not found");
            ScanResponse::NotFound {
                success: false,
                error: NOT_FOUND,
            }
        }
    })
}
