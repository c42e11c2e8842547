//! Health check endpoint.

use axum::{Json, Router, routing::get};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;

use crate::state::AppState;

/// Build the health router.
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}

/// Health check response body.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always `OK` while the process is serving.
    pub status: &'static str,
    /// Current time, RFC 3339 UTC with milliseconds.
    pub timestamp: String,
}

/// Liveness health check endpoint.
///
/// GET /health
///
/// Does not check the directory or the log sink.
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "OK",
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    })
}
