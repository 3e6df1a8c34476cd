//! Health check endpoint.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;

use crate::health::Status;

use super::AppState;

/// Health check handler.
///
/// Runs the component subchecks and returns the status document as JSON:
/// 200 when healthy, 503 when any subcheck is unhealthy.
pub async fn health_handler(State(state): State<AppState>) -> (StatusCode, Json<Status>) {
    let status = state.checker().check().await;
    let code = if status.healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(status))
}
