//! Health check endpoints.

use axum::{Json, extract::State};
use serde::Serialize;

use leadgate_common::LeadgateError;

use super::ApiError;
use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    ok: bool,
    version: &'static str,
}

/// Basic health check (is the server running?)
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Serialize)]
pub struct ReadyResponse {
    ok: bool,
}

/// Readiness check (are all stores reachable?)
pub async fn ready_check(State(state): State<AppState>) -> Result<Json<ReadyResponse>, ApiError> {
    state
        .check_backends()
        .await
        .map_err(|e| ApiError::unavailable(LeadgateError::storage(e)))?;

    Ok(Json(ReadyResponse { ok: true }))
}
