//! Health endpoint.

use axum::Json;
use axum::extract::State;

use crate::AppState;
use crate::error::AppResult;
use crate::models::HealthResponse;

/// `GET /health` — verifies the store is reachable.
pub async fn health_handler(State(state): State<AppState>) -> AppResult<Json<HealthResponse>> {
    let db_connected = state.store.ping().await;
    Ok(Json(HealthResponse {
        status: if db_connected { "ok" } else { "degraded" }.to_string(),
        db_connected,
        version: pilates_core::version().to_string(),
    }))
}
