//! Health check handler.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use vpress_store::StoreKind;

use crate::state::AppState;

/// Health response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub store_backend: StoreKind,
    /// Kept for callers that predate `store_backend`
    pub redis_enabled: bool,
    pub version: &'static str,
}

/// Health check endpoint (liveness probe).
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let report = state.orchestrator.health();
    Json(HealthResponse {
        status: report.status,
        store_backend: report.store_backend,
        redis_enabled: report.store_backend == StoreKind::Redis,
        version: env!("CARGO_PKG_VERSION"),
    })
}
