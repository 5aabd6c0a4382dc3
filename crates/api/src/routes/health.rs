//! Health check endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use serde::Serialize;

use super::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub storage: &'static str,
}

/// GET /health: liveness plus the storage backend in use.
pub async fn check<S, C>(State(state): State<Arc<AppState<S, C>>>) -> Json<HealthResponse>
where
    S: Send + Sync + 'static,
    C: Send + Sync + 'static,
{
    Json(HealthResponse {
        status: "ok",
        storage: state.storage,
    })
}
