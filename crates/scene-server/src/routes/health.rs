use axum::extract::State;
use axum::Json;
use chrono::Utc;
use scene_protocol::HealthResponse;

use crate::error::AppError;
use crate::state::SharedState;

/// GET /health
pub async fn health(State(state): State<SharedState>) -> Result<Json<HealthResponse>, AppError> {
    let scenes = state.store.list().await?.len();
    let uptime_secs = (Utc::now() - state.started_at).num_seconds() as u64;

    Ok(Json(HealthResponse {
        status: "ok".to_string(),
        uptime_secs,
        scenes,
    }))
}
