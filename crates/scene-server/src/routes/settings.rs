use axum::body::Bytes;
use axum::extract::State;
use axum::Json;
use scene_protocol::Settings;
use scene_store::{validation, SceneStoreError};

use crate::error::AppError;
use crate::state::SharedState;
use crate::upload::parse_json;

/// GET /config
pub async fn get_settings(State(state): State<SharedState>) -> Result<Json<Settings>, AppError> {
    Ok(Json(state.settings.get().await?))
}

/// PUT /config
/// The default scene, when given, must already exist.
pub async fn put_settings(
    State(state): State<SharedState>,
    body: Bytes,
) -> Result<Json<Settings>, AppError> {
    let settings = validation::parse_settings(&parse_json(&body, "")?)?;

    if let Some(id) = settings.default_scene_id {
        match state.store.get(id).await {
            Ok(_) => {}
            Err(SceneStoreError::NotFound(_)) => {
                return Err(AppError::field(
                    "defaultSceneId",
                    "does not name an existing scene",
                ))
            }
            Err(e) => return Err(e.into()),
        }
    }

    state.settings.put(&settings).await?;
    Ok(Json(settings))
}
