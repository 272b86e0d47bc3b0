use axum::body::{Body, Bytes};
use axum::extract::{FromRequest, Multipart, Path, Request, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use scene_protocol::{Scene, ScenePatch, SceneResponse, ScenesResponse};
use scene_store::{validation, ModelFile};
use tokio_util::io::ReaderStream;
use tracing::debug;
use uuid::Uuid;

use crate::error::AppError;
use crate::state::SharedState;
use crate::upload::{check_content_length, file_upload, parse_json, read_payload};

/// Ids that are not UUIDs cannot name a scene
fn scene_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::NotFound(format!("Scene not found: {}", raw)))
}

/// GET /scenes
pub async fn list_scenes(
    State(state): State<SharedState>,
) -> Result<Json<ScenesResponse>, AppError> {
    let scenes = state.store.list().await?;
    Ok(Json(ScenesResponse { scenes }))
}

/// GET /scenes/{id}
pub async fn get_scene(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<Scene>, AppError> {
    Ok(Json(state.store.get(scene_id(&id)?).await?))
}

/// POST /scenes
/// Multipart with `payload_json` followed by `file`.
pub async fn create_scene(
    State(state): State<SharedState>,
    request: Request,
) -> Result<Response, AppError> {
    check_content_length(request.headers(), state.store.max_upload_bytes())?;
    let mut multipart = Multipart::from_request(request, &state).await?;

    let mut payload = None;
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("payload_json") => payload = Some(read_payload(field).await?),
            Some("file") => {
                let Some(payload) = payload.take() else {
                    return Err(AppError::field(
                        "payload_json",
                        "must be sent before the file",
                    ));
                };
                let metadata = validation::parse_metadata(&payload)?;
                let scene = state.store.create(metadata, file_upload(field)).await?;

                let location = format!("/scenes/{}", scene.id);
                return Ok((
                    StatusCode::CREATED,
                    [(header::LOCATION, location)],
                    Json(SceneResponse { scene }),
                )
                    .into_response());
            }
            other => debug!(field = ?other, "Ignoring multipart field"),
        }
    }

    Err(match payload {
        None => AppError::field("payload_json", "is required"),
        Some(_) => AppError::field("file", "is required"),
    })
}

/// PATCH /scenes/{id}
/// Either a JSON metadata patch, or multipart with an optional
/// `payload_json` and an optional `file` (metadata first when both are sent).
pub async fn update_scene(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    request: Request,
) -> Result<Json<SceneResponse>, AppError> {
    let id = scene_id(&id)?;
    check_content_length(request.headers(), state.store.max_upload_bytes())?;

    let is_multipart = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("multipart/form-data"));

    let scene = if is_multipart {
        update_multipart(&state, id, request).await?
    } else {
        let body = Bytes::from_request(request, &state).await?;
        let patch = if body.is_empty() {
            ScenePatch::default()
        } else {
            validation::parse_patch(&parse_json(&body, "")?)?
        };
        state.store.update(id, patch, None).await?
    };

    Ok(Json(SceneResponse { scene }))
}

async fn update_multipart(
    state: &SharedState,
    id: Uuid,
    request: Request,
) -> Result<Scene, AppError> {
    let mut multipart = Multipart::from_request(request, state).await?;

    let mut patch = ScenePatch::default();
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("payload_json") => {
                patch = validation::parse_patch(&read_payload(field).await?)?;
            }
            Some("file") => {
                return Ok(state.store.update(id, patch, Some(file_upload(field))).await?);
            }
            other => debug!(field = ?other, "Ignoring multipart field"),
        }
    }

    Ok(state.store.update(id, patch, None).await?)
}

/// DELETE /scenes/{id}
pub async fn delete_scene(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.store.delete(scene_id(&id)?).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /scenes/{id}/model
/// Streams the stored binary from disk.
pub async fn get_model(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let id = scene_id(&id)?;
    let ModelFile {
        file,
        size,
        hash,
        mime_type,
    } = state.store.get_model(id).await?;

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, mime_type)
        .header(header::CONTENT_LENGTH, size)
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}.glb\"", id),
        )
        .header(header::ETAG, format!("\"{}\"", hash))
        .body(Body::from_stream(ReaderStream::new(file)))
        .map_err(|e| AppError::Internal(e.to_string()))
}
