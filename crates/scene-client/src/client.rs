//! HTTP client for the scene server

use crate::error::{ClientError, Result};
use crate::{FetchedModel, SceneSource};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use reqwest::{header, Response, StatusCode};
use scene_protocol::{
    ErrorResponse, Scene, SceneMetadata, ScenePatch, SceneResponse, ScenesResponse,
    GLB_MIME_TYPE,
};
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

/// Client for the `/scenes` API of a scene server
pub struct SceneClient {
    http: reqwest::Client,
    base_url: String,
}

impl SceneClient {
    /// Create a client with default settings (30 second timeout)
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::with_timeout(base_url, Duration::from_secs(30))
    }

    /// Create a client with a custom timeout
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_http(base_url, http))
    }

    /// Use an existing `reqwest::Client`
    pub fn with_http(base_url: impl Into<String>, http: reqwest::Client) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { http, base_url }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// List every scene
    pub async fn list(&self) -> Result<Vec<Scene>> {
        let response = self.http.get(self.url("/scenes")).send().await?;
        let body: ScenesResponse = check(response, None).await?.json().await?;
        Ok(body.scenes)
    }

    pub async fn get(&self, scene_id: Uuid) -> Result<Scene> {
        let response = self
            .http
            .get(self.url(&format!("/scenes/{}", scene_id)))
            .send()
            .await?;
        Ok(check(response, Some(scene_id)).await?.json().await?)
    }

    /// Download the model binary of a scene
    pub async fn get_model(&self, scene_id: Uuid) -> Result<FetchedModel> {
        let response = self
            .http
            .get(self.url(&format!("/scenes/{}/model", scene_id)))
            .send()
            .await?;
        let response = check(response, Some(scene_id)).await?;

        let mime_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or(GLB_MIME_TYPE)
            .to_string();
        let data = response.bytes().await?;
        debug!(scene_id = %scene_id, size = data.len(), "Downloaded model");

        Ok(FetchedModel { data, mime_type })
    }

    /// Upload a new scene
    pub async fn create(&self, metadata: &SceneMetadata, file: Bytes) -> Result<Scene> {
        let form = Form::new()
            .text("payload_json", payload(metadata)?)
            .part("file", file_part(file)?);

        let response = self
            .http
            .post(self.url("/scenes"))
            .multipart(form)
            .send()
            .await?;
        let body: SceneResponse = check(response, None).await?.json().await?;
        Ok(body.scene)
    }

    /// Patch metadata, optionally replacing the binary.
    ///
    /// Without a file the patch is sent as a plain JSON body.
    pub async fn update(
        &self,
        scene_id: Uuid,
        patch: &ScenePatch,
        file: Option<Bytes>,
    ) -> Result<Scene> {
        let request = self.http.patch(self.url(&format!("/scenes/{}", scene_id)));
        let request = match file {
            Some(file) => request.multipart(
                Form::new()
                    .text("payload_json", payload(patch)?)
                    .part("file", file_part(file)?),
            ),
            None => request.json(patch),
        };

        let response = request.send().await?;
        let body: SceneResponse = check(response, Some(scene_id)).await?.json().await?;
        Ok(body.scene)
    }

    pub async fn delete(&self, scene_id: Uuid) -> Result<()> {
        let response = self
            .http
            .delete(self.url(&format!("/scenes/{}", scene_id)))
            .send()
            .await?;
        check(response, Some(scene_id)).await?;
        Ok(())
    }
}

#[async_trait]
impl SceneSource for SceneClient {
    async fn get_scene(&self, scene_id: Uuid) -> Result<Scene> {
        self.get(scene_id).await
    }

    async fn get_model(&self, scene_id: Uuid) -> Result<FetchedModel> {
        SceneClient::get_model(self, scene_id).await
    }
}

fn payload<T: serde::Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

fn file_part(file: Bytes) -> Result<Part> {
    let len = file.len() as u64;
    Ok(Part::stream_with_length(file, len)
        .file_name("model.glb")
        .mime_str(GLB_MIME_TYPE)?)
}

/// Turn a non-success response into the matching error
async fn check(response: Response, scene_id: Option<Uuid>) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if let (StatusCode::NOT_FOUND, Some(id)) = (status, scene_id) {
        return Err(ClientError::NotFound(id));
    }

    let (message, errors) = match response.json::<ErrorResponse>().await {
        Ok(body) => (body.error, body.errors),
        Err(_) => (
            status.canonical_reason().unwrap_or("Error").to_string(),
            vec![],
        ),
    };
    Err(ClientError::Status {
        status: status.as_u16(),
        message,
        errors,
    })
}
