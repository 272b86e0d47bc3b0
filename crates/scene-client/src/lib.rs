//! Client side of the scene asset store
//!
//! [`SceneClient`] speaks the server's HTTP API. [`ModelLoader`] sits on top
//! of any [`SceneSource`] and a [`model_cache::ModelCache`] and only
//! transfers a model binary when the cached copy is missing or stale.

mod client;
mod error;
mod loader;

pub use client::SceneClient;
pub use error::{ClientError, Result};
pub use loader::{LoadedModel, ModelLoader, ModelOrigin};

use async_trait::async_trait;
use bytes::Bytes;
use scene_protocol::Scene;
use uuid::Uuid;

/// A model binary as served, with its media type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedModel {
    pub data: Bytes,
    pub mime_type: String,
}

/// Read access to the authoritative scene store
#[async_trait]
pub trait SceneSource: Send + Sync {
    /// Current metadata, including the authoritative hash
    async fn get_scene(&self, scene_id: Uuid) -> Result<Scene>;

    async fn get_model(&self, scene_id: Uuid) -> Result<FetchedModel>;
}
