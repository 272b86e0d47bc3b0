//! Cache-aware model loading
//!
//! `load` fetches the scene metadata first and trusts its `hash` as the
//! current truth. The cached binary is used only when its hash matches;
//! otherwise the binary is downloaded, checked against that hash, and put
//! back into the cache. Cache failures never fail a load.

use crate::error::{ClientError, Result};
use crate::{FetchedModel, SceneSource};
use bytes::Bytes;
use glb_stream::sha256_hex;
use model_cache::{CachedModel, ModelCache};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// How many times a load restarts when the downloaded bytes do not match
/// the hash fetched just before them
const MAX_ATTEMPTS: usize = 3;

/// Where a loaded binary came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelOrigin {
    Cache,
    Network,
}

#[derive(Debug, Clone)]
pub struct LoadedModel {
    pub scene_id: Uuid,
    pub data: Bytes,
    pub hash: String,
    pub mime_type: String,
    pub origin: ModelOrigin,
}

/// Outcome of one pass through the load algorithm
enum Probe {
    Loaded(LoadedModel),
    /// The scene changed between the metadata fetch and the model fetch
    Stale { expected: String, actual: String },
}

pub struct ModelLoader {
    source: Arc<dyn SceneSource>,
    cache: Arc<dyn ModelCache>,
}

impl ModelLoader {
    pub fn new(source: Arc<dyn SceneSource>, cache: Arc<dyn ModelCache>) -> Self {
        Self { source, cache }
    }

    /// Current model binary for a scene
    pub async fn load(&self, scene_id: Uuid) -> Result<LoadedModel> {
        let mut attempt = 1;
        loop {
            match self.probe(scene_id).await? {
                Probe::Loaded(model) => return Ok(model),
                Probe::Stale { expected, actual } if attempt >= MAX_ATTEMPTS => {
                    return Err(ClientError::HashMismatch {
                        scene_id,
                        expected,
                        actual,
                    });
                }
                Probe::Stale { expected, actual } => {
                    warn!(
                        scene_id = %scene_id,
                        expected = %expected,
                        actual = %actual,
                        attempt,
                        "Downloaded model does not match scene hash, retrying"
                    );
                    attempt += 1;
                }
            }
        }
    }

    /// Drop the cached copy of a scene's model
    pub async fn forget(&self, scene_id: Uuid) -> Result<()> {
        self.cache.delete(scene_id).await?;
        debug!(scene_id = %scene_id, "Forgot cached model");
        Ok(())
    }

    async fn probe(&self, scene_id: Uuid) -> Result<Probe> {
        let scene = self.source.get_scene(scene_id).await?;

        if let Some(cached) = self.cached(scene_id).await {
            if cached.hash == scene.hash {
                debug!(scene_id = %scene_id, hash = %scene.hash, "Using cached model");
                return Ok(Probe::Loaded(LoadedModel {
                    scene_id,
                    data: cached.data,
                    hash: cached.hash,
                    mime_type: cached.mime_type,
                    origin: ModelOrigin::Cache,
                }));
            }
            debug!(
                scene_id = %scene_id,
                cached = %cached.hash,
                current = %scene.hash,
                "Cached model is stale"
            );
        }

        let FetchedModel { data, mime_type } = self.source.get_model(scene_id).await?;
        let actual = sha256_hex(&data);
        if actual != scene.hash {
            return Ok(Probe::Stale {
                expected: scene.hash,
                actual,
            });
        }

        let entry = CachedModel::new(scene_id, data.clone(), scene.hash.clone(), mime_type.clone());
        if let Err(e) = self.cache.put(entry).await {
            warn!(scene_id = %scene_id, error = %e, "Failed to cache model");
            // Continue even if caching fails
        }
        info!(scene_id = %scene_id, hash = %scene.hash, size = data.len(), "Loaded model from server");

        Ok(Probe::Loaded(LoadedModel {
            scene_id,
            data,
            hash: scene.hash,
            mime_type,
            origin: ModelOrigin::Network,
        }))
    }

    /// A cache that cannot be read is treated as empty
    async fn cached(&self, scene_id: Uuid) -> Option<CachedModel> {
        match self.cache.get(scene_id).await {
            Ok(entry) => entry,
            Err(e) => {
                warn!(scene_id = %scene_id, error = %e, "Failed to read model cache");
                None
            }
        }
    }
}
