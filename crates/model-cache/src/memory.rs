//! In-memory cache, lost when the process exits

use crate::error::Result;
use crate::types::CachedModel;
use crate::ModelCache;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
pub struct MemoryModelCache {
    entries: RwLock<HashMap<Uuid, CachedModel>>,
}

impl MemoryModelCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl ModelCache for MemoryModelCache {
    async fn get(&self, scene_id: Uuid) -> Result<Option<CachedModel>> {
        Ok(self.entries.read().await.get(&scene_id).cloned())
    }

    async fn put(&self, model: CachedModel) -> Result<()> {
        self.entries.write().await.insert(model.scene_id, model);
        Ok(())
    }

    async fn delete(&self, scene_id: Uuid) -> Result<()> {
        self.entries.write().await.remove(&scene_id);
        Ok(())
    }
}
