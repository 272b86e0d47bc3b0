//! Persistent cache with one JSON document per scene
//!
//! Payloads are stored as standard base64 inside the document, so an entry
//! is a single self-describing file. Decoding must give back exactly the
//! bytes that were put; anything else is reported as corrupt.

use crate::error::{CacheError, Result};
use crate::types::{CacheInfo, CacheStats, CachedModel};
use crate::ModelCache;
use async_trait::async_trait;
use base64::Engine;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// On-disk shape of an entry
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredEntry {
    scene_id: Uuid,
    model_data: String,
    hash: String,
    mime_type: String,
    size: u64,
}

/// Only the small fields, so `info` skips the payload
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredInfo {
    hash: String,
    mime_type: String,
    size: u64,
}

pub struct FileModelCache {
    dir: PathBuf,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl FileModelCache {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Ensure the cache directory exists
    pub async fn init(&self) -> Result<()> {
        fs::create_dir_all(&self.dir).await?;
        info!(cache_dir = ?self.dir, "Model cache initialized");
        Ok(())
    }

    fn entry_path(&self, scene_id: Uuid) -> PathBuf {
        self.dir.join(format!("{}.json", scene_id))
    }

    async fn read_entry(&self, scene_id: Uuid) -> Result<Option<Vec<u8>>> {
        match fs::read(self.entry_path(scene_id)).await {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Hash, size and media type of an entry without decoding its payload
    pub async fn info(&self, scene_id: Uuid) -> Result<Option<CacheInfo>> {
        let Some(raw) = self.read_entry(scene_id).await? else {
            return Ok(None);
        };
        let stored: StoredInfo = serde_json::from_slice(&raw).map_err(|e| CacheError::Corrupt {
            scene_id,
            reason: e.to_string(),
        })?;
        Ok(Some(CacheInfo {
            hash: stored.hash,
            size: stored.size,
            mime_type: stored.mime_type,
        }))
    }

    /// Get current cache statistics.
    ///
    /// `total_size` is the size of the JSON documents on disk, which is
    /// roughly 4/3 of the payload sizes.
    pub async fn stats(&self) -> Result<CacheStats> {
        let mut entries = 0;
        let mut total_size = 0;
        let mut dir = fs::read_dir(&self.dir).await?;
        while let Some(entry) = dir.next_entry().await? {
            if entry.path().extension().is_some_and(|ext| ext == "json") {
                entries += 1;
                total_size += entry.metadata().await?.len();
            }
        }
        Ok(CacheStats {
            entries,
            total_size,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        })
    }

    fn decode(scene_id: Uuid, raw: &[u8]) -> Result<CachedModel> {
        let corrupt = |reason: String| CacheError::Corrupt { scene_id, reason };

        let stored: StoredEntry =
            serde_json::from_slice(raw).map_err(|e| corrupt(e.to_string()))?;
        if stored.scene_id != scene_id {
            return Err(corrupt(format!("entry belongs to {}", stored.scene_id)));
        }

        let data = base64::engine::general_purpose::STANDARD
            .decode(stored.model_data.as_bytes())
            .map_err(|e| corrupt(format!("invalid base64: {}", e)))?;
        if data.len() as u64 != stored.size {
            return Err(corrupt(format!(
                "decoded {} bytes, expected {}",
                data.len(),
                stored.size
            )));
        }

        Ok(CachedModel {
            scene_id,
            data: Bytes::from(data),
            hash: stored.hash,
            mime_type: stored.mime_type,
            size: stored.size,
        })
    }
}

#[async_trait]
impl ModelCache for FileModelCache {
    async fn get(&self, scene_id: Uuid) -> Result<Option<CachedModel>> {
        let Some(raw) = self.read_entry(scene_id).await? else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            debug!(scene_id = %scene_id, "Cache miss");
            return Ok(None);
        };

        let model = Self::decode(scene_id, &raw)?;
        self.hits.fetch_add(1, Ordering::Relaxed);
        debug!(scene_id = %scene_id, size = model.size, "Cache hit");
        Ok(Some(model))
    }

    async fn put(&self, model: CachedModel) -> Result<()> {
        if model.size != model.data.len() as u64 {
            return Err(CacheError::InvalidEntry {
                scene_id: model.scene_id,
                reason: format!("size is {} but data has {} bytes", model.size, model.data.len()),
            });
        }

        let entry = StoredEntry {
            scene_id: model.scene_id,
            model_data: base64::engine::general_purpose::STANDARD.encode(&model.data),
            hash: model.hash,
            mime_type: model.mime_type,
            size: model.size,
        };
        let document = serde_json::to_vec(&entry)?;

        let tmp = self
            .dir
            .join(format!("{}.json.{}.tmp", model.scene_id, Uuid::new_v4()));
        let written = async {
            fs::write(&tmp, &document).await?;
            fs::rename(&tmp, self.entry_path(model.scene_id)).await
        }
        .await;

        if let Err(e) = written {
            if let Err(cleanup) = fs::remove_file(&tmp).await {
                if cleanup.kind() != io::ErrorKind::NotFound {
                    warn!(path = ?tmp, error = %cleanup, "Failed to remove temporary cache file");
                }
            }
            return Err(e.into());
        }

        debug!(scene_id = %model.scene_id, size = model.size, "Cached model");
        Ok(())
    }

    async fn delete(&self, scene_id: Uuid) -> Result<()> {
        match fs::remove_file(self.entry_path(scene_id)).await {
            Ok(()) => {
                debug!(scene_id = %scene_id, "Removed cached model");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
