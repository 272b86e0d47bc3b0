//! Cache types

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A cached model binary and the hash it was fetched under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedModel {
    pub scene_id: Uuid,
    pub data: Bytes,
    pub hash: String,
    pub mime_type: String,
    pub size: u64,
}

impl CachedModel {
    pub fn new(
        scene_id: Uuid,
        data: Bytes,
        hash: impl Into<String>,
        mime_type: impl Into<String>,
    ) -> Self {
        let size = data.len() as u64;
        Self {
            scene_id,
            data,
            hash: hash.into(),
            mime_type: mime_type.into(),
            size,
        }
    }
}

/// Entry metadata without the payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheInfo {
    pub hash: String,
    pub size: u64,
    pub mime_type: String,
}

/// Statistics about the cache
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStats {
    pub entries: usize,
    /// Bytes the entries take up where they are stored
    pub total_size: u64,
    pub hits: u64,
    pub misses: u64,
}
