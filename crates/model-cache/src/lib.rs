//! Client-side model cache
//!
//! A dumb key-value store of model binaries keyed by scene id. It has no
//! expiry and no idea whether an entry is current: callers compare the
//! stored `hash` with the server's to decide that.

mod error;
mod file;
mod memory;
mod types;

pub use error::{CacheError, Result};
pub use file::FileModelCache;
pub use memory::MemoryModelCache;
pub use types::{CacheInfo, CacheStats, CachedModel};

use async_trait::async_trait;
use uuid::Uuid;

/// Storage operations of a model cache. No network access.
#[async_trait]
pub trait ModelCache: Send + Sync {
    async fn get(&self, scene_id: Uuid) -> Result<Option<CachedModel>>;

    /// Insert or fully replace the entry for `model.scene_id`
    async fn put(&self, model: CachedModel) -> Result<()>;

    /// Remove the entry if present
    async fn delete(&self, scene_id: Uuid) -> Result<()>;
}
