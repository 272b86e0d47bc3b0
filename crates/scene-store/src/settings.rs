//! Server-wide settings document (`{root}/config.json`)

use crate::error::{Result, SceneStoreError};
use crate::staging::stage_json;
use scene_protocol::Settings;
use std::io;
use std::path::PathBuf;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::info;

pub struct SettingsStore {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl SettingsStore {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            write_lock: Mutex::new(()),
        }
    }

    fn path(&self) -> PathBuf {
        self.root.join("config.json")
    }

    /// Stored settings, or the defaults when none were ever saved
    pub async fn get(&self) -> Result<Settings> {
        let raw = match fs::read(self.path()).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Settings::default()),
            Err(e) => return Err(SceneStoreError::io("read settings", None)(e)),
        };
        serde_json::from_slice(&raw)
            .map_err(|source| SceneStoreError::CorruptRecord {
                scene_id: None,
                source,
            })
    }

    /// Replace the stored settings
    pub async fn put(&self, settings: &Settings) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        fs::create_dir_all(&self.root)
            .await
            .map_err(SceneStoreError::io("create data directory", None))?;
        let staged = stage_json(&self.root, settings)
            .await
            .map_err(SceneStoreError::io("stage settings", None))?;
        staged
            .persist(&self.path())
            .await
            .map_err(SceneStoreError::io("write settings", None))?;

        info!(default_scene_id = ?settings.default_scene_id, "Saved settings");
        Ok(())
    }
}
