use chrono::{DateTime, Utc};
use scene_store::{SceneStore, SettingsStore};
use std::sync::Arc;

/// Shared state for the HTTP server
pub struct ServerState {
    pub store: SceneStore,
    pub settings: SettingsStore,
    pub started_at: DateTime<Utc>,
}

impl ServerState {
    pub fn new(store: SceneStore, settings: SettingsStore) -> Self {
        Self {
            store,
            settings,
            started_at: Utc::now(),
        }
    }
}

pub type SharedState = Arc<ServerState>;
