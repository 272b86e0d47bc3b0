//! Scene server - content-addressed storage for 3D scene assets
//!
//! Accepts GLB uploads with their scene metadata, validates and hashes them
//! in a single streaming pass, and serves them back to model caches.

mod config;
mod error;
mod routes;
mod server;
mod state;
mod upload;

use crate::config::Config;
use crate::error::Result;
use crate::server::start_server;
use crate::state::{ServerState, SharedState};
use scene_store::{SceneStore, SettingsStore, StoreConfig};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let env_filter = EnvFilter::from_default_env()
        .add_directive("scene_server=info".parse()?)
        .add_directive("scene_store=info".parse()?);

    // Use JSON format for GCP Cloud Logging when LOG_FORMAT=json
    if std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false)
    {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_stackdriver::layer())
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    };

    info!("Starting scene server...");

    let config = Config::from_env();
    info!("Port: {}", config.port);
    info!("Data dir: {:?}", config.data_dir);
    info!(
        "Max upload size: {} MB",
        config.max_upload_bytes / (1024 * 1024)
    );

    let store = SceneStore::new(StoreConfig {
        root: config.data_dir.clone(),
        max_upload_bytes: config.max_upload_bytes,
    });
    store.init().await?;
    let settings = SettingsStore::new(config.data_dir.clone());

    let state: SharedState = Arc::new(ServerState::new(store, settings));

    // Start HTTP server (blocking)
    start_server(state, config.port, &config.cors_origins).await?;

    Ok(())
}
