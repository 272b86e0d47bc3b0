//! Server-side scene asset store
//!
//! Each scene is a directory holding `scene.json` (the record) and
//! `scene.glb` (the binary). A scene exists iff its `scene.json` exists,
//! and that file is only ever written after the binary it describes is
//! fully on disk, so the recorded hash always matches the stored bytes.

pub mod error;
mod locks;
pub mod settings;
mod staging;
pub mod store;
pub mod validation;

pub use error::{Result, SceneStoreError};
pub use glb_stream::{FormatViolation, GlbUpload};
pub use settings::SettingsStore;
pub use store::{ModelFile, SceneStore, StoreConfig};
