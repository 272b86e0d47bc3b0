//! Wire types for the scene asset API
//!
//! Shared by `scene-server` (which produces them) and `scene-client`
//! (which consumes them). TypeScript bindings are exported for the
//! browser front-end.

mod types;

pub use types::*;

/// Magic number at byte offset 0 of every GLB container ("glTF", little-endian)
pub const GLB_MAGIC: u32 = 0x4654_6C67;

/// The only GLB container version accepted
pub const GLB_VERSION: u32 = 2;

/// Size of the fixed header prefix checked before anything is persisted
pub const GLB_HEADER_LEN: usize = 8;

/// Media type served for stored binaries
pub const GLB_MIME_TYPE: &str = "model/gltf-binary";
