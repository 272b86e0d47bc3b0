//! Error types for the model cache

use std::fmt;
use uuid::Uuid;

#[derive(Debug)]
pub enum CacheError {
    Io(Box<std::io::Error>),
    Serialization(serde_json::Error),
    /// An entry exists but cannot be decoded back to the bytes that were stored
    Corrupt { scene_id: Uuid, reason: String },
    /// An entry handed to `put` does not describe its own payload
    InvalidEntry { scene_id: Uuid, reason: String },
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheError::Io(err) => write!(f, "IO error: {}", err),
            CacheError::Serialization(err) => write!(f, "Serialization error: {}", err),
            CacheError::Corrupt { scene_id, reason } => {
                write!(f, "Corrupt cache entry for {}: {}", scene_id, reason)
            }
            CacheError::InvalidEntry { scene_id, reason } => {
                write!(f, "Invalid cache entry for {}: {}", scene_id, reason)
            }
        }
    }
}

impl std::error::Error for CacheError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CacheError::Io(err) => Some(err.as_ref()),
            CacheError::Serialization(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for CacheError {
    fn from(err: std::io::Error) -> Self {
        CacheError::Io(Box::new(err))
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::Serialization(err)
    }
}

pub type Result<T> = std::result::Result<T, CacheError>;
