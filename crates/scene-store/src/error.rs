//! Error types for the scene store

use glb_stream::{FormatViolation, GlbError};
use scene_protocol::FieldError;
use std::fmt;
use std::io;
use uuid::Uuid;

#[derive(Debug)]
pub enum SceneStoreError {
    /// Metadata failed schema validation
    Validation(Vec<FieldError>),
    FileTooLarge {
        limit: u64,
        observed: u64,
    },
    InvalidBinaryFormat(FormatViolation),
    NotFound(Uuid),
    /// The upload stream ended with an error before it was fully consumed
    UploadInterrupted(String),
    StorageIo {
        op: &'static str,
        scene_id: Option<Uuid>,
        source: Box<io::Error>,
    },
    /// A stored record could not be decoded
    CorruptRecord {
        scene_id: Option<Uuid>,
        source: serde_json::Error,
    },
}

impl SceneStoreError {
    pub(crate) fn io(op: &'static str, scene_id: Option<Uuid>) -> impl FnOnce(io::Error) -> Self {
        move |err| SceneStoreError::StorageIo {
            op,
            scene_id,
            source: Box::new(err),
        }
    }

    pub(crate) fn from_glb(err: GlbError, scene_id: Option<Uuid>) -> Self {
        match err {
            GlbError::TooLarge { limit, observed } => {
                SceneStoreError::FileTooLarge { limit, observed }
            }
            GlbError::InvalidFormat(violation) => SceneStoreError::InvalidBinaryFormat(violation),
            GlbError::Source(err) => SceneStoreError::UploadInterrupted(err.to_string()),
            GlbError::Io(err) => SceneStoreError::StorageIo {
                op: "write binary",
                scene_id,
                source: Box::new(err),
            },
        }
    }

    pub fn field(path: impl Into<String>, message: impl Into<String>) -> Self {
        SceneStoreError::Validation(vec![FieldError::new(path, message)])
    }

    /// True for errors caused by the request rather than the store
    pub fn is_client_error(&self) -> bool {
        !matches!(
            self,
            SceneStoreError::StorageIo { .. } | SceneStoreError::CorruptRecord { .. }
        )
    }
}

impl fmt::Display for SceneStoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SceneStoreError::Validation(errors) => {
                write!(f, "Validation failed")?;
                for (i, err) in errors.iter().enumerate() {
                    let sep = if i == 0 { ": " } else { "; " };
                    write!(f, "{}{}: {}", sep, err.path, err.message)?;
                }
                Ok(())
            }
            SceneStoreError::FileTooLarge { limit, .. } => {
                write!(f, "File size exceeds limit of {} bytes", limit)
            }
            SceneStoreError::InvalidBinaryFormat(violation) => write!(f, "{}", violation),
            SceneStoreError::NotFound(id) => write!(f, "Scene not found: {}", id),
            SceneStoreError::UploadInterrupted(msg) => write!(f, "Upload interrupted: {}", msg),
            SceneStoreError::StorageIo {
                op,
                scene_id: Some(id),
                source,
            } => write!(f, "Storage error during {} for scene {}: {}", op, id, source),
            SceneStoreError::StorageIo { op, source, .. } => {
                write!(f, "Storage error during {}: {}", op, source)
            }
            SceneStoreError::CorruptRecord {
                scene_id: Some(id),
                source,
            } => write!(f, "Corrupt record for scene {}: {}", id, source),
            SceneStoreError::CorruptRecord { source, .. } => {
                write!(f, "Corrupt record: {}", source)
            }
        }
    }
}

impl std::error::Error for SceneStoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SceneStoreError::StorageIo { source, .. } => Some(source.as_ref()),
            SceneStoreError::CorruptRecord { source, .. } => Some(source),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, SceneStoreError>;
