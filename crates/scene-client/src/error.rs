//! Error types for the scene client

use model_cache::CacheError;
use scene_protocol::FieldError;
use std::fmt;
use uuid::Uuid;

/// Errors that can occur when talking to the scene server
#[derive(Debug)]
pub enum ClientError {
    /// HTTP request failed or the response could not be decoded
    Http(reqwest::Error),
    /// Failed to encode a request body
    Json(serde_json::Error),
    /// The server has no scene with this id
    NotFound(Uuid),
    /// The server answered with a non-success status
    Status {
        status: u16,
        message: String,
        errors: Vec<FieldError>,
    },
    Cache(CacheError),
    /// Repeated fetches never produced bytes matching the advertised hash
    HashMismatch {
        scene_id: Uuid,
        expected: String,
        actual: String,
    },
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http(e) => write!(f, "Scene server HTTP error: {}", e),
            Self::Json(e) => write!(f, "Scene client JSON error: {}", e),
            Self::NotFound(id) => write!(f, "Scene not found: {}", id),
            Self::Status {
                status, message, ..
            } => write!(f, "Scene server returned {}: {}", status, message),
            Self::Cache(e) => write!(f, "Model cache error: {}", e),
            Self::HashMismatch {
                scene_id,
                expected,
                actual,
            } => write!(
                f,
                "Model for {} hashed to {}, expected {}",
                scene_id, actual, expected
            ),
        }
    }
}

impl std::error::Error for ClientError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Http(e) => Some(e),
            Self::Json(e) => Some(e),
            Self::Cache(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        Self::Http(e)
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}

impl From<CacheError> for ClientError {
    fn from(e: CacheError) -> Self {
        Self::Cache(e)
    }
}

/// Result type for scene client operations
pub type Result<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_display() {
        let err = ClientError::Status {
            status: 413,
            message: "File size exceeds limit of 52428800 bytes".into(),
            errors: vec![],
        };
        assert_eq!(
            err.to_string(),
            "Scene server returned 413: File size exceeds limit of 52428800 bytes"
        );
    }

    #[test]
    fn test_hash_mismatch_display() {
        let err = ClientError::HashMismatch {
            scene_id: Uuid::nil(),
            expected: "aa".into(),
            actual: "bb".into(),
        };
        assert_eq!(
            err.to_string(),
            "Model for 00000000-0000-0000-0000-000000000000 hashed to bb, expected aa"
        );
    }
}
