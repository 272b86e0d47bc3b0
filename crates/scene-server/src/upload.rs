//! Multipart handling for scene uploads
//!
//! A scene upload carries a `payload_json` part with the metadata and a
//! `file` part with the GLB. Metadata must come first so it can be
//! validated before any binary byte is read.

use crate::error::AppError;
use axum::extract::multipart::Field;
use axum::http::{header, HeaderMap};
use futures::TryStreamExt;
use scene_store::{GlbUpload, SceneStoreError};
use serde_json::Value;
use std::io;

/// Allowance for `payload_json` and multipart framing on top of the binary
pub const MAX_METADATA_BYTES: u64 = 1024 * 1024;

/// Reject a request whose declared length already rules it out
pub fn check_content_length(headers: &HeaderMap, max_upload_bytes: u64) -> Result<(), AppError> {
    let declared = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());

    match declared {
        Some(len) if len > max_upload_bytes + MAX_METADATA_BYTES => {
            Err(AppError::Store(SceneStoreError::FileTooLarge {
                limit: max_upload_bytes,
                observed: len,
            }))
        }
        _ => Ok(()),
    }
}

/// Read a `payload_json` part into untyped JSON
pub async fn read_payload(mut field: Field<'_>) -> Result<Value, AppError> {
    let mut raw = Vec::new();
    while let Some(chunk) = field.chunk().await? {
        if (raw.len() + chunk.len()) as u64 > MAX_METADATA_BYTES {
            return Err(AppError::field("payload_json", "must be at most 1MB"));
        }
        raw.extend_from_slice(&chunk);
    }
    parse_json(&raw, "payload_json")
}

pub fn parse_json(raw: &[u8], path: &str) -> Result<Value, AppError> {
    serde_json::from_slice(raw)
        .map_err(|e| AppError::field(path, &format!("invalid JSON: {}", e)))
}

/// Stream a `file` part through the GLB validator without buffering it
pub fn file_upload(field: Field<'_>) -> GlbUpload<'_> {
    GlbUpload::new(field.map_err(io::Error::other))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_content_length_within_allowance() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_LENGTH,
            HeaderValue::from(1024 + MAX_METADATA_BYTES),
        );
        assert!(check_content_length(&headers, 1024).is_ok());
    }

    #[test]
    fn test_content_length_over_allowance() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_LENGTH,
            HeaderValue::from(1025 + MAX_METADATA_BYTES),
        );
        assert!(matches!(
            check_content_length(&headers, 1024),
            Err(AppError::Store(SceneStoreError::FileTooLarge { limit: 1024, .. }))
        ));
    }

    #[test]
    fn test_missing_content_length_accepted() {
        assert!(check_content_length(&HeaderMap::new(), 1024).is_ok());
    }

    #[test]
    fn test_invalid_json_is_field_error() {
        let err = parse_json(b"{name:", "payload_json").unwrap_err();
        match err {
            AppError::Store(SceneStoreError::Validation(errors)) => {
                assert_eq!(errors[0].path, "payload_json");
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }
}
