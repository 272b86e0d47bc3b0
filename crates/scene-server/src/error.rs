//! Error types for the scene server

use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::rejection::BytesRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use scene_protocol::ErrorResponse;
use scene_store::SceneStoreError;
use std::fmt;

/// Request error type that converts to HTTP responses
#[derive(Debug)]
pub enum AppError {
    /// Body extraction failed; carries axum's status (413 for a body limit breach)
    Rejected {
        status: StatusCode,
        message: String,
    },
    NotFound(String),
    Store(SceneStoreError),
    Internal(String),
}

impl AppError {
    pub fn field(path: &str, message: &str) -> Self {
        AppError::Store(SceneStoreError::field(path, message))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::Rejected { status, message } => (status, plain(message)),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, plain(msg)),
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    plain("Internal server error".into()),
                )
            }
            AppError::Store(err) => store_error(err),
        };

        (status, Json(body)).into_response()
    }
}

fn plain(error: String) -> ErrorResponse {
    ErrorResponse {
        error,
        errors: vec![],
    }
}

fn store_error(err: SceneStoreError) -> (StatusCode, ErrorResponse) {
    let status = match &err {
        SceneStoreError::Validation(_)
        | SceneStoreError::InvalidBinaryFormat(_)
        | SceneStoreError::UploadInterrupted(_) => StatusCode::BAD_REQUEST,
        SceneStoreError::FileTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        SceneStoreError::NotFound(_) => StatusCode::NOT_FOUND,
        SceneStoreError::StorageIo { op, scene_id, .. } => {
            tracing::error!(op, scene_id = ?scene_id, error = %err, "Storage error");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                plain("Internal server error".into()),
            );
        }
        SceneStoreError::CorruptRecord { scene_id, .. } => {
            tracing::error!(scene_id = ?scene_id, error = %err, "Corrupt scene record");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                plain("Internal server error".into()),
            );
        }
    };

    let message = err.to_string();
    let errors = match err {
        SceneStoreError::Validation(errors) => errors,
        _ => vec![],
    };
    (
        status,
        ErrorResponse {
            error: message,
            errors,
        },
    )
}

impl From<SceneStoreError> for AppError {
    fn from(e: SceneStoreError) -> Self {
        AppError::Store(e)
    }
}

impl From<MultipartError> for AppError {
    fn from(e: MultipartError) -> Self {
        AppError::Rejected {
            status: e.status(),
            message: e.body_text(),
        }
    }
}

impl From<MultipartRejection> for AppError {
    fn from(e: MultipartRejection) -> Self {
        AppError::Rejected {
            status: e.status(),
            message: e.body_text(),
        }
    }
}

impl From<BytesRejection> for AppError {
    fn from(e: BytesRejection) -> Self {
        AppError::Rejected {
            status: e.status(),
            message: e.body_text(),
        }
    }
}

/// Errors that stop the server from starting
#[derive(Debug)]
pub enum ServerError {
    Store(SceneStoreError),
    Io(Box<std::io::Error>),
    Config(String),
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerError::Store(err) => write!(f, "Store error: {}", err),
            ServerError::Io(err) => write!(f, "IO error: {}", err),
            ServerError::Config(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for ServerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ServerError::Store(err) => Some(err),
            ServerError::Io(err) => Some(err.as_ref()),
            ServerError::Config(_) => None,
        }
    }
}

impl From<SceneStoreError> for ServerError {
    fn from(err: SceneStoreError) -> Self {
        ServerError::Store(err)
    }
}

impl From<std::io::Error> for ServerError {
    fn from(err: std::io::Error) -> Self {
        ServerError::Io(Box::new(err))
    }
}

impl From<tracing_subscriber::filter::ParseError> for ServerError {
    fn from(err: tracing_subscriber::filter::ParseError) -> Self {
        ServerError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;
