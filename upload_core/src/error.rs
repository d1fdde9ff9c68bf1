//! Application error types and handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::files::{ErrorKind, UploadError};

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Upload(err) => match err.kind() {
                ErrorKind::NameCollision => StatusCode::CONFLICT,
                kind if kind.is_rejection() => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            AppError::IoError(_) | AppError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let (error_message, kind) = match &self {
            AppError::BadRequest(msg) => (msg.clone(), None),
            AppError::Upload(err) if status.is_server_error() => {
                tracing::error!("Upload failed: {:?}", err);
                ("Failed to store uploaded file".to_string(), Some(err.kind()))
            }
            AppError::Upload(err) => (err.to_string(), Some(err.kind())),
            AppError::IoError(err) => {
                tracing::error!("IO error: {:?}", err);
                ("Internal server error".to_string(), None)
            }
            AppError::Other(err) => {
                tracing::error!("Unexpected error: {:?}", err);
                ("Internal server error".to_string(), None)
            }
        };

        let body = Json(json!({
            "error": error_message,
            "kind": kind,
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}
