//! API error handling
//!
//! The upload and chat routes answer errors with different JSON envelopes;
//! clients key off them, so they are kept exactly.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Envelope of every upload response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UploadResponse {
    /// `success` or `error`
    #[schema(example = "success")]
    pub status: String,
    /// Human-readable outcome
    #[schema(example = "File uploaded and processed successfully.")]
    pub message: String,
}

impl UploadResponse {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: "success".to_string(),
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            message: message.into(),
        }
    }
}

/// Error envelope of the chat and listing routes
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    #[schema(example = "No query provided")]
    pub error: String,
}

/// Application error type
#[derive(Debug)]
pub enum AppError {
    /// Upload without a usable `file` part, or not a POST
    InvalidUpload,
    /// Saving or ingesting an upload failed
    UploadFailed(String),
    /// Chat body had no usable `query`
    NoQuery,
    /// Chat called with a method other than POST
    InvalidMethod,
    /// Chat body could not be read, e.g. it exceeds the body limit
    BodyRejected { status: StatusCode, message: String },
    /// Anything else that went wrong while serving a request
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::InvalidUpload => (
                StatusCode::BAD_REQUEST,
                Json(UploadResponse::error("Invalid request")),
            )
                .into_response(),
            AppError::UploadFailed(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(UploadResponse::error(msg)),
            )
                .into_response(),
            AppError::NoQuery => error_json(StatusCode::BAD_REQUEST, "No query provided"),
            AppError::InvalidMethod => error_json(StatusCode::METHOD_NOT_ALLOWED, "Invalid method"),
            AppError::BodyRejected { status, message } => error_json(status, message),
            AppError::Internal(msg) => error_json(StatusCode::INTERNAL_SERVER_ERROR, msg),
        }
    }
}

fn error_json(status: StatusCode, error: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
        .into_response()
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<lumina_core::LuminaError> for AppError {
    fn from(err: lumina_core::LuminaError) -> Self {
        AppError::Internal(err.to_string())
    }
}
