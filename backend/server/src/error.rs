use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::config::ConfigError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("{0}")]
    Validation(&'static str),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error(transparent)]
    Redis(#[from] redis::RedisError),

    #[error("Corrupt record {key}: {reason}")]
    Corrupt { key: String, reason: String },
}

#[derive(Error, Debug)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Store connection failed: {0}")]
    Store(#[from] StoreError),

    #[error("Server failed: {0}")]
    Io(#[from] std::io::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::MalformedPayload { .. } | AppError::Validation { .. } => {
                StatusCode::BAD_REQUEST
            }
            AppError::Store { .. } => {
                error!("Store error: {self}");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
