//! HTTP Error Boundary
//! Mission: Turn every failure into a stable `{statusCode, message}` body

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Errors surfaced to HTTP clients.
///
/// Engine and store errors are mapped into one of these kinds before they leave
/// their module, so raw downstream errors never reach a response body.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Caller-fixable input problem
    #[error("{0}")]
    Validation(String),

    /// Bad, expired or missing credentials or token
    #[error("{0}")]
    Auth(String),

    /// Lookup miss; folded into 400 for user lookups
    #[error("{0}")]
    NotFound(String),

    /// Duplicate resource (e.g. email already registered)
    #[error("{0}")]
    Conflict(String),

    /// Unexpected downstream failure
    #[error("{0}")]
    Server(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::NotFound(_) | ApiError::Conflict(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Auth(_) => StatusCode::UNAUTHORIZED,
            ApiError::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn server() -> Self {
        ApiError::Server("Server Error".to_string())
    }
}

/// Wire shape of every error response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub status_code: u16,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorBody {
            status_code: status.as_u16(),
            message: self.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

/// Persistence failures shared by the credential and contact stores
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record already exists: {0}")]
    Duplicate(String),

    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("storage task failed: {0}")]
    Task(String),
}

impl From<tokio::task::JoinError> for StoreError {
    fn from(e: tokio::task::JoinError) -> Self {
        StoreError::Task(e.to_string())
    }
}
