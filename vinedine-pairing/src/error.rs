//! Error types for the pairing service HTTP edge

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::db::StorageError;
use crate::services::catalog_client::{CatalogError, CatalogFault};
use crate::services::generation_client::GenerationFault;
use crate::services::PipelineError;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Upstream service failed (502)
    #[error("Upstream failure: {0}")]
    BadGateway(String),

    /// Upstream service missed its deadline (504)
    #[error("Upstream timeout: {0}")]
    GatewayTimeout(String),

    /// Request abandoned during shutdown (503)
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        let message = err.to_string();
        match err {
            PipelineError::Validation(_) => ApiError::BadRequest(message),
            PipelineError::Generation(e) => match e.fault() {
                GenerationFault::DeadlineExceeded(_) => ApiError::GatewayTimeout(message),
                _ => ApiError::BadGateway(message),
            },
            PipelineError::Catalog(CatalogError::Transient(CatalogFault::DeadlineExceeded(_))) => {
                ApiError::GatewayTimeout(message)
            }
            PipelineError::Catalog(_) => ApiError::BadGateway(message),
            PipelineError::Cancelled => ApiError::Unavailable(message),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR", msg),
            ApiError::GatewayTimeout(msg) => {
                (StatusCode::GATEWAY_TIMEOUT, "UPSTREAM_TIMEOUT", msg)
            }
            ApiError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, "CANCELLED", msg),
            ApiError::Storage(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "STORAGE_ERROR",
                err.to_string(),
            ),
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
