//! HTTP-facing error type for REST handlers.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

use crate::core::error::PipelineError;

/// Result type for handlers
pub type AppResult<T> = Result<T, AppError>;

/// Errors returned by REST handlers.
///
/// Every variant renders as `{"error": "<message>", "code": "<kind>"}` with a
/// status code: 400 for caller mistakes and 500 for any downstream failure.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Pipeline(PipelineError::InvalidReference(_)) => StatusCode::BAD_REQUEST,
            AppError::Pipeline(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            AppError::BadRequest(_) => "bad_request",
            AppError::Pipeline(e) => e.kind(),
            AppError::Internal(_) => "internal_error",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = self.to_string();

        if status.is_server_error() {
            error!(code = self.code(), error = %message, "Request failed");
        } else {
            warn!(code = self.code(), error = %message, "Request rejected");
        }

        (status, Json(json!({ "error": message, "code": self.code() }))).into_response()
    }
}
