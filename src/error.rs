use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// Everything the upload pipeline can surface to a caller collapses into one
/// of these two kinds. Validation failures are rejected before any call to
/// the vision service; analysis failures carry the underlying message when
/// one is available.
#[derive(Debug, Error)]
pub enum AppError {
    /// The request shape violates an intake constraint.
    #[error("{0}")]
    Validation(String),

    /// Something went wrong talking to the vision service.
    #[error("{0}")]
    Analysis(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation(message.into())
    }

    pub fn analysis(message: impl Into<String>) -> Self {
        AppError::Analysis(message.into())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::Analysis(err.to_string())
    }
}

impl From<axum::extract::multipart::MultipartError> for AppError {
    fn from(err: axum::extract::multipart::MultipartError) -> Self {
        AppError::Validation(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Analysis(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::Validation(_) => {
                log::debug!("Rejected upload: {self}");
                StatusCode::BAD_REQUEST
            }
            AppError::Analysis(_) => {
                log::error!("Analysis failed: {self}");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
