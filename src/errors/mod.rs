// Error handling module
// Custom error types shared across the narration pipeline

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

/// Application error type
#[derive(Debug, Error)]
pub enum AppError {
    /// The request itself is unusable (empty script, no scenes, no narratable text).
    /// Processing stops before any artifact is persisted.
    #[error("Invalid request: {0}")]
    Validation(String),

    /// An external service rejected or failed a call that the pipeline cannot
    /// recover from (synthesis for a unit, required upstream payload).
    #[error("Upstream service error (status {status}): {detail}")]
    Upstream { status: u16, detail: String },

    /// ffmpeg (or another local tool) exited non-zero or could not be spawned.
    #[error("Audio processing failed: {0}")]
    AudioProcessing(String),

    /// A bounded external wait expired. Kept separate from generic upstream
    /// failures so callers can tell "still running remotely" from "broken".
    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AppError::Timeout(err.to_string())
        } else {
            AppError::Upstream {
                status: err.status().map(|s| s.as_u16()).unwrap_or(502),
                detail: err.to_string(),
            }
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<String> for AppError {
    fn from(err: String) -> Self {
        AppError::Unknown(err)
    }
}

impl From<&str> for AppError {
    fn from(err: &str) -> Self {
        AppError::Unknown(err.to_string())
    }
}

#[derive(Serialize)]
struct ErrorBody {
    detail: String,
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Upstream { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            AppError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            AppError::AudioProcessing(_)
            | AppError::Io(_)
            | AppError::Serialization(_)
            | AppError::Unknown(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorBody {
            detail: self.to_string(),
        };
        (status, axum::Json(body)).into_response()
    }
}

/// Result type alias for application
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_maps_to_422() {
        let err = AppError::Validation("no scenes".into());
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn timeout_maps_to_504() {
        let err = AppError::Timeout("ffmpeg".into());
        assert_eq!(err.status_code(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[test]
    fn upstream_keeps_status() {
        let err = AppError::Upstream {
            status: 401,
            detail: "bad key".into(),
        };
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
    }
}
