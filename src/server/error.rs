// SPDX-License-Identifier: GPL-3.0-only

use crate::errors::DetectionError;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use std::fmt;

/// Error returned by HTTP handlers, rendered as `{"error": "..."}`
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    /// Request is valid but the camera is not in a usable state
    Unavailable(String),
    Internal(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            ApiError::Unavailable(msg) => write!(f, "Unavailable: {}", msg),
            ApiError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<DetectionError> for ApiError {
    fn from(err: DetectionError) -> Self {
        match err {
            DetectionError::InvalidThreshold(_) => ApiError::BadRequest(err.to_string()),
            DetectionError::CameraNotRunning | DetectionError::NoFrameAvailable => {
                ApiError::Unavailable(err.to_string())
            }
            DetectionError::DetectorFailed(_) | DetectionError::TaskFailed(_) => {
                ApiError::Internal(err.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            ApiError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detection_error_status() {
        let status = |e: DetectionError| ApiError::from(e).into_response().status();
        assert_eq!(status(DetectionError::InvalidThreshold(1.5)), StatusCode::BAD_REQUEST);
        assert_eq!(status(DetectionError::NoFrameAvailable), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            status(DetectionError::DetectorFailed("model".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
