// JSON error responses

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::downloader::DownloadError;

pub const MAX_RETRIES_MESSAGE: &str = "Max retries reached, please try again later";

/// Error body `{"error": message}` with a status code
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    /// Map a pipeline error; `context` prefixes upstream/client failures,
    /// e.g. "Failed to fetch video".
    pub fn from_download(err: DownloadError, context: &str) -> Self {
        if err.is_rate_limited() || matches!(err, DownloadError::RetriesExhausted { .. }) {
            return Self {
                status: StatusCode::TOO_MANY_REQUESTS,
                message: MAX_RETRIES_MESSAGE.to_string(),
            };
        }

        match err {
            DownloadError::NoAudioStream => Self::bad_request(err.to_string()),
            err if err.is_client_error() => Self::bad_request(format!("{}: {}", context, err)),
            err => Self {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                message: err.to_string(),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(status = self.status.as_u16(), "{}", self.message);
        } else {
            tracing::warn!(status = self.status.as_u16(), "{}", self.message);
        }
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}
