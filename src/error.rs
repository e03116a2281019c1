use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::transcript::CompletedTranscript;

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("LLM server error: status {status}")]
    Upstream { status: u16 },
    #[error("configuration error: {0}")]
    Config(String),
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("unauthorized")]
    Unauthorized,
    #[error("validation error: {0}")]
    Validation(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("stream produced no answer text")]
    EmptyAnswer,
    #[error("user identity not available, transcript not saved")]
    MissingUser,
    #[error("failed to save transcript: {message}")]
    SaveFailed {
        message: String,
        /// The assembled transcript survives a failed save so the caller
        /// keeps the visible answer.
        transcript: Box<CompletedTranscript>,
    },
}

/// Axum-facing wrapper so handlers can `?` a `ChatError` straight into a
/// JSON error response.
pub struct ApiError(pub ChatError);

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        Self(err)
    }
}

impl From<rusqlite::Error> for ApiError {
    fn from(err: rusqlite::Error) -> Self {
        Self(ChatError::Database(err))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            ChatError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            ChatError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ChatError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            ChatError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            ChatError::Upstream { status } => (
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY),
                "Error from LLM server".to_string(),
            ),
            ChatError::Http(_) => (
                StatusCode::BAD_GATEWAY,
                "Cannot reach LLM server".to_string(),
            ),
            other => (StatusCode::INTERNAL_SERVER_ERROR, other.to_string()),
        };

        let body = serde_json::json!({ "message": message });
        (status, Json(body)).into_response()
    }
}
