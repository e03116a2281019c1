use axum::body::Body;
use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::Value;

use crate::auth::AuthUser;
use crate::error::{ApiError, ChatError};

use super::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/chat", post(relay_chat))
}

/// Forward a chat request to the upstream LLM service and stream its
/// response body back without buffering.
///
/// The payload is passed through as-is except for `user_id`, which is always
/// overridden with the verified session identity; a client-supplied user id
/// is never trusted. Framing and parsing of the stream are entirely the
/// consumer's job.
async fn relay_chat(
    State(state): State<AppState>,
    user: AuthUser,
    Json(mut payload): Json<Value>,
) -> Result<Response, ApiError> {
    let body = payload
        .as_object_mut()
        .ok_or_else(|| ChatError::Validation("request body must be a JSON object".to_string()))?;
    body.insert("user_id".to_string(), Value::String(user.user_id.clone()));

    tracing::info!(user_id = %user.user_id, llm_url = %state.llm_url, "proxying chat request to LLM server");

    let upstream = state
        .http
        .post(format!("{}/llm/chat_with_llm", state.llm_url))
        .header(header::AUTHORIZATION, format!("Bearer {}", user.token))
        .json(&payload)
        .send()
        .await
        .map_err(ChatError::Http)?;

    let status = upstream.status();
    if !status.is_success() {
        tracing::error!(status = %status, "LLM server error");
        return Err(ChatError::Upstream {
            status: status.as_u16(),
        }
        .into());
    }

    let content_type = upstream
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("text/event-stream")
        .to_string();

    // Hand the upstream body straight through; backpressure comes from the
    // downstream client consuming the stream.
    let response = (
        [
            (header::CONTENT_TYPE, content_type),
            (header::CACHE_CONTROL, "no-cache".to_string()),
            (header::CONNECTION, "keep-alive".to_string()),
        ],
        Body::from_stream(upstream.bytes_stream()),
    );
    Ok(response.into_response())
}
