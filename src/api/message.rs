use axum::extract::State;
use axum::routing::post;
use axum::{Form, Json, Router};
use serde::Deserialize;

use crate::db::models::NewMessage;
use crate::error::{ApiError, ChatError};
use crate::stream::DocumentRef;

use super::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/message", post(save_message).put(update_feedback))
}

#[derive(Debug, Deserialize)]
struct SaveMessageForm {
    request: Option<String>,
    #[serde(rename = "userId")]
    user_id: Option<String>,
    #[serde(rename = "chatBoxId")]
    chat_box_id: Option<String>,
    response: Option<String>,
    thinking: Option<String>,
    #[serde(rename = "retrievedDocIds")]
    retrieved_doc_ids: Option<String>,
    #[serde(rename = "responseTime")]
    response_time: Option<String>,
}

/// Persist a completed transcript. Called exactly once per successfully
/// streamed message.
async fn save_message(
    State(state): State<AppState>,
    Form(form): Form<SaveMessageForm>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let (request, user_id, chat_box_id, response) = match (
        non_empty(form.request),
        non_empty(form.user_id),
        non_empty(form.chat_box_id),
        non_empty(form.response),
    ) {
        (Some(r), Some(u), Some(c), Some(resp)) => (r, u, c, resp),
        _ => {
            return Err(ChatError::Validation("Please fill in all fields".to_string()).into());
        }
    };

    let chat_box_id: i64 = chat_box_id
        .parse()
        .map_err(|_| ChatError::Validation("Invalid chatBoxId".to_string()))?;

    // The docs field arrives JSON-encoded inside the form; reject garbage
    // up front instead of storing an unreadable blob.
    let retrieved_docs = match form.retrieved_doc_ids.as_deref() {
        None | Some("") => None,
        Some(raw) => {
            let docs: Vec<DocumentRef> = serde_json::from_str(raw).map_err(|_| {
                ChatError::Validation("Invalid retrievedDocIds payload".to_string())
            })?;
            if docs.is_empty() {
                None
            } else {
                Some(raw.to_string())
            }
        }
    };

    let response_time_ms = match form.response_time.as_deref().filter(|v| !v.is_empty()) {
        None => 0,
        Some(raw) => raw
            .parse()
            .map_err(|_| ChatError::Validation("Invalid responseTime value".to_string()))?,
    };

    let saved = state.db.create_message(&NewMessage {
        chat_box_id,
        user_id,
        request,
        response,
        thinking: non_empty(form.thinking),
        retrieved_docs,
        response_time_ms,
    })?;

    tracing::info!(message_id = saved.id, chat_box_id, "message saved");

    Ok(Json(serde_json::json!({
        "message": "Message has been successfully saved",
        "id": saved.id,
    })))
}

#[derive(Debug, Deserialize)]
struct FeedbackForm {
    id: Option<String>,
    liked: Option<String>,
    disliked: Option<String>,
    rating: Option<String>,
}

/// Update like/dislike/rating on a saved message. Only persisted ids reach
/// this point; placeholder messages are rejected client-side by type.
async fn update_feedback(
    State(state): State<AppState>,
    Form(form): Form<FeedbackForm>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let id = form
        .id
        .as_deref()
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ChatError::Validation("Message ID is required".to_string()))?;

    let id: i64 = id
        .parse()
        .ok()
        .filter(|id| *id > 0)
        .ok_or_else(|| ChatError::Validation("Invalid message ID format".to_string()))?;

    let liked = form.liked.as_deref().map(|v| v == "true");
    let disliked = form.disliked.as_deref().map(|v| v == "true");
    let rating = form.rating.as_deref().and_then(|v| v.parse().ok());

    let updated = state.db.update_feedback(id, liked, disliked, rating)?;
    if !updated {
        return Err(ChatError::NotFound("Message not found".to_string()).into());
    }

    Ok(Json(serde_json::json!({ "message": "Updated successfully" })))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
