use std::collections::BTreeMap;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use chrono::{Datelike, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::AuthUser;
use crate::db::models::{ChatBox, Message};
use crate::error::{ApiError, ChatError};
use crate::stream::DocumentRef;
use crate::transcript::dedup_documents;

use super::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/chatbox", post(create_chat_box).get(list_chat_boxes))
        .route(
            "/chatbox/{id}",
            get(get_chat_box_messages)
                .put(rename_chat_box)
                .delete(delete_chat_box),
        )
}

#[derive(Debug, Deserialize)]
struct CreateChatBoxForm {
    name: Option<String>,
}

async fn create_chat_box(
    State(state): State<AppState>,
    user: AuthUser,
    Form(form): Form<CreateChatBoxForm>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let name = form
        .name
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| "New Chat".to_string());

    let chat_box = state.db.create_chat_box(&user.user_id, &name)?;
    tracing::info!(chat_box_id = chat_box.id, user_id = %user.user_id, "chat box created");

    Ok(Json(serde_json::json!({
        "message": "Chat box created successfully",
        "id": chat_box.id,
    })))
}

#[derive(Debug, Serialize, PartialEq)]
pub struct ChatBoxSummary {
    pub id: i64,
    pub name: String,
    pub updated_at: String,
}

async fn list_chat_boxes(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<serde_json::Value>, ApiError> {
    let boxes = state.db.list_chat_boxes(&user.user_id)?;
    let grouped = group_by_recency(boxes, Utc::now().naive_utc());

    Ok(Json(serde_json::json!({
        "message": "Record fetched successfully",
        "data": grouped,
    })))
}

/// Bucket chat boxes for the sidebar: Today, Yesterday, Last 7 Days,
/// Last 30 Days, then month name within the current year, then the year.
pub fn group_by_recency(
    boxes: Vec<ChatBox>,
    now: NaiveDateTime,
) -> BTreeMap<String, Vec<ChatBoxSummary>> {
    const MONTHS: [&str; 12] = [
        "January",
        "February",
        "March",
        "April",
        "May",
        "June",
        "July",
        "August",
        "September",
        "October",
        "November",
        "December",
    ];

    let mut grouped: BTreeMap<String, Vec<ChatBoxSummary>> = BTreeMap::new();
    for chat_box in boxes {
        let updated = NaiveDateTime::parse_from_str(&chat_box.updated_at, "%Y-%m-%d %H:%M:%S")
            .unwrap_or(now);
        let age_days = (now - updated).num_seconds() as f64 / 86_400.0;

        let label = if age_days <= 1.0 {
            "Today".to_string()
        } else if age_days <= 2.0 {
            "Yesterday".to_string()
        } else if age_days <= 7.0 {
            "Last 7 Days".to_string()
        } else if age_days <= 30.0 {
            "Last 30 Days".to_string()
        } else if updated.year() == now.year() {
            MONTHS[updated.month0() as usize].to_string()
        } else {
            updated.year().to_string()
        };

        grouped.entry(label).or_default().push(ChatBoxSummary {
            id: chat_box.id,
            name: chat_box.name,
            updated_at: chat_box.updated_at,
        });
    }
    grouped
}

/// A stored message with its retrieved docs deduplicated for display.
#[derive(Debug, Serialize)]
struct MessageWithSources {
    #[serde(flatten)]
    message: Message,
    #[serde(rename = "sourceDocs")]
    source_docs: Vec<DocumentRef>,
}

async fn get_chat_box_messages(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    owned_chat_box(&state, &user, id)?;

    let messages = state.db.get_messages(id)?;
    let data: Vec<MessageWithSources> = messages
        .into_iter()
        .map(|message| {
            // Raw stored docs may repeat a document once per chunk.
            let source_docs = message
                .retrieved_docs
                .as_deref()
                .and_then(|raw| serde_json::from_str::<Vec<DocumentRef>>(raw).ok())
                .map(dedup_documents)
                .unwrap_or_default();
            MessageWithSources {
                message,
                source_docs,
            }
        })
        .collect();

    Ok(Json(serde_json::json!({
        "message": "Messages fetched successfully",
        "data": data,
    })))
}

/// Load an owned chat box or fail with 404/403.
fn owned_chat_box(state: &AppState, user: &AuthUser, id: i64) -> Result<ChatBox, ApiError> {
    let chat_box = state
        .db
        .get_chat_box(id)?
        .ok_or_else(|| ChatError::NotFound("Chat box not found".to_string()))?;
    if chat_box.user_id != user.user_id {
        return Err(ChatError::Forbidden("You don't own this chatbox".to_string()).into());
    }
    Ok(chat_box)
}

#[derive(Debug, Deserialize)]
struct RenameChatBoxForm {
    name: Option<String>,
}

async fn rename_chat_box(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
    Form(form): Form<RenameChatBoxForm>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let name = form
        .name
        .filter(|n| !n.trim().is_empty())
        .ok_or_else(|| ChatError::Validation("Name is required".to_string()))?;

    owned_chat_box(&state, &user, id)?;
    state.db.rename_chat_box(id, name.trim())?;

    Ok(Json(serde_json::json!({ "message": "Chat box renamed successfully" })))
}

async fn delete_chat_box(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    owned_chat_box(&state, &user, id)?;
    state.db.delete_chat_box(id)?;
    tracing::info!(chat_box_id = id, user_id = %user.user_id, "chat box deleted");

    Ok(Json(serde_json::json!({ "message": "Chat box deleted successfully" })))
}
