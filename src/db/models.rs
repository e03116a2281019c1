use serde::{Deserialize, Serialize};

/// One conversation, the unit the sidebar lists.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ChatBox {
    pub id: i64,
    pub name: String,
    pub user_id: String,
    pub created_at: String,
    pub updated_at: String,
}

/// One persisted request/response pair plus feedback metadata.
///
/// `retrieved_docs` holds the raw JSON array as captured from the stream;
/// it may contain duplicates, which readers filter out on the way back up.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Message {
    pub id: i64,
    pub chat_box_id: i64,
    pub user_id: String,
    pub request: String,
    pub response: String,
    pub thinking: Option<String>,
    pub retrieved_docs: Option<String>,
    pub response_time_ms: i64,
    pub liked: Option<bool>,
    pub disliked: Option<bool>,
    pub rating: Option<i64>,
    pub created_at: String,
}

/// Fields needed to insert a message; the id and timestamp are assigned by
/// the store.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub chat_box_id: i64,
    pub user_id: String,
    pub request: String,
    pub response: String,
    pub thinking: Option<String>,
    pub retrieved_docs: Option<String>,
    pub response_time_ms: i64,
}
