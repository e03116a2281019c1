use std::time::Instant;

use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::ChatError;
use crate::stream::{DocumentRef, FrameDecoder, StreamEvent};
use crate::transcript::{CompletedTranscript, MessageId, TranscriptBuilder};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// One outgoing question plus its retrieval options.
#[derive(Debug, Clone, Default)]
pub struct ChatPrompt {
    pub question: String,
    /// Existing conversation to append to; a fresh chat box is created
    /// when absent.
    pub chat_box_id: Option<i64>,
    pub conversation_history: Vec<ChatMessage>,
    pub hyde: bool,
    pub reranking: bool,
    pub ultrathink: bool,
    pub document_ids: Option<Vec<String>>,
}

#[derive(Serialize)]
struct ChatRequestBody<'a> {
    question: &'a str,
    #[serde(rename = "userId")]
    user_id: &'a str,
    conversation_history: &'a [ChatMessage],
    hyde: bool,
    reranking: bool,
    ultrathink: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    document_ids: Option<&'a [String]>,
}

/// Incremental display updates emitted while a message streams in.
/// Text variants carry the cumulative string so far, not the delta.
#[derive(Debug)]
pub enum StreamUpdate<'a> {
    /// Streaming has begun; the placeholder message carries this id until
    /// the save API assigns the real one.
    Started { message_id: MessageId },
    Answer(&'a str),
    Thinking(&'a str),
    Sources(Vec<DocumentRef>),
}

/// The outcome of one fully streamed and persisted chat turn.
#[derive(Debug)]
pub struct ChatTurn {
    /// Placeholder id used while streaming, now superseded.
    pub pending_id: MessageId,
    /// Server-assigned id; feedback actions address this one.
    pub message_id: MessageId,
    pub chat_box_id: i64,
    pub transcript: CompletedTranscript,
    pub response_time_ms: i64,
}

#[derive(Deserialize)]
struct IdResponse {
    id: i64,
}

/// Drives the full consumer flow against the chat service: relay request,
/// incremental decode, transcript assembly, then a single save call.
///
/// One client handles one stream at a time; `send` takes `&mut self`, so a
/// conversation view cannot start a second stream while one is in flight.
pub struct ChatClient {
    http: Client,
    base_url: String,
    token: String,
    user_id: Option<String>,
    next_pending: u64,
}

impl ChatClient {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>, user_id: Option<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into(),
            token: token.into(),
            user_id,
            next_pending: 0,
        }
    }

    /// Send a question, streaming updates through `on_update`, and persist
    /// the finished transcript. Nothing is persisted unless the stream
    /// completes with a non-empty answer and a known user identity.
    pub async fn send(
        &mut self,
        prompt: &ChatPrompt,
        mut on_update: impl FnMut(StreamUpdate<'_>),
    ) -> Result<ChatTurn, ChatError> {
        let pending_id = MessageId::Pending(self.next_pending);
        self.next_pending += 1;
        on_update(StreamUpdate::Started {
            message_id: pending_id,
        });

        let started = Instant::now();
        let body = ChatRequestBody {
            question: &prompt.question,
            user_id: self.user_id.as_deref().unwrap_or(""),
            conversation_history: &prompt.conversation_history,
            hyde: prompt.hyde,
            reranking: prompt.reranking,
            ultrathink: prompt.ultrathink,
            document_ids: prompt.document_ids.as_deref(),
        };

        let response = self
            .http
            .post(format!("{}/chat", self.base_url))
            .header(reqwest::header::AUTHORIZATION, format!("Bearer {}", self.token))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            if status == reqwest::StatusCode::UNAUTHORIZED {
                return Err(ChatError::Unauthorized);
            }
            return Err(ChatError::Upstream {
                status: status.as_u16(),
            });
        }

        let mut decoder = FrameDecoder::new();
        let mut builder = TranscriptBuilder::new();
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            for event in decoder.push(&chunk) {
                builder.apply(event.clone());
                match event {
                    StreamEvent::AnswerToken(_) => {
                        on_update(StreamUpdate::Answer(builder.answer()));
                    }
                    StreamEvent::ThinkingToken(_) => {
                        on_update(StreamUpdate::Thinking(builder.thinking()));
                    }
                    StreamEvent::RetrievedDoc(_) | StreamEvent::RetrievedDocIds(_) => {
                        on_update(StreamUpdate::Sources(builder.source_docs()));
                    }
                    StreamEvent::Done => {}
                }
            }
            if decoder.is_done() {
                break;
            }
        }

        let response_time_ms = started.elapsed().as_millis() as i64;
        let transcript = builder.finish()?;

        let user_id = self
            .user_id
            .clone()
            .ok_or(ChatError::MissingUser)?;

        let chat_box_id = match prompt.chat_box_id {
            Some(id) => id,
            None => {
                let name = title_from_question(&prompt.question);
                match self.create_chat_box(&name).await {
                    Ok(id) => id,
                    Err(message) => {
                        return Err(ChatError::SaveFailed {
                            message,
                            transcript: Box::new(transcript),
                        });
                    }
                }
            }
        };

        let message_id = match self
            .save_transcript(&prompt.question, &user_id, chat_box_id, &transcript, response_time_ms)
            .await
        {
            Ok(id) => id,
            Err(message) => {
                return Err(ChatError::SaveFailed {
                    message,
                    transcript: Box::new(transcript),
                });
            }
        };

        Ok(ChatTurn {
            pending_id,
            message_id: MessageId::Persisted(message_id),
            chat_box_id,
            transcript,
            response_time_ms,
        })
    }

    async fn create_chat_box(&self, name: &str) -> Result<i64, String> {
        let response = self
            .http
            .post(format!("{}/chatbox", self.base_url))
            .header(reqwest::header::AUTHORIZATION, format!("Bearer {}", self.token))
            .form(&[("name", name)])
            .send()
            .await
            .map_err(|e| e.to_string())?;

        if !response.status().is_success() {
            return Err(format!("chat box creation failed with status {}", response.status()));
        }
        let created: IdResponse = response.json().await.map_err(|e| e.to_string())?;
        Ok(created.id)
    }

    async fn save_transcript(
        &self,
        question: &str,
        user_id: &str,
        chat_box_id: i64,
        transcript: &CompletedTranscript,
        response_time_ms: i64,
    ) -> Result<i64, String> {
        let retrieved = serde_json::to_string(&transcript.retrieved_docs)
            .map_err(|e| e.to_string())?;

        let mut form = vec![
            ("request".to_string(), question.to_string()),
            ("userId".to_string(), user_id.to_string()),
            ("chatBoxId".to_string(), chat_box_id.to_string()),
            ("response".to_string(), transcript.answer.clone()),
            ("retrievedDocIds".to_string(), retrieved),
            ("responseTime".to_string(), response_time_ms.to_string()),
        ];
        if let Some(thinking) = &transcript.thinking {
            form.push(("thinking".to_string(), thinking.clone()));
        }

        let response = self
            .http
            .post(format!("{}/message", self.base_url))
            .form(&form)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        if !response.status().is_success() {
            let message = response
                .json::<serde_json::Value>()
                .await
                .ok()
                .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(String::from))
                .unwrap_or_else(|| "Unknown error".to_string());
            return Err(message);
        }
        let saved: IdResponse = response.json().await.map_err(|e| e.to_string())?;
        Ok(saved.id)
    }
}

/// Name a new chat box after its first question.
fn title_from_question(question: &str) -> String {
    const MAX_TITLE_CHARS: usize = 50;
    let trimmed = question.trim();
    if trimmed.chars().count() <= MAX_TITLE_CHARS {
        return trimmed.to_string();
    }
    let truncated: String = trimmed.chars().take(MAX_TITLE_CHARS).collect();
    format!("{}...", truncated.trim_end())
}
