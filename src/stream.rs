use serde::{Deserialize, Serialize};

/// A source document surfaced by the upstream retrieval pipeline.
///
/// Only `document_id` is guaranteed; the remaining fields are whatever the
/// upstream chose to attach and are carried through for display.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentRef {
    pub document_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_number: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// One decoded event from the chat stream.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    AnswerToken(String),
    ThinkingToken(String),
    RetrievedDoc(DocumentRef),
    RetrievedDocIds(Vec<String>),
    Done,
}

/// Raw JSON shape of a frame payload. Exactly one field must be present;
/// anything else is a malformed frame and gets dropped by the decoder.
#[derive(Deserialize)]
struct RawFrame {
    answer_token: Option<String>,
    thinking_token: Option<String>,
    retrieved_doc: Option<DocumentRef>,
    retrieved_doc_ids: Option<Vec<String>>,
}

impl RawFrame {
    fn into_event(self) -> Option<StreamEvent> {
        let mut fields = 0;
        fields += self.answer_token.is_some() as u8;
        fields += self.thinking_token.is_some() as u8;
        fields += self.retrieved_doc.is_some() as u8;
        fields += self.retrieved_doc_ids.is_some() as u8;
        if fields != 1 {
            return None;
        }
        if let Some(token) = self.answer_token {
            Some(StreamEvent::AnswerToken(token))
        } else if let Some(token) = self.thinking_token {
            Some(StreamEvent::ThinkingToken(token))
        } else if let Some(doc) = self.retrieved_doc {
            Some(StreamEvent::RetrievedDoc(doc))
        } else {
            self.retrieved_doc_ids.map(StreamEvent::RetrievedDocIds)
        }
    }
}

pub const DONE_SENTINEL: &str = "[DONE]";
const FRAME_PREFIX: &str = "data: ";
const FRAME_DELIMITER: &[u8] = b"\n\n";

/// Incremental frame decoder for the relay's event stream.
///
/// Feed it raw byte chunks as they arrive; it buffers until a blank-line
/// delimiter closes a frame, so the event sequence is independent of how
/// chunk boundaries fall. Frames without the `data: ` prefix are skipped,
/// and a frame with unparseable JSON is dropped on its own without
/// disturbing anything already decoded.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
    done: bool,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// True once the `[DONE]` sentinel has been observed.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Consume one chunk and return every event it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        if self.done {
            return events;
        }
        self.buffer.extend_from_slice(chunk);

        while let Some(pos) = find_delimiter(&self.buffer) {
            let frame: Vec<u8> = self.buffer.drain(..pos + FRAME_DELIMITER.len()).collect();
            let frame = String::from_utf8_lossy(&frame[..pos]);

            if let Some(event) = decode_frame(&frame) {
                let is_done = matches!(event, StreamEvent::Done);
                events.push(event);
                if is_done {
                    self.done = true;
                    break;
                }
            }
        }
        events
    }
}

fn find_delimiter(buffer: &[u8]) -> Option<usize> {
    buffer.windows(FRAME_DELIMITER.len()).position(|w| w == FRAME_DELIMITER)
}

fn decode_frame(frame: &str) -> Option<StreamEvent> {
    let payload = frame.strip_prefix(FRAME_PREFIX)?.trim();
    if payload.is_empty() {
        return None;
    }
    if payload == DONE_SENTINEL {
        return Some(StreamEvent::Done);
    }
    match serde_json::from_str::<RawFrame>(payload) {
        Ok(raw) => match raw.into_event() {
            Some(event) => Some(event),
            None => {
                tracing::warn!(payload, "dropping frame without a single event field");
                None
            }
        },
        Err(err) => {
            tracing::warn!(payload, %err, "dropping unparseable frame");
            None
        }
    }
}
