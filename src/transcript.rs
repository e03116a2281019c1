use crate::error::ChatError;
use crate::stream::{DocumentRef, StreamEvent};

/// Identifier of a chat message as the UI sees it.
///
/// A message starts life as `Pending` (a client-local counter) while its
/// answer is still streaming, and becomes `Persisted` once the save API
/// returns the real row id. Feedback updates only ever address `Persisted`
/// ids, which the type makes impossible to get wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageId {
    Pending(u64),
    Persisted(i64),
}

impl MessageId {
    /// The database id, if this message has been saved.
    pub fn persisted(&self) -> Option<i64> {
        match self {
            MessageId::Persisted(id) => Some(*id),
            MessageId::Pending(_) => None,
        }
    }
}

/// Keep the first occurrence of each `document_id`, preserving order.
///
/// Raw stored transcripts may contain the same document several times (one
/// entry per retrieved chunk); this is applied both before persistence and
/// again when reading a transcript back out.
pub fn dedup_documents(docs: Vec<DocumentRef>) -> Vec<DocumentRef> {
    let mut seen = std::collections::HashSet::new();
    docs.into_iter()
        .filter(|doc| seen.insert(doc.document_id.clone()))
        .collect()
}

/// A fully assembled request/response pair, ready to persist.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedTranscript {
    pub answer: String,
    pub thinking: Option<String>,
    pub retrieved_docs: Vec<DocumentRef>,
    /// Whether the `[DONE]` sentinel was actually observed. A reader EOF
    /// without the sentinel still completes the stream, but callers can
    /// tell a truncated stream apart through this flag.
    pub clean_end: bool,
}

/// Folds stream events into per-message accumulators.
///
/// Events are applied strictly in arrival order; answer and thinking text
/// grow independently and retrieved docs may interleave with either without
/// disturbing text order.
#[derive(Debug, Default)]
pub struct TranscriptBuilder {
    answer: String,
    thinking: String,
    retrieved_docs: Vec<DocumentRef>,
    saw_done: bool,
}

impl TranscriptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, event: StreamEvent) {
        match event {
            StreamEvent::AnswerToken(token) => self.answer.push_str(&token),
            StreamEvent::ThinkingToken(token) => self.thinking.push_str(&token),
            StreamEvent::RetrievedDoc(doc) => self.retrieved_docs.push(doc),
            StreamEvent::RetrievedDocIds(ids) => {
                for document_id in ids {
                    self.retrieved_docs.push(DocumentRef {
                        document_id,
                        document_name: None,
                        content: None,
                        page_number: None,
                        source: None,
                    });
                }
            }
            StreamEvent::Done => self.saw_done = true,
        }
    }

    /// Cumulative answer text so far, for live display.
    pub fn answer(&self) -> &str {
        &self.answer
    }

    /// Cumulative thinking text so far.
    pub fn thinking(&self) -> &str {
        &self.thinking
    }

    /// Retrieved documents so far, deduplicated for display.
    pub fn source_docs(&self) -> Vec<DocumentRef> {
        dedup_documents(self.retrieved_docs.clone())
    }

    /// Finish the stream. Fails with `EmptyAnswer` when no answer text was
    /// accumulated; an empty answer is never saved.
    pub fn finish(self) -> Result<CompletedTranscript, ChatError> {
        if self.answer.trim().is_empty() {
            return Err(ChatError::EmptyAnswer);
        }
        Ok(CompletedTranscript {
            answer: self.answer,
            thinking: if self.thinking.is_empty() {
                None
            } else {
                Some(self.thinking)
            },
            retrieved_docs: dedup_documents(self.retrieved_docs),
            clean_end: self.saw_done,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: &str, name: &str) -> DocumentRef {
        DocumentRef {
            document_id: id.to_string(),
            document_name: Some(name.to_string()),
            content: None,
            page_number: None,
            source: None,
        }
    }

    #[test]
    fn answer_tokens_concatenate_in_order() {
        let mut builder = TranscriptBuilder::new();
        for token in ["A", "B", "C"] {
            builder.apply(StreamEvent::AnswerToken(token.to_string()));
        }
        assert_eq!(builder.answer(), "ABC");
        let transcript = builder.finish().expect("non-empty answer");
        assert_eq!(transcript.answer, "ABC");
    }

    #[test]
    fn thinking_accumulates_independently_of_answer() {
        let mut builder = TranscriptBuilder::new();
        builder.apply(StreamEvent::AnswerToken("ans".to_string()));
        builder.apply(StreamEvent::ThinkingToken("think ".to_string()));
        builder.apply(StreamEvent::AnswerToken("wer".to_string()));
        builder.apply(StreamEvent::ThinkingToken("more".to_string()));
        assert_eq!(builder.answer(), "answer");
        assert_eq!(builder.thinking(), "think more");
    }

    #[test]
    fn retrieved_docs_interleave_without_disturbing_text() {
        let mut builder = TranscriptBuilder::new();
        builder.apply(StreamEvent::AnswerToken("A".to_string()));
        builder.apply(StreamEvent::RetrievedDoc(doc("1", "a.pdf")));
        builder.apply(StreamEvent::AnswerToken("B".to_string()));
        let transcript = builder.finish().unwrap();
        assert_eq!(transcript.answer, "AB");
        assert_eq!(transcript.retrieved_docs, vec![doc("1", "a.pdf")]);
    }

    #[test]
    fn empty_answer_is_an_error() {
        let builder = TranscriptBuilder::new();
        assert!(matches!(builder.finish(), Err(ChatError::EmptyAnswer)));
    }

    #[test]
    fn whitespace_only_answer_is_an_error() {
        let mut builder = TranscriptBuilder::new();
        builder.apply(StreamEvent::AnswerToken("   \n".to_string()));
        assert!(matches!(builder.finish(), Err(ChatError::EmptyAnswer)));
    }

    #[test]
    fn thinking_alone_does_not_make_an_answer() {
        let mut builder = TranscriptBuilder::new();
        builder.apply(StreamEvent::ThinkingToken("reasoning".to_string()));
        assert!(matches!(builder.finish(), Err(ChatError::EmptyAnswer)));
    }

    #[test]
    fn finish_records_clean_end() {
        let mut builder = TranscriptBuilder::new();
        builder.apply(StreamEvent::AnswerToken("hi".to_string()));
        builder.apply(StreamEvent::Done);
        assert!(builder.finish().unwrap().clean_end);

        let mut truncated = TranscriptBuilder::new();
        truncated.apply(StreamEvent::AnswerToken("hi".to_string()));
        assert!(!truncated.finish().unwrap().clean_end);
    }

    #[test]
    fn dedup_keeps_first_occurrence_in_order() {
        let docs = vec![
            doc("1", "first"),
            doc("2", "second"),
            doc("1", "duplicate"),
            doc("3", "third"),
            doc("2", "duplicate"),
        ];
        let unique = dedup_documents(docs);
        assert_eq!(unique, vec![doc("1", "first"), doc("2", "second"), doc("3", "third")]);
    }

    #[test]
    fn dedup_is_idempotent() {
        let docs = vec![doc("1", "a"), doc("2", "b"), doc("1", "dup")];
        let once = dedup_documents(docs);
        let twice = dedup_documents(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn finish_dedups_retrieved_docs() {
        let mut builder = TranscriptBuilder::new();
        builder.apply(StreamEvent::AnswerToken("x".to_string()));
        builder.apply(StreamEvent::RetrievedDoc(doc("42", "doc.pdf")));
        builder.apply(StreamEvent::RetrievedDoc(doc("42", "other chunk")));
        let transcript = builder.finish().unwrap();
        assert_eq!(transcript.retrieved_docs, vec![doc("42", "doc.pdf")]);
    }

    #[test]
    fn pending_id_has_no_persisted_value() {
        assert_eq!(MessageId::Pending(3).persisted(), None);
        assert_eq!(MessageId::Persisted(17).persisted(), Some(17));
    }
}
