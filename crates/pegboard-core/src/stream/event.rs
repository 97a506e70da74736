use serde::{Deserialize, Serialize};

/// What a provider reported for a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum StreamEventKind {
    /// Reasoning text emitted before the answer.
    Thinking(String),
    /// A piece of the answer.
    Chunk(String),
    Complete,
    Error(Option<String>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamEvent {
    pub request_id: String,
    #[serde(flatten)]
    pub kind: StreamEventKind,
}

impl StreamEvent {
    pub fn new(request_id: impl Into<String>, kind: StreamEventKind) -> Self {
        Self {
            request_id: request_id.into(),
            kind,
        }
    }

    pub fn thinking(request_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(request_id, StreamEventKind::Thinking(text.into()))
    }

    pub fn chunk(request_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(request_id, StreamEventKind::Chunk(text.into()))
    }

    pub fn complete(request_id: impl Into<String>) -> Self {
        Self::new(request_id, StreamEventKind::Complete)
    }

    pub fn error(request_id: impl Into<String>, message: Option<String>) -> Self {
        Self::new(request_id, StreamEventKind::Error(message))
    }
}
