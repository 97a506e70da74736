//! Seams to LLM provider clients.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::chat::{ChatMessage, ThinkingLevel};
use crate::error::Result;
use crate::stream::{StreamEvent, StreamEventKind};

/// What the model is asked to answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GenerationPayload {
    /// Single-turn: one user message.
    UserMessage(String),
    /// Chat: the full conversation so far.
    Conversation(Vec<ChatMessage>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    pub request_id: String,
    pub model: String,
    pub api_key: String,
    pub system_prompt: String,
    pub payload: GenerationPayload,
    pub streaming: bool,
    /// Only set for models that accept it.
    pub thinking_level: Option<ThinkingLevel>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationOutput {
    pub text: String,
    pub streaming: bool,
}

/// Where a streaming provider pushes events for one request.
///
/// The receiving side is dropped once the request reaches a terminal state;
/// later events are discarded silently.
#[derive(Debug, Clone)]
pub struct StreamSink {
    request_id: String,
    tx: mpsc::UnboundedSender<StreamEvent>,
}

impl StreamSink {
    pub fn channel(request_id: impl Into<String>) -> (Self, mpsc::UnboundedReceiver<StreamEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                request_id: request_id.into(),
                tx,
            },
            rx,
        )
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn emit(&self, kind: StreamEventKind) {
        let _ = self.tx.send(StreamEvent::new(self.request_id.clone(), kind));
    }

    /// Forwards an event verbatim, whatever request id it carries.
    pub fn forward(&self, event: StreamEvent) {
        let _ = self.tx.send(event);
    }

    pub fn thinking(&self, text: impl Into<String>) {
        self.emit(StreamEventKind::Thinking(text.into()));
    }

    pub fn chunk(&self, text: impl Into<String>) {
        self.emit(StreamEventKind::Chunk(text.into()));
    }

    pub fn complete(&self) {
        self.emit(StreamEventKind::Complete);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.emit(StreamEventKind::Error(Some(message.into())));
    }
}

/// An LLM provider client.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// Runs one generation.
    ///
    /// Streaming requests push events into `sink` and return once the
    /// provider is done; non-streaming requests return the whole text.
    ///
    /// # Errors
    ///
    /// Provider and network failures; the message is shown to the user.
    async fn generate(&self, request: GenerationRequest, sink: StreamSink)
    -> Result<GenerationOutput>;
}

/// A text embedding provider.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// One vector per input text, in order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}
