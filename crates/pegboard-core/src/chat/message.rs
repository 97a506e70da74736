//! Conversation message types.

use serde::{Deserialize, Serialize};

/// Represents the role of a message in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// Message typed by the user.
    User,
    /// Message produced by the model.
    Assistant,
}

/// A single message in a chat-mode conversation.
///
/// A trailing assistant message with empty content is a placeholder that a
/// streaming response is written into; see [`visible_messages`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
    /// Epoch milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking_content: Option<String>,
    /// Whole seconds spent in the thinking phase.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking_duration: Option<u64>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
            timestamp: Some(super::now_millis()),
            thinking_content: None,
            thinking_duration: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
            timestamp: Some(super::now_millis()),
            thinking_content: None,
            thinking_duration: None,
        }
    }

    /// Empty assistant slot appended before a streaming response begins.
    pub fn placeholder() -> Self {
        Self::assistant("")
    }

    /// Attaches the thinking transcript and duration of the response.
    pub fn with_thinking(mut self, content: impl Into<String>, duration_secs: u64) -> Self {
        let content = content.into();
        self.thinking_content = (!content.is_empty()).then_some(content);
        self.thinking_duration = Some(duration_secs);
        self
    }

    pub fn is_placeholder(&self) -> bool {
        self.role == MessageRole::Assistant && self.content.is_empty()
    }
}

/// Messages as they should be displayed: a trailing placeholder is hidden
/// until content has been streamed into it.
pub fn visible_messages(messages: &[ChatMessage]) -> &[ChatMessage] {
    match messages.last() {
        Some(last) if last.is_placeholder() => &messages[..messages.len() - 1],
        _ => messages,
    }
}

/// Writes `content` into the trailing assistant message, appending one if the
/// conversation does not end with an assistant message.
pub fn upsert_trailing_assistant(messages: &mut Vec<ChatMessage>, content: &str) {
    match messages.last_mut() {
        Some(last) if last.role == MessageRole::Assistant => {
            last.content = content.to_string();
        }
        _ => messages.push(ChatMessage::assistant(content)),
    }
}
