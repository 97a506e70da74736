use serde::{Deserialize, Serialize};

use crate::chat::{ChatMessage, ChatboxStatePatch};
use crate::provider::ApiKeys;

/// Which replica of a chatbox a component belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowSide {
    /// Pane rendered on the canvas in the main window.
    Hosted,
    /// Detached always-on-top window.
    Floating,
}

impl WindowSide {
    pub fn is_floating(self) -> bool {
        self == Self::Floating
    }
}

/// A state patch travelling between the two replicas of a chatbox.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncMessage {
    pub chatbox_id: String,
    pub state: ChatboxStatePatch,
    /// True when sent by the floating replica.
    pub from_widget: bool,
}

/// Data a floating window needs to render its chatbox.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowData {
    pub name: String,
    pub model: String,
    pub system_prompt: String,
    pub tint_color: String,
    #[serde(default)]
    pub api_keys: ApiKeys,
    #[serde(default)]
    pub current_response: Option<String>,
    #[serde(default)]
    pub chat_messages: Vec<ChatMessage>,
    #[serde(default)]
    pub is_chat_mode: bool,
}

/// Screen rectangle of a floating window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowBounds {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowBounds {
    fn default() -> Self {
        Self {
            x: 100,
            y: 100,
            width: 400,
            height: 600,
        }
    }
}

/// A floating window as persisted between launches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetState {
    pub chatbox_id: String,
    pub bounds: WindowBounds,
    pub window_data: WindowData,
}
