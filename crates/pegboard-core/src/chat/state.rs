//! Chatbox UI state shared by the hosted pane and its floating window.

use serde::{Deserialize, Deserializer, Serialize};
use strum::{Display, EnumString};

use super::{ChatMessage, ChatSession};

/// Tab shown in a chatbox.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ActiveTab {
    #[default]
    Main,
    History,
    Settings,
    Resource,
}

/// Reasoning effort forwarded to models that support it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ThinkingLevel {
    Low,
    #[default]
    High,
}

/// The synchronized state of one chatbox replica.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatboxState {
    pub active_tab: ActiveTab,
    pub input: String,
    pub chat_input: String,
    pub is_chat_mode: bool,
    pub chat_messages: Vec<ChatMessage>,
    pub current_session: Option<ChatSession>,
    pub system_prompt: String,
    pub model: String,
    pub tint_color: String,
    /// History entry the chat conversation is mirrored into.
    pub active_session_id: Option<String>,
    pub is_loading: bool,
    pub is_thinking: bool,
    /// Whole seconds.
    pub thinking_duration: u64,
    pub thinking_content: String,
    pub show_current_response: bool,
    pub thinking_level: ThinkingLevel,
}

impl ChatboxState {
    pub fn new(
        system_prompt: impl Into<String>,
        model: impl Into<String>,
        tint_color: impl Into<String>,
    ) -> Self {
        Self {
            active_tab: ActiveTab::Main,
            input: String::new(),
            chat_input: String::new(),
            is_chat_mode: false,
            chat_messages: Vec::new(),
            current_session: None,
            system_prompt: system_prompt.into(),
            model: model.into(),
            tint_color: tint_color.into(),
            active_session_id: None,
            is_loading: false,
            is_thinking: false,
            thinking_duration: 0,
            thinking_content: String::new(),
            show_current_response: true,
            thinking_level: ThinkingLevel::High,
        }
    }

    /// The single-turn response currently on display, if any.
    pub fn current_response(&self) -> Option<&str> {
        self.current_session
            .as_ref()
            .map(|s| s.assistant_response.as_str())
    }

    /// Assigns every field present in `patch`; absent fields are untouched,
    /// so applying the same patch twice yields the same state.
    pub fn apply(&mut self, patch: &ChatboxStatePatch) -> PatchEffects {
        let mut effects = PatchEffects::default();

        if let Some(tab) = patch.active_tab {
            self.active_tab = tab;
        }
        if let Some(input) = &patch.input {
            self.input = input.clone();
        }
        if let Some(chat_input) = &patch.chat_input {
            self.chat_input = chat_input.clone();
        }
        if let Some(is_chat_mode) = patch.is_chat_mode {
            self.is_chat_mode = is_chat_mode;
        }
        if let Some(messages) = &patch.chat_messages {
            self.chat_messages = messages.clone();
        }
        if let Some(session) = &patch.current_session {
            self.current_session = session.clone();
        }
        if let Some(prompt) = &patch.system_prompt {
            self.system_prompt = prompt.clone();
        }
        if let Some(model) = &patch.model {
            self.model = model.clone();
        }
        if let Some(tint) = &patch.tint_color {
            self.tint_color = tint.clone();
            effects.tint_color = Some(tint.clone());
        }
        if let Some(active) = &patch.active_session_id {
            self.active_session_id = active.clone();
        }
        if let Some(loading) = patch.is_loading {
            self.is_loading = loading;
        }
        if let Some(thinking) = patch.is_thinking {
            self.is_thinking = thinking;
        }
        if let Some(duration) = patch.thinking_duration {
            self.thinking_duration = duration;
        }
        if let Some(content) = &patch.thinking_content {
            self.thinking_content = content.clone();
        }
        if let Some(show) = patch.show_current_response {
            self.show_current_response = show;
        }
        if let Some(level) = patch.thinking_level {
            self.thinking_level = level;
        }

        effects
    }
}

/// Side effects a patch has beyond the chatbox itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchEffects {
    /// New tint that must also be written to the pane record on the canvas.
    pub tint_color: Option<String>,
}

/// A partial [`ChatboxState`]. Absent keys are omitted on the wire.
///
/// Nullable fields use `Option<Option<T>>`: `None` means "not in this
/// patch", `Some(None)` means "explicitly cleared".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatboxStatePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_tab: Option<ActiveTab>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_input: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_chat_mode: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_messages: Option<Vec<ChatMessage>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "double_option"
    )]
    pub current_session: Option<Option<ChatSession>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tint_color: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "double_option"
    )]
    pub active_session_id: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_loading: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_thinking: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking_duration: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking_content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_current_response: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking_level: Option<ThinkingLevel>,
}

impl ChatboxStatePatch {
    /// A patch carrying every field of `state`.
    pub fn full(state: &ChatboxState) -> Self {
        Self {
            active_tab: Some(state.active_tab),
            input: Some(state.input.clone()),
            chat_input: Some(state.chat_input.clone()),
            is_chat_mode: Some(state.is_chat_mode),
            chat_messages: Some(state.chat_messages.clone()),
            current_session: Some(state.current_session.clone()),
            system_prompt: Some(state.system_prompt.clone()),
            model: Some(state.model.clone()),
            tint_color: Some(state.tint_color.clone()),
            active_session_id: Some(state.active_session_id.clone()),
            is_loading: Some(state.is_loading),
            is_thinking: Some(state.is_thinking),
            thinking_duration: Some(state.thinking_duration),
            thinking_content: Some(state.thinking_content.clone()),
            show_current_response: Some(state.show_current_response),
            thinking_level: Some(state.thinking_level),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Lays `newer` over this patch; keys present in both take `newer`'s value.
    pub fn merge(&mut self, newer: Self) {
        overlay(&mut self.active_tab, newer.active_tab);
        overlay(&mut self.input, newer.input);
        overlay(&mut self.chat_input, newer.chat_input);
        overlay(&mut self.is_chat_mode, newer.is_chat_mode);
        overlay(&mut self.chat_messages, newer.chat_messages);
        overlay(&mut self.current_session, newer.current_session);
        overlay(&mut self.system_prompt, newer.system_prompt);
        overlay(&mut self.model, newer.model);
        overlay(&mut self.tint_color, newer.tint_color);
        overlay(&mut self.active_session_id, newer.active_session_id);
        overlay(&mut self.is_loading, newer.is_loading);
        overlay(&mut self.is_thinking, newer.is_thinking);
        overlay(&mut self.thinking_duration, newer.thinking_duration);
        overlay(&mut self.thinking_content, newer.thinking_content);
        overlay(&mut self.show_current_response, newer.show_current_response);
        overlay(&mut self.thinking_level, newer.thinking_level);
    }

    /// Drops every key that `other` also carries.
    pub fn remove_overlap(&mut self, other: &Self) {
        clear_overlap(&mut self.active_tab, &other.active_tab);
        clear_overlap(&mut self.input, &other.input);
        clear_overlap(&mut self.chat_input, &other.chat_input);
        clear_overlap(&mut self.is_chat_mode, &other.is_chat_mode);
        clear_overlap(&mut self.chat_messages, &other.chat_messages);
        clear_overlap(&mut self.current_session, &other.current_session);
        clear_overlap(&mut self.system_prompt, &other.system_prompt);
        clear_overlap(&mut self.model, &other.model);
        clear_overlap(&mut self.tint_color, &other.tint_color);
        clear_overlap(&mut self.active_session_id, &other.active_session_id);
        clear_overlap(&mut self.is_loading, &other.is_loading);
        clear_overlap(&mut self.is_thinking, &other.is_thinking);
        clear_overlap(&mut self.thinking_duration, &other.thinking_duration);
        clear_overlap(&mut self.thinking_content, &other.thinking_content);
        clear_overlap(&mut self.show_current_response, &other.show_current_response);
        clear_overlap(&mut self.thinking_level, &other.thinking_level);
    }
}

fn overlay<T>(slot: &mut Option<T>, newer: Option<T>) {
    if newer.is_some() {
        *slot = newer;
    }
}

fn clear_overlap<T>(slot: &mut Option<T>, other: &Option<T>) {
    if other.is_some() {
        *slot = None;
    }
}

/// Distinguishes an explicit `null` from a missing key.
fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
