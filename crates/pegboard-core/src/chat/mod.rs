//! Chat domain: messages, single-turn sessions, conversation history and
//! the per-chatbox UI state that is mirrored between windows.

pub mod history;
pub mod message;
pub mod session;
pub mod state;

pub use history::{HistoryBook, HistorySession};
pub use message::{ChatMessage, MessageRole, upsert_trailing_assistant, visible_messages};
pub use session::ChatSession;
pub use state::{ActiveTab, ChatboxState, ChatboxStatePatch, PatchEffects, ThinkingLevel};

/// Current wall-clock time in epoch milliseconds.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
