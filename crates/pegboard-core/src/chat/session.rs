//! Single-turn chat session.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The one request/response exchange shown in single-turn mode.
///
/// A fresh session is created on every send. Its identity never changes; the
/// only mutation is streaming text into `assistant_response`. A new send
/// supersedes the session without deleting its history entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSession {
    pub session_id: String,
    pub user_input: String,
    pub assistant_response: String,
    /// Epoch milliseconds.
    pub timestamp: i64,
}

impl ChatSession {
    pub fn new(user_input: impl Into<String>) -> Self {
        Self {
            session_id: format!("session_{}", Uuid::new_v4()),
            user_input: user_input.into(),
            assistant_response: String::new(),
            timestamp: super::now_millis(),
        }
    }
}
