//! Per-chatbox conversation history.

use serde::{Deserialize, Serialize};

use super::{ChatMessage, ChatSession, now_millis};

/// A stored conversation, listed in the history tab.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistorySession {
    /// Equal to the originating [`ChatSession::session_id`].
    pub id: String,
    /// The user input that started the conversation.
    pub title: String,
    pub messages: Vec<ChatMessage>,
    /// Epoch milliseconds of the last update.
    pub timestamp: i64,
}

impl HistorySession {
    /// Builds the two-message history entry for a completed single-turn session.
    pub fn from_session(session: &ChatSession, thinking: Option<(&str, u64)>) -> Self {
        let mut answer = ChatMessage::assistant(session.assistant_response.clone());
        if let Some((content, duration)) = thinking {
            answer = answer.with_thinking(content, duration);
        }

        Self {
            id: session.session_id.clone(),
            title: session.user_input.clone(),
            messages: vec![ChatMessage::user(session.user_input.clone()), answer],
            timestamp: session.timestamp,
        }
    }
}

/// Ordered collection of history entries, keyed by id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HistoryBook {
    sessions: Vec<HistorySession>,
}

impl HistoryBook {
    pub fn new(sessions: Vec<HistorySession>) -> Self {
        Self { sessions }
    }

    /// Replaces the entry with the same id in place, or appends it.
    pub fn upsert(&mut self, session: HistorySession) {
        match self.sessions.iter_mut().find(|s| s.id == session.id) {
            Some(existing) => *existing = session,
            None => self.sessions.push(session),
        }
    }

    pub fn get(&self, id: &str) -> Option<&HistorySession> {
        self.sessions.iter().find(|s| s.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Mirrors a conversation into an existing entry and bumps its timestamp.
    ///
    /// Returns `false` when no entry has the id.
    pub fn replace_messages(&mut self, id: &str, messages: &[ChatMessage]) -> bool {
        match self.sessions.iter_mut().find(|s| s.id == id) {
            Some(entry) => {
                entry.messages = messages.to_vec();
                entry.timestamp = now_millis();
                true
            }
            None => false,
        }
    }

    /// Entries ordered newest first, as the history tab lists them.
    pub fn newest_first(&self) -> Vec<&HistorySession> {
        let mut sorted: Vec<&HistorySession> = self.sessions.iter().collect();
        sorted.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        sorted
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn as_slice(&self) -> &[HistorySession] {
        &self.sessions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(input: &str, response: &str) -> ChatSession {
        let mut s = ChatSession::new(input);
        s.assistant_response = response.to_string();
        s
    }

    #[test]
    fn test_upsert_same_id_keeps_single_entry() {
        let mut book = HistoryBook::default();
        let mut s = session("Hello", "first");
        book.upsert(HistorySession::from_session(&s, None));

        s.assistant_response = "second".to_string();
        book.upsert(HistorySession::from_session(&s, None));

        assert_eq!(book.len(), 1);
        let entry = book.get(&s.session_id).unwrap();
        assert_eq!(entry.messages[1].content, "second");
        assert_eq!(entry.title, "Hello");
    }

    #[test]
    fn test_from_session_records_thinking() {
        let s = session("q", "a");
        let entry = HistorySession::from_session(&s, Some(("hmm", 4)));
        assert_eq!(entry.messages[1].thinking_content.as_deref(), Some("hmm"));
        assert_eq!(entry.messages[1].thinking_duration, Some(4));
    }

    #[test]
    fn test_replace_messages_unknown_id() {
        let mut book = HistoryBook::default();
        assert!(!book.replace_messages("missing", &[]));
    }

    #[test]
    fn test_newest_first() {
        let mut older = HistorySession::from_session(&session("a", "1"), None);
        older.timestamp = 10;
        let mut newer = HistorySession::from_session(&session("b", "2"), None);
        newer.timestamp = 20;
        let book = HistoryBook::new(vec![older, newer]);

        let listed = book.newest_first();
        assert_eq!(listed[0].title, "b");
        assert_eq!(listed[1].title, "a");
    }
}
