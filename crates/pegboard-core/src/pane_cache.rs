//! Per-chatbox local cache, restored when a pane mounts.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use strum::{Display, EnumIter, EnumString};

use crate::error::Result;

/// Keys stored for each chatbox id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
#[strum(serialize_all = "camelCase")]
pub enum PaneCacheKey {
    IsChatMode,
    CurrentSession,
    ChatMessages,
    ChatSessions,
    ActiveSessionId,
    ThinkingLevel,
    ResourceText,
    ResourceChunks,
    ResourceEmbeddings,
    ResourceFileName,
}

/// Raw cached values for one chatbox.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PaneLocalState {
    entries: HashMap<PaneCacheKey, serde_json::Value>,
}

impl PaneLocalState {
    pub fn insert(&mut self, key: PaneCacheKey, value: serde_json::Value) {
        self.entries.insert(key, value);
    }

    pub fn raw(&self, key: PaneCacheKey) -> Option<&serde_json::Value> {
        self.entries.get(&key)
    }

    /// Typed value; missing or unreadable entries come back as `None`.
    pub fn get<T: DeserializeOwned>(&self, key: PaneCacheKey) -> Option<T> {
        let value = self.entries.get(&key)?;
        match serde_json::from_value(value.clone()) {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::warn!("[PaneCache] Ignoring unreadable '{}': {}", key, e);
                None
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Storage for [`PaneLocalState`], namespaced by chatbox id.
#[async_trait]
pub trait PaneCache: Send + Sync {
    async fn load(&self, chatbox_id: &str) -> Result<PaneLocalState>;

    async fn save_key(
        &self,
        chatbox_id: &str,
        key: PaneCacheKey,
        value: serde_json::Value,
    ) -> Result<()>;

    /// Removes everything stored for the chatbox.
    async fn clear(&self, chatbox_id: &str) -> Result<()>;
}
