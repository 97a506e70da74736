//! Directory-backed [`PaneCache`].

use std::path::PathBuf;

use async_trait::async_trait;
use pegboard_core::error::{PegboardError, Result};
use pegboard_core::pane_cache::{PaneCache, PaneCacheKey, PaneLocalState};
use strum::IntoEnumIterator;

use crate::storage::AtomicJsonFile;

/// Stores each cache key of each chatbox in its own JSON file under
/// `<root>/<chatbox-id>/<key>.json`.
pub struct DirPaneCache {
    root: PathBuf,
}

impl DirPaneCache {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn pane_dir(&self, chatbox_id: &str) -> Result<PathBuf> {
        let valid = !chatbox_id.is_empty()
            && chatbox_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(PegboardError::not_found("chatbox", chatbox_id));
        }
        Ok(self.root.join(chatbox_id))
    }

    fn key_file(
        &self,
        chatbox_id: &str,
        key: PaneCacheKey,
    ) -> Result<AtomicJsonFile<serde_json::Value>> {
        Ok(AtomicJsonFile::new(
            self.pane_dir(chatbox_id)?.join(format!("{}.json", key)),
        ))
    }
}

#[async_trait]
impl PaneCache for DirPaneCache {
    async fn load(&self, chatbox_id: &str) -> Result<PaneLocalState> {
        let mut state = PaneLocalState::default();
        for key in PaneCacheKey::iter() {
            match self.key_file(chatbox_id, key)?.load() {
                Ok(Some(value)) => state.insert(key, value),
                Ok(None) => {}
                Err(e) => tracing::warn!(
                    "[PaneCache] Skipping '{}' for {}: {}",
                    key,
                    chatbox_id,
                    e
                ),
            }
        }
        Ok(state)
    }

    async fn save_key(
        &self,
        chatbox_id: &str,
        key: PaneCacheKey,
        value: serde_json::Value,
    ) -> Result<()> {
        self.key_file(chatbox_id, key)?.save(&value)?;
        Ok(())
    }

    async fn clear(&self, chatbox_id: &str) -> Result<()> {
        let dir = self.pane_dir(chatbox_id)?;
        match tokio::fs::remove_dir_all(&dir).await {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_keys_are_namespaced_per_chatbox() {
        let temp_dir = TempDir::new().unwrap();
        let cache = DirPaneCache::new(temp_dir.path().to_path_buf());

        cache.save_key("a1", PaneCacheKey::IsChatMode, json!(true)).await.unwrap();
        cache
            .save_key("b2", PaneCacheKey::ResourceFileName, json!("notes.md"))
            .await
            .unwrap();

        let a = cache.load("a1").await.unwrap();
        assert_eq!(a.get::<bool>(PaneCacheKey::IsChatMode), Some(true));
        assert!(a.raw(PaneCacheKey::ResourceFileName).is_none());
        assert!(temp_dir.path().join("a1").join("isChatMode.json").exists());
    }

    #[tokio::test]
    async fn test_clear_removes_everything() {
        let temp_dir = TempDir::new().unwrap();
        let cache = DirPaneCache::new(temp_dir.path().to_path_buf());
        cache.save_key("a1", PaneCacheKey::ChatMessages, json!([])).await.unwrap();
        cache.clear("a1").await.unwrap();
        cache.clear("a1").await.unwrap();
        assert!(cache.load("a1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rejects_path_like_ids() {
        let temp_dir = TempDir::new().unwrap();
        let cache = DirPaneCache::new(temp_dir.path().to_path_buf());
        assert!(cache.load("../etc").await.is_err());
    }
}
