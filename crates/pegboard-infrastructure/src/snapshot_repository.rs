//! JSON file implementation of [`SnapshotRepository`].

use std::path::PathBuf;

use async_trait::async_trait;
use pegboard_core::canvas::{AppSnapshot, SnapshotRepository};
use pegboard_core::error::Result;

use crate::storage::{AtomicJsonFile, BlockingStore};

/// Stores the [`AppSnapshot`] in a single JSON document.
pub struct JsonSnapshotRepository {
    file: AtomicJsonFile<AppSnapshot>,
}

impl JsonSnapshotRepository {
    pub fn new(path: PathBuf) -> Self {
        Self {
            file: AtomicJsonFile::new(path),
        }
    }
}

#[async_trait]
impl SnapshotRepository for JsonSnapshotRepository {
    async fn load(&self) -> Result<Option<AppSnapshot>> {
        let loaded = self.file.load()?;
        if loaded.is_none() {
            tracing::debug!(
                "[SnapshotRepository] No snapshot at {}",
                self.file.path().display()
            );
        }
        Ok(loaded)
    }

    async fn save(&self, snapshot: &AppSnapshot) -> Result<()> {
        self.save_blocking(snapshot)
    }

    fn save_blocking(&self, snapshot: &AppSnapshot) -> Result<()> {
        self.file.save(snapshot)?;
        Ok(())
    }
}

impl BlockingStore<AppSnapshot> for JsonSnapshotRepository {
    fn store(&self, value: &AppSnapshot) -> Result<()> {
        self.save_blocking(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pegboard_core::canvas::ChatBoxPane;
    use pegboard_core::layout::GridPoint;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_load_missing_is_none() {
        let temp_dir = TempDir::new().unwrap();
        let repo = JsonSnapshotRepository::new(temp_dir.path().join("pegboard-data.json"));
        assert!(repo.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("pegboard-data.json");
        let repo = JsonSnapshotRepository::new(path.clone());

        let mut snapshot = AppSnapshot::default();
        snapshot.api_keys.openai = "sk-test".into();
        snapshot.canvases[0]
            .chat_boxes
            .push(ChatBoxPane::new("42", "Agent 1", GridPoint::new(2, 2), "#3b82f6"));
        repo.save(&snapshot).await.unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"activeCanvasId\""));
        assert_eq!(repo.load().await.unwrap(), Some(snapshot));
    }
}
