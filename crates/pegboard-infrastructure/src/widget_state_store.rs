//! Persistence of open floating windows.

use std::path::PathBuf;

use pegboard_core::error::Result;
use pegboard_core::sync::WidgetState;

use crate::storage::{AtomicJsonFile, BlockingStore};

/// The list of floating windows to reopen at launch.
pub struct WidgetStateStore {
    file: AtomicJsonFile<Vec<WidgetState>>,
}

impl WidgetStateStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            file: AtomicJsonFile::new(path),
        }
    }

    /// Stored widgets; an unreadable file is logged and treated as empty.
    pub fn load(&self) -> Vec<WidgetState> {
        match self.file.load() {
            Ok(widgets) => widgets.unwrap_or_default(),
            Err(e) => {
                tracing::warn!("[WidgetStateStore] Ignoring unreadable widget state: {}", e);
                Vec::new()
            }
        }
    }

    pub fn save(&self, widgets: &[WidgetState]) -> Result<()> {
        self.file.save(&widgets.to_vec())?;
        Ok(())
    }
}

impl BlockingStore<Vec<WidgetState>> for WidgetStateStore {
    fn store(&self, value: &Vec<WidgetState>) -> Result<()> {
        self.save(value)
    }
}
