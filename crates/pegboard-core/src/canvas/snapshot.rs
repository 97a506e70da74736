//! The single persisted application document.

use serde::{Deserialize, Serialize};

use super::Canvas;
use crate::provider::ApiKeys;

pub const DEFAULT_CANVAS_ID: &str = "1";

/// Everything the main window needs to rebuild itself after a restart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppSnapshot {
    #[serde(default)]
    pub api_keys: ApiKeys,
    pub canvases: Vec<Canvas>,
    pub active_canvas_id: String,
    #[serde(default)]
    pub is_locked: bool,
}

impl Default for AppSnapshot {
    fn default() -> Self {
        Self {
            api_keys: ApiKeys::default(),
            canvases: vec![Canvas::new(DEFAULT_CANVAS_ID, "Canvas 1")],
            active_canvas_id: DEFAULT_CANVAS_ID.to_string(),
            is_locked: false,
        }
    }
}

impl AppSnapshot {
    pub fn active_canvas(&self) -> Option<&Canvas> {
        self.canvases.iter().find(|c| c.id == self.active_canvas_id)
    }
}
