//! Seams to the window host.

use async_trait::async_trait;

use super::{SyncMessage, WindowData};
use crate::error::Result;

/// Fire-and-forget delivery of sync messages to the other replica.
pub trait SyncTransport: Send + Sync {
    fn send(&self, message: SyncMessage) -> Result<()>;
}

/// Pull-based recovery of floating window data from the main window.
#[async_trait]
pub trait WindowDataSource: Send + Sync {
    /// Resolves to `None` when the main window is absent or does not answer
    /// within the host's timeout.
    async fn request_window_data(&self, chatbox_id: &str) -> Option<WindowData>;
}
