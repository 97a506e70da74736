//! Pane record changes raised outside the canvas service.

use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaneUpdate {
    /// A chatbox tint changed in one of its replicas.
    Tint { chatbox_id: String, color: String },
}

/// Receives pane record changes for the canvas that owns the pane.
pub trait PaneUpdateSink: Send + Sync {
    fn publish(&self, update: PaneUpdate);
}

impl PaneUpdateSink for mpsc::UnboundedSender<PaneUpdate> {
    fn publish(&self, update: PaneUpdate) {
        if self.send(update).is_err() {
            tracing::debug!("[PaneUpdateSink] Canvas service gone, update dropped");
        }
    }
}
