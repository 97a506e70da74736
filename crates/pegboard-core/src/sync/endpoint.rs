//! One side of a chatbox's sync channel.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use super::{ApplyScope, SyncGuard, SyncMessage, SyncTransport, WindowSide};
use crate::chat::ChatboxStatePatch;

/// What happened to an outgoing patch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Sent,
    /// A remote patch is being applied. A replica keeps the patch and sends
    /// it once the guard settles.
    Suppressed,
    /// Hosted side with no floating window open.
    NoCounterpart,
    /// No transport is wired up.
    Unavailable,
    Failed(String),
}

/// Sends local patches to the other replica and filters incoming ones.
#[derive(Clone)]
pub struct SyncEndpoint {
    chatbox_id: String,
    side: WindowSide,
    transport: Option<Arc<dyn SyncTransport>>,
    counterpart: Arc<AtomicBool>,
    guard: SyncGuard,
}

impl SyncEndpoint {
    pub fn new(
        chatbox_id: impl Into<String>,
        side: WindowSide,
        transport: Option<Arc<dyn SyncTransport>>,
    ) -> Self {
        Self {
            chatbox_id: chatbox_id.into(),
            side,
            transport,
            // A floating window always has the hosted pane behind it.
            counterpart: Arc::new(AtomicBool::new(side.is_floating())),
            guard: SyncGuard::new(),
        }
    }

    /// An endpoint that never sends; used when no window host exists.
    pub fn detached(chatbox_id: impl Into<String>) -> Self {
        Self::new(chatbox_id, WindowSide::Hosted, None)
    }

    pub fn chatbox_id(&self) -> &str {
        &self.chatbox_id
    }

    pub fn side(&self) -> WindowSide {
        self.side
    }

    pub fn guard(&self) -> &SyncGuard {
        &self.guard
    }

    /// Hosted side bookkeeping of whether a floating window is open.
    pub fn set_counterpart_present(&self, present: bool) {
        self.counterpart.store(present, Ordering::SeqCst);
    }

    pub fn has_counterpart(&self) -> bool {
        self.counterpart.load(Ordering::SeqCst)
    }

    /// Mirrors `patch` to the other replica when allowed.
    pub fn sync_state(&self, patch: ChatboxStatePatch) -> SyncOutcome {
        if patch.is_empty() {
            return SyncOutcome::Suppressed;
        }
        if self.guard.is_applying() {
            tracing::trace!("[SyncEndpoint] {} suppressed during remote apply", self.chatbox_id);
            return SyncOutcome::Suppressed;
        }
        let Some(transport) = &self.transport else {
            return SyncOutcome::Unavailable;
        };
        if !self.has_counterpart() {
            return SyncOutcome::NoCounterpart;
        }

        let message = SyncMessage {
            chatbox_id: self.chatbox_id.clone(),
            state: patch,
            from_widget: self.side.is_floating(),
        };
        match transport.send(message) {
            Ok(()) => SyncOutcome::Sent,
            Err(e) => {
                tracing::warn!("[SyncEndpoint] {} send failed: {}", self.chatbox_id, e);
                SyncOutcome::Failed(e.to_string())
            }
        }
    }

    /// Accepts an incoming message addressed to this replica.
    ///
    /// Messages for other chatboxes and messages sent by this side's own
    /// role (echoes) are refused. An accepted message returns the scope
    /// that must be held while it is applied.
    pub fn accept(&self, message: &SyncMessage) -> Option<ApplyScope> {
        if message.chatbox_id != self.chatbox_id {
            return None;
        }
        if message.from_widget == self.side.is_floating() {
            tracing::trace!("[SyncEndpoint] {} ignored own echo", self.chatbox_id);
            return None;
        }
        Some(self.guard.enter())
    }
}

impl std::fmt::Debug for SyncEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEndpoint")
            .field("chatbox_id", &self.chatbox_id)
            .field("side", &self.side)
            .field("has_transport", &self.transport.is_some())
            .field("counterpart", &self.has_counterpart())
            .finish()
    }
}
