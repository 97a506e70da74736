//! A chatbox state replica whose setters mirror to the other window.

use super::{ApplyScope, SyncEndpoint, SyncMessage, SyncOutcome};
use crate::chat::{
    ActiveTab, ChatMessage, ChatSession, ChatboxState, ChatboxStatePatch, PatchEffects,
    ThinkingLevel,
};

/// A remote patch that has been applied locally.
#[derive(Debug)]
pub struct RemoteApply {
    /// Keeps outgoing sync suppressed until released.
    pub scope: ApplyScope,
    pub effects: PatchEffects,
    /// The patch that was applied, for follow-up persistence.
    pub patch: ChatboxStatePatch,
}

/// Local [`ChatboxState`] plus the endpoint that mirrors it.
///
/// Every setter commits locally first and then sends the resolved value,
/// so updater-style mutations never sync a stale snapshot.
///
/// Commits made while a remote patch holds the guard are not lost: they
/// collect in a deferred patch that rides along with the next send after
/// the guard settles, or goes out with [`Self::flush_deferred`]. Keys a
/// later remote patch carries are dropped from it, so the newer remote
/// value is not overwritten.
#[derive(Debug)]
pub struct ChatboxReplica {
    state: ChatboxState,
    endpoint: SyncEndpoint,
    deferred: Option<ChatboxStatePatch>,
}

impl ChatboxReplica {
    pub fn new(state: ChatboxState, endpoint: SyncEndpoint) -> Self {
        Self {
            state,
            endpoint,
            deferred: None,
        }
    }

    pub fn state(&self) -> &ChatboxState {
        &self.state
    }

    pub fn endpoint(&self) -> &SyncEndpoint {
        &self.endpoint
    }

    pub fn has_deferred(&self) -> bool {
        self.deferred.is_some()
    }

    /// Applies `patch` locally and mirrors it, together with any deferred
    /// keys. During a remote apply the patch is deferred instead.
    pub fn commit(&mut self, patch: ChatboxStatePatch) -> SyncOutcome {
        self.state.apply(&patch);
        if self.endpoint.guard().is_applying() {
            if !patch.is_empty() {
                self.deferred.get_or_insert_with(Default::default).merge(patch);
            }
            return SyncOutcome::Suppressed;
        }
        let patch = match self.deferred.take() {
            Some(mut pending) => {
                pending.merge(patch);
                pending
            }
            None => patch,
        };
        self.endpoint.sync_state(patch)
    }

    /// Sends the deferred patch once the guard has settled.
    ///
    /// `None` when nothing is deferred or a remote apply is still running.
    pub fn flush_deferred(&mut self) -> Option<SyncOutcome> {
        if self.endpoint.guard().is_applying() {
            return None;
        }
        let pending = self.deferred.take()?;
        tracing::debug!(
            "[ChatboxReplica] {} flushing deferred edits",
            self.endpoint.chatbox_id()
        );
        Some(self.endpoint.sync_state(pending))
    }

    /// Applies `patch` locally without mirroring it.
    pub fn commit_local(&mut self, patch: &ChatboxStatePatch) -> PatchEffects {
        self.state.apply(patch)
    }

    /// Applies an incoming message if it is addressed to this replica and
    /// is not an echo of our own role.
    pub fn apply_remote(&mut self, message: &SyncMessage) -> Option<RemoteApply> {
        let scope = self.endpoint.accept(message)?;
        let effects = self.state.apply(&message.state);
        if let Some(pending) = &mut self.deferred {
            pending.remove_overlap(&message.state);
            if pending.is_empty() {
                self.deferred = None;
            }
        }
        Some(RemoteApply {
            scope,
            effects,
            patch: message.state.clone(),
        })
    }

    pub fn set_active_tab(&mut self, tab: ActiveTab) -> SyncOutcome {
        self.commit(ChatboxStatePatch {
            active_tab: Some(tab),
            ..Default::default()
        })
    }

    pub fn set_input(&mut self, input: impl Into<String>) -> SyncOutcome {
        self.commit(ChatboxStatePatch {
            input: Some(input.into()),
            ..Default::default()
        })
    }

    pub fn set_chat_input(&mut self, input: impl Into<String>) -> SyncOutcome {
        self.commit(ChatboxStatePatch {
            chat_input: Some(input.into()),
            ..Default::default()
        })
    }

    pub fn set_chat_mode(&mut self, enabled: bool) -> SyncOutcome {
        self.commit(ChatboxStatePatch {
            is_chat_mode: Some(enabled),
            ..Default::default()
        })
    }

    pub fn set_chat_messages(&mut self, messages: Vec<ChatMessage>) -> SyncOutcome {
        self.commit(ChatboxStatePatch {
            chat_messages: Some(messages),
            ..Default::default()
        })
    }

    /// Mutates the message list in place and mirrors the result.
    pub fn update_chat_messages(&mut self, f: impl FnOnce(&mut Vec<ChatMessage>)) -> SyncOutcome {
        let mut messages = self.state.chat_messages.clone();
        f(&mut messages);
        self.set_chat_messages(messages)
    }

    pub fn set_current_session(&mut self, session: Option<ChatSession>) -> SyncOutcome {
        self.commit(ChatboxStatePatch {
            current_session: Some(session),
            ..Default::default()
        })
    }

    /// Mutates the current session, if any, and mirrors the result.
    pub fn update_current_session(&mut self, f: impl FnOnce(&mut ChatSession)) -> SyncOutcome {
        let Some(mut session) = self.state.current_session.clone() else {
            return SyncOutcome::Suppressed;
        };
        f(&mut session);
        self.set_current_session(Some(session))
    }

    pub fn set_system_prompt(&mut self, prompt: impl Into<String>) -> SyncOutcome {
        self.commit(ChatboxStatePatch {
            system_prompt: Some(prompt.into()),
            ..Default::default()
        })
    }

    pub fn set_model(&mut self, model: impl Into<String>) -> SyncOutcome {
        self.commit(ChatboxStatePatch {
            model: Some(model.into()),
            ..Default::default()
        })
    }

    pub fn set_tint_color(&mut self, tint: impl Into<String>) -> SyncOutcome {
        self.commit(ChatboxStatePatch {
            tint_color: Some(tint.into()),
            ..Default::default()
        })
    }

    pub fn set_active_session_id(&mut self, id: Option<String>) -> SyncOutcome {
        self.commit(ChatboxStatePatch {
            active_session_id: Some(id),
            ..Default::default()
        })
    }

    pub fn set_loading(&mut self, loading: bool) -> SyncOutcome {
        self.commit(ChatboxStatePatch {
            is_loading: Some(loading),
            ..Default::default()
        })
    }

    pub fn set_thinking(&mut self, thinking: bool) -> SyncOutcome {
        self.commit(ChatboxStatePatch {
            is_thinking: Some(thinking),
            ..Default::default()
        })
    }

    pub fn set_thinking_duration(&mut self, secs: u64) -> SyncOutcome {
        self.commit(ChatboxStatePatch {
            thinking_duration: Some(secs),
            ..Default::default()
        })
    }

    /// Counter refresh while thinking; kept local to avoid a sync per tick.
    pub fn set_thinking_duration_local(&mut self, secs: u64) {
        self.state.thinking_duration = secs;
    }

    pub fn set_thinking_content(&mut self, content: impl Into<String>) -> SyncOutcome {
        self.commit(ChatboxStatePatch {
            thinking_content: Some(content.into()),
            ..Default::default()
        })
    }

    pub fn set_show_current_response(&mut self, show: bool) -> SyncOutcome {
        self.commit(ChatboxStatePatch {
            show_current_response: Some(show),
            ..Default::default()
        })
    }

    pub fn set_thinking_level(&mut self, level: ThinkingLevel) -> SyncOutcome {
        self.commit(ChatboxStatePatch {
            thinking_level: Some(level),
            ..Default::default()
        })
    }
}
