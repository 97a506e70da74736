//! Chatbox use cases over a synced [`ChatboxReplica`].

use std::sync::Arc;
use std::time::Duration;

use pegboard_core::canvas::{PaneUpdate, PaneUpdateSink, PendingInput};
use pegboard_core::chat::{
    ActiveTab, ChatMessage, ChatSession, ChatboxState, ChatboxStatePatch, HistoryBook,
    HistorySession, ThinkingLevel,
};
use pegboard_core::config::PegboardConfig;
use pegboard_core::error::{PegboardError, Result};
use pegboard_core::generation::{
    EmbeddingClient, GenerationClient, GenerationPayload, GenerationRequest,
};
use pegboard_core::pane_cache::{PaneCache, PaneCacheKey};
use pegboard_core::provider::{ApiKeys, supports_thinking_level};
use pegboard_core::retrieval::{CONTEXT_CHUNKS, ResourceDocument, chunk_document, top_chunks};
use pegboard_core::stream::format_stream_error;
use pegboard_core::sync::{ChatboxReplica, SyncGuard, SyncMessage, SyncOutcome, WindowData};
use uuid::Uuid;

use super::prompt::{PromptBuilder, RefineContext};
use super::streaming::{FinishedResponse, ResponseStream, StreamStep, StreamTarget, StreamTimers};

const RESOURCE_KEYS: [PaneCacheKey; 4] = [
    PaneCacheKey::ResourceFileName,
    PaneCacheKey::ResourceText,
    PaneCacheKey::ResourceChunks,
    PaneCacheKey::ResourceEmbeddings,
];

/// Timers a chatbox controller runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChatboxTiming {
    /// Minimum gap between streamed content publishes.
    pub stream_throttle: Duration,
    /// Refresh interval of the thinking counter.
    pub thinking_tick: Duration,
    /// How long outgoing sync stays suppressed after a remote patch.
    pub sync_guard_delay: Duration,
}

impl ChatboxTiming {
    pub fn from_config(config: &PegboardConfig) -> Self {
        Self {
            stream_throttle: config.stream_throttle(),
            thinking_tick: config.thinking_tick(),
            sync_guard_delay: config.sync_guard_delay(),
        }
    }
}

impl Default for ChatboxTiming {
    fn default() -> Self {
        Self::from_config(&PegboardConfig::default())
    }
}

/// Which send started the response in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Turn {
    Single,
    Chat,
}

struct InFlight {
    turn: Turn,
    stream: ResponseStream,
}

/// One step of the response in flight, to be handed back to
/// [`ChatboxController::apply_response_step`].
#[derive(Debug)]
pub struct ResponseStep(StreamStep);

/// Chat Session Manager for one chatbox replica.
///
/// Owns the replica and everything that is local to the pane: history,
/// refine context and the uploaded resource document. Each state change is
/// mirrored through the replica's endpoint and written to the pane cache
/// key by key. Cache failures are logged and never interrupt a send.
pub struct ChatboxController {
    replica: ChatboxReplica,
    history: HistoryBook,
    refine: Option<RefineContext>,
    resource: ResourceDocument,
    api_keys: ApiKeys,
    streaming: bool,
    timing: ChatboxTiming,
    prompts: PromptBuilder,
    generation: Arc<dyn GenerationClient>,
    embedding: Option<Arc<dyn EmbeddingClient>>,
    cache: Option<Arc<dyn PaneCache>>,
    pane_sink: Option<Arc<dyn PaneUpdateSink>>,
    in_flight: Option<InFlight>,
}

impl ChatboxController {
    /// Creates a controller with streaming enabled and no optional
    /// collaborators.
    pub fn new(replica: ChatboxReplica, generation: Arc<dyn GenerationClient>) -> Self {
        Self {
            replica,
            history: HistoryBook::default(),
            refine: None,
            resource: ResourceDocument::default(),
            api_keys: ApiKeys::default(),
            streaming: true,
            timing: ChatboxTiming::default(),
            prompts: PromptBuilder::new(),
            generation,
            embedding: None,
            cache: None,
            pane_sink: None,
            in_flight: None,
        }
    }

    pub fn with_embedding(mut self, embedding: Arc<dyn EmbeddingClient>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    pub fn with_cache(mut self, cache: Arc<dyn PaneCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_pane_sink(mut self, sink: Arc<dyn PaneUpdateSink>) -> Self {
        self.pane_sink = Some(sink);
        self
    }

    pub fn with_api_keys(mut self, api_keys: ApiKeys) -> Self {
        self.api_keys = api_keys;
        self
    }

    pub fn with_streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    pub fn with_timing(mut self, timing: ChatboxTiming) -> Self {
        self.timing = timing;
        self
    }

    // ============================================================================
    // Accessors
    // ============================================================================

    pub fn chatbox_id(&self) -> &str {
        self.replica.endpoint().chatbox_id()
    }

    pub fn state(&self) -> &ChatboxState {
        self.replica.state()
    }

    pub fn replica(&self) -> &ChatboxReplica {
        &self.replica
    }

    pub fn history(&self) -> &HistoryBook {
        &self.history
    }

    pub fn refine_context(&self) -> Option<&RefineContext> {
        self.refine.as_ref()
    }

    pub fn resource(&self) -> &ResourceDocument {
        &self.resource
    }

    pub fn set_api_keys(&mut self, api_keys: ApiKeys) {
        self.api_keys = api_keys;
    }

    pub fn set_streaming(&mut self, streaming: bool) {
        self.streaming = streaming;
    }

    // ============================================================================
    // Restore & persistence
    // ============================================================================

    /// Loads the pane-local state written by earlier sessions.
    ///
    /// Missing or unreadable entries keep their defaults, so a fresh pane
    /// starts in single-turn mode.
    pub async fn restore(&mut self) {
        let Some(cache) = self.cache.clone() else {
            return;
        };
        let local = match cache.load(self.chatbox_id()).await {
            Ok(local) => local,
            Err(e) => {
                tracing::warn!(
                    "[ChatboxController] Failed to load cache for {}: {}",
                    self.chatbox_id(),
                    e
                );
                return;
            }
        };
        if local.is_empty() {
            tracing::debug!("[ChatboxController] No cached state for {}", self.chatbox_id());
            return;
        }

        let patch = ChatboxStatePatch {
            is_chat_mode: local.get(PaneCacheKey::IsChatMode),
            current_session: local.get::<Option<ChatSession>>(PaneCacheKey::CurrentSession),
            chat_messages: local.get(PaneCacheKey::ChatMessages),
            active_session_id: local.get::<Option<String>>(PaneCacheKey::ActiveSessionId),
            thinking_level: local.get(PaneCacheKey::ThinkingLevel),
            ..Default::default()
        };
        self.replica.commit_local(&patch);

        if let Some(history) = local.get::<HistoryBook>(PaneCacheKey::ChatSessions) {
            self.history = history;
        }
        self.resource = ResourceDocument {
            file_name: local.get(PaneCacheKey::ResourceFileName).unwrap_or_default(),
            text: local.get(PaneCacheKey::ResourceText).unwrap_or_default(),
            chunks: local.get(PaneCacheKey::ResourceChunks).unwrap_or_default(),
            embeddings: local.get(PaneCacheKey::ResourceEmbeddings).unwrap_or_default(),
        };

        tracing::info!(
            "[ChatboxController] Restored {}: chat_mode={}, history={}, resource_chunks={}",
            self.chatbox_id(),
            self.replica.state().is_chat_mode,
            self.history.len(),
            self.resource.chunks.len()
        );
    }

    async fn persist(&self, keys: &[PaneCacheKey]) {
        let Some(cache) = &self.cache else {
            return;
        };
        for &key in keys {
            let value = match self.cache_value(key) {
                Ok(value) => value,
                Err(e) => {
                    tracing::warn!("[ChatboxController] Cannot encode '{}': {}", key, e);
                    continue;
                }
            };
            if let Err(e) = cache.save_key(self.chatbox_id(), key, value).await {
                tracing::warn!(
                    "[ChatboxController] Failed to cache '{}' for {}: {}",
                    key,
                    self.chatbox_id(),
                    e
                );
            }
        }
    }

    fn cache_value(&self, key: PaneCacheKey) -> serde_json::Result<serde_json::Value> {
        let state = self.replica.state();
        match key {
            PaneCacheKey::IsChatMode => serde_json::to_value(state.is_chat_mode),
            PaneCacheKey::CurrentSession => serde_json::to_value(&state.current_session),
            PaneCacheKey::ChatMessages => serde_json::to_value(&state.chat_messages),
            PaneCacheKey::ChatSessions => serde_json::to_value(&self.history),
            PaneCacheKey::ActiveSessionId => serde_json::to_value(&state.active_session_id),
            PaneCacheKey::ThinkingLevel => serde_json::to_value(state.thinking_level),
            PaneCacheKey::ResourceText => serde_json::to_value(&self.resource.text),
            PaneCacheKey::ResourceChunks => serde_json::to_value(&self.resource.chunks),
            PaneCacheKey::ResourceEmbeddings => serde_json::to_value(&self.resource.embeddings),
            PaneCacheKey::ResourceFileName => serde_json::to_value(&self.resource.file_name),
        }
    }

    async fn commit_and_persist(&mut self, patch: ChatboxStatePatch) -> SyncOutcome {
        let keys = cached_keys(&patch);
        let outcome = self.replica.commit(patch);
        self.persist(&keys).await;
        outcome
    }

    // ============================================================================
    // Sending
    // ============================================================================

    /// Sends the pending input as a fresh single-turn request and waits for
    /// the response.
    ///
    /// # Returns
    ///
    /// `false` when the input is blank or a request is already in flight.
    /// Provider errors are rendered into the response, not returned.
    pub async fn send(&mut self) -> bool {
        if !self.begin_send().await {
            return false;
        }
        self.complete_response().await;
        true
    }

    /// Starts a single-turn request without waiting for it.
    ///
    /// The response is advanced with [`Self::next_response_step`] and
    /// [`Self::apply_response_step`], leaving the caller free to handle sync
    /// messages and edits in between.
    pub async fn begin_send(&mut self) -> bool {
        let streaming = self.streaming;
        self.begin_single_turn(streaming).await
    }

    async fn begin_single_turn(&mut self, streaming: bool) -> bool {
        let state = self.replica.state();
        let input = state.input.trim().to_string();
        if input.is_empty() || state.is_loading || self.in_flight.is_some() {
            return false;
        }
        tracing::info!(
            "[ChatboxController] {} single-turn send (streaming={})",
            self.chatbox_id(),
            streaming
        );

        self.refine = None;
        self.commit_and_persist(ChatboxStatePatch {
            input: Some(String::new()),
            show_current_response: Some(true),
            is_loading: Some(true),
            is_chat_mode: Some(false),
            active_session_id: Some(None),
            chat_messages: Some(Vec::new()),
            current_session: Some(Some(ChatSession::new(input.clone()))),
            is_thinking: Some(false),
            thinking_content: Some(String::new()),
            thinking_duration: Some(0),
            ..Default::default()
        })
        .await;

        let payload = GenerationPayload::UserMessage(input.clone());
        match self.prepare_request(payload, &input, streaming).await {
            Ok(request) => self.start_response(Turn::Single, request, StreamTarget::Session),
            Err(e) => {
                self.report_error(StreamTarget::Session, &e);
                self.finish_turn(Turn::Single, None).await;
            }
        }
        true
    }

    /// Sends the chat input as the next turn of the conversation and waits
    /// for the response.
    ///
    /// The full message list is sent; with streaming on an empty assistant
    /// placeholder is appended first and filled as content arrives.
    pub async fn send_chat(&mut self) -> bool {
        if !self.begin_send_chat().await {
            return false;
        }
        self.complete_response().await;
        true
    }

    /// Starts the next chat turn without waiting for the response.
    pub async fn begin_send_chat(&mut self) -> bool {
        let state = self.replica.state();
        let text = state.chat_input.trim().to_string();
        if text.is_empty() || state.is_loading || self.in_flight.is_some() {
            return false;
        }
        tracing::info!(
            "[ChatboxController] {} chat send (refine={})",
            self.chatbox_id(),
            self.refine.is_some()
        );

        self.replica.commit(ChatboxStatePatch {
            chat_input: Some(String::new()),
            is_loading: Some(true),
            is_thinking: Some(false),
            thinking_content: Some(String::new()),
            thinking_duration: Some(0),
            ..Default::default()
        });
        self.replica
            .update_chat_messages(|m| m.push(ChatMessage::user(text.clone())));
        self.mirror_into_history();
        self.persist(&[PaneCacheKey::ChatMessages, PaneCacheKey::ChatSessions])
            .await;

        let conversation = self.replica.state().chat_messages.clone();
        let payload = GenerationPayload::Conversation(conversation);
        match self.prepare_request(payload, &text, self.streaming).await {
            Ok(request) => {
                if request.streaming {
                    self.replica
                        .update_chat_messages(|m| m.push(ChatMessage::placeholder()));
                }
                self.start_response(Turn::Chat, request, StreamTarget::TrailingMessage);
            }
            Err(e) => {
                self.report_error(StreamTarget::TrailingMessage, &e);
                self.finish_turn(Turn::Chat, None).await;
            }
        }
        true
    }

    /// Applies input sent to this pane from elsewhere on the canvas.
    ///
    /// The text replaces the input and the main tab is shown. With
    /// `auto_send` a non-streaming single-turn send follows.
    ///
    /// # Returns
    ///
    /// Whether a request was sent.
    pub async fn accept_pending_input(&mut self, pending: PendingInput) -> bool {
        self.replica.commit(ChatboxStatePatch {
            input: Some(pending.text),
            active_tab: Some(ActiveTab::Main),
            ..Default::default()
        });
        if !pending.auto_send || !self.begin_single_turn(false).await {
            return false;
        }
        self.complete_response().await;
        true
    }

    pub fn is_responding(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Waits for the next step of the response in flight.
    ///
    /// Pends forever when nothing is in flight, so it can sit in a
    /// `select!` next to sync and UI events. Cancel safe.
    pub async fn next_response_step(&mut self) -> ResponseStep {
        match &mut self.in_flight {
            Some(in_flight) => ResponseStep(in_flight.stream.next().await),
            None => std::future::pending().await,
        }
    }

    /// Writes a step returned by [`Self::next_response_step`] into the
    /// replica. The last step ends the turn: history, loading flag and cache.
    pub async fn apply_response_step(&mut self, step: ResponseStep) {
        let Some(in_flight) = &self.in_flight else {
            return;
        };
        let target = in_flight.stream.target();
        match step.0 {
            StreamStep::Effects(effects) => target.apply(&mut self.replica, effects),
            StreamStep::ThinkingTick(secs) => self.replica.set_thinking_duration_local(secs),
            StreamStep::Finished(finished) => {
                if let Some(in_flight) = self.in_flight.take() {
                    self.finish_turn(in_flight.turn, finished).await;
                }
            }
        }
    }

    /// Drives the response in flight to its end.
    pub async fn complete_response(&mut self) {
        while self.in_flight.is_some() {
            let step = self.next_response_step().await;
            self.apply_response_step(step).await;
        }
    }

    async fn prepare_request(
        &self,
        payload: GenerationPayload,
        query: &str,
        streaming: bool,
    ) -> Result<GenerationRequest> {
        let state = self.replica.state();
        let model = state.model.clone();
        let api_key = self.api_keys.key_for(&model)?.to_string();
        let base = match &self.refine {
            Some(refine) => self.prompts.refine(&state.system_prompt, refine)?,
            None => state.system_prompt.clone(),
        };
        let thinking_level = supports_thinking_level(&model).then_some(state.thinking_level);
        let system_prompt = self.augment(&base, query).await;

        Ok(GenerationRequest {
            request_id: format!("req_{}", Uuid::new_v4()),
            model,
            api_key,
            system_prompt,
            payload,
            streaming,
            thinking_level,
        })
    }

    fn start_response(&mut self, turn: Turn, request: GenerationRequest, target: StreamTarget) {
        if request.streaming {
            self.replica.commit(ChatboxStatePatch {
                is_thinking: Some(true),
                thinking_duration: Some(0),
                thinking_content: Some(String::new()),
                ..Default::default()
            });
        }
        let timers = StreamTimers {
            throttle: self.timing.stream_throttle,
            tick: self.timing.thinking_tick,
        };
        let stream = ResponseStream::start(Arc::clone(&self.generation), request, target, timers);
        self.in_flight = Some(InFlight { turn, stream });
    }

    async fn finish_turn(&mut self, turn: Turn, finished: Option<FinishedResponse>) {
        match turn {
            Turn::Single => {
                if let Some(finished) = finished {
                    self.save_session_to_history(finished.thinking_for_history())
                        .await;
                }
                self.replica.set_loading(false);
                self.persist(&[PaneCacheKey::CurrentSession]).await;
            }
            Turn::Chat => {
                self.mirror_into_history();
                self.replica.set_loading(false);
                self.persist(&[PaneCacheKey::ChatMessages, PaneCacheKey::ChatSessions])
                    .await;
            }
        }
    }

    fn report_error(&mut self, target: StreamTarget, error: &PegboardError) {
        tracing::warn!(
            "[ChatboxController] {} request failed: {}",
            self.chatbox_id(),
            error
        );
        target.write_error(&mut self.replica, &format_stream_error(Some(&error.to_string())));
    }

    /// Appends the most relevant resource chunks to `base`.
    ///
    /// Any retrieval failure falls back to `base` unchanged.
    async fn augment(&self, base: &str, query: &str) -> String {
        if !self.resource.is_searchable() {
            return base.to_string();
        }
        let Some(embedding) = &self.embedding else {
            return base.to_string();
        };
        let query_embedding = match embedding.embed(&[query.to_string()]).await {
            Ok(mut vectors) if !vectors.is_empty() => vectors.swap_remove(0),
            Ok(_) => {
                tracing::warn!("[ChatboxController] Embedding returned no vector for query");
                return base.to_string();
            }
            Err(e) => {
                tracing::warn!("[ChatboxController] Retrieval skipped: {}", e);
                return base.to_string();
            }
        };

        let chunks: Vec<String> = top_chunks(
            &query_embedding,
            &self.resource.chunks,
            &self.resource.embeddings,
            CONTEXT_CHUNKS,
        )
        .into_iter()
        .map(|c| c.text)
        .collect();
        match self.prompts.with_context(base, &chunks) {
            Ok(prompt) => prompt,
            Err(e) => {
                tracing::warn!("[ChatboxController] Retrieval skipped: {}", e);
                base.to_string()
            }
        }
    }

    // ============================================================================
    // History & chat mode
    // ============================================================================

    /// Upserts the current single-turn session into the history by id.
    pub async fn save_session_to_history(&mut self, thinking: Option<(&str, u64)>) -> bool {
        let Some(session) = &self.replica.state().current_session else {
            return false;
        };
        self.history
            .upsert(HistorySession::from_session(session, thinking));
        self.persist(&[PaneCacheKey::ChatSessions]).await;
        true
    }

    fn mirror_into_history(&mut self) {
        let state = self.replica.state();
        if let Some(id) = &state.active_session_id {
            if !self.history.replace_messages(id, &state.chat_messages) {
                tracing::debug!("[ChatboxController] Active history {} not found", id);
            }
        }
    }

    /// Continues the completed single-turn response as a conversation.
    ///
    /// Requires a non-empty response whose history entry exists. Follow-up
    /// messages are sent with the refinement instructions until the next
    /// single-turn send or [`ChatboxController::exit_chat_mode`].
    pub async fn refine_in_chat(&mut self) -> bool {
        let state = self.replica.state();
        if state.is_loading {
            return false;
        }
        let Some(session) = state.current_session.clone() else {
            return false;
        };
        if session.assistant_response.is_empty() {
            return false;
        }
        let Some(entry) = self.history.get(&session.session_id) else {
            tracing::debug!(
                "[ChatboxController] No history entry for {}, cannot refine",
                session.session_id
            );
            return false;
        };
        let messages = entry.messages.clone();

        self.refine = Some(RefineContext {
            user_input: session.user_input,
            response: session.assistant_response,
        });
        self.commit_and_persist(ChatboxStatePatch {
            chat_messages: Some(messages),
            active_session_id: Some(Some(session.session_id)),
            is_chat_mode: Some(true),
            chat_input: Some(String::new()),
            active_tab: Some(ActiveTab::Main),
            ..Default::default()
        })
        .await;
        true
    }

    /// Reopens a history entry as a plain conversation.
    pub async fn open_history(&mut self, id: &str) -> bool {
        let Some(entry) = self.history.get(id) else {
            return false;
        };
        let messages = entry.messages.clone();
        self.refine = None;
        self.commit_and_persist(ChatboxStatePatch {
            active_session_id: Some(Some(id.to_string())),
            chat_messages: Some(messages),
            is_chat_mode: Some(true),
            active_tab: Some(ActiveTab::Main),
            ..Default::default()
        })
        .await;
        true
    }

    /// Back to single-turn output; the conversation stays in history.
    pub async fn exit_chat_mode(&mut self) {
        self.refine = None;
        self.commit_and_persist(ChatboxStatePatch {
            is_chat_mode: Some(false),
            active_session_id: Some(None),
            ..Default::default()
        })
        .await;
    }

    /// Drops the last exchange of the conversation after `confirm` agrees.
    pub async fn rewind(&mut self, confirm: impl FnOnce() -> bool) -> bool {
        let state = self.replica.state();
        if !state.is_chat_mode || state.is_loading || state.chat_messages.len() < 2 {
            return false;
        }
        if !confirm() {
            return false;
        }
        self.replica.update_chat_messages(|m| {
            let keep = m.len() - 2;
            m.truncate(keep);
        });
        self.mirror_into_history();
        self.persist(&[PaneCacheKey::ChatMessages, PaneCacheKey::ChatSessions])
            .await;
        true
    }

    /// Hides the response area; the session stays in history.
    pub fn hide_current_response(&mut self) -> SyncOutcome {
        self.replica.set_show_current_response(false)
    }

    // ============================================================================
    // Resource document
    // ============================================================================

    /// Replaces the resource document, chunks it and embeds every chunk.
    ///
    /// # Returns
    ///
    /// The number of embedded chunks.
    ///
    /// # Errors
    ///
    /// Returns [`PegboardError::Embedding`] when embedding fails or no
    /// embedding client is configured. The text and chunks are kept either
    /// way so [`ChatboxController::reembed_resource`] can retry.
    pub async fn load_resource(
        &mut self,
        file_name: impl Into<String>,
        text: impl Into<String>,
    ) -> Result<usize> {
        let text = text.into();
        self.resource = ResourceDocument {
            file_name: file_name.into(),
            chunks: chunk_document(&text),
            text,
            embeddings: Vec::new(),
        };
        tracing::info!(
            "[ChatboxController] {} loaded '{}' as {} chunks",
            self.chatbox_id(),
            self.resource.file_name,
            self.resource.chunks.len()
        );
        let result = self.embed_resource().await;
        self.persist(&RESOURCE_KEYS).await;
        result
    }

    /// Re-chunks and re-embeds the stored resource text.
    pub async fn reembed_resource(&mut self) -> Result<usize> {
        if self.resource.is_empty() {
            return Err(PegboardError::not_found(
                "ResourceDocument",
                self.chatbox_id(),
            ));
        }
        self.resource.chunks = chunk_document(&self.resource.text);
        self.resource.embeddings.clear();
        let result = self.embed_resource().await;
        self.persist(&RESOURCE_KEYS).await;
        result
    }

    pub async fn clear_resource(&mut self) {
        self.resource = ResourceDocument::default();
        self.persist(&RESOURCE_KEYS).await;
    }

    async fn embed_resource(&mut self) -> Result<usize> {
        let Some(embedding) = self.embedding.clone() else {
            return Err(PegboardError::embedding("No embedding client configured"));
        };
        if self.resource.chunks.is_empty() {
            return Ok(0);
        }
        let embeddings = embedding.embed(&self.resource.chunks).await?;
        if embeddings.len() != self.resource.chunks.len() {
            return Err(PegboardError::embedding(format!(
                "expected {} embeddings, got {}",
                self.resource.chunks.len(),
                embeddings.len()
            )));
        }
        self.resource.embeddings = embeddings;
        Ok(self.resource.embeddings.len())
    }

    // ============================================================================
    // Sync
    // ============================================================================

    /// Applies a message from the other window.
    ///
    /// Outgoing sync stays suppressed until the configured guard delay has
    /// passed, so reactions to the remote patch are not echoed back.
    pub async fn handle_sync(&mut self, message: &SyncMessage) -> bool {
        let Some(applied) = self.replica.apply_remote(message) else {
            return false;
        };
        if let (Some(color), Some(sink)) = (applied.effects.tint_color, &self.pane_sink) {
            sink.publish(PaneUpdate::Tint {
                chatbox_id: self.chatbox_id().to_string(),
                color,
            });
        }
        self.persist(&cached_keys(&applied.patch)).await;
        let _release = applied.scope.release_after(self.timing.sync_guard_delay);
        true
    }

    /// Guard held while remote patches apply; await
    /// [`SyncGuard::settled`] before [`Self::flush_deferred_sync`].
    pub fn sync_guard(&self) -> SyncGuard {
        self.replica.endpoint().guard().clone()
    }

    pub fn has_deferred_sync(&self) -> bool {
        self.replica.has_deferred()
    }

    /// Sends edits made while a remote patch was applying.
    pub fn flush_deferred_sync(&mut self) -> Option<SyncOutcome> {
        self.replica.flush_deferred()
    }

    /// Payload a floating window of this chatbox is initialised from.
    pub fn window_data(&self, name: impl Into<String>) -> WindowData {
        let state = self.replica.state();
        WindowData {
            name: name.into(),
            model: state.model.clone(),
            system_prompt: state.system_prompt.clone(),
            tint_color: state.tint_color.clone(),
            api_keys: self.api_keys.clone(),
            current_response: state.current_response().map(str::to_string),
            chat_messages: state.chat_messages.clone(),
            is_chat_mode: state.is_chat_mode,
        }
    }

    /// Initialises a floating replica from the main window's payload.
    pub fn adopt_window_data(&mut self, data: WindowData) {
        let current_session = data.current_response.map(|response| {
            let mut session = ChatSession::new("");
            session.assistant_response = response;
            session
        });
        self.api_keys = data.api_keys;
        self.replica.commit_local(&ChatboxStatePatch {
            model: Some(data.model),
            system_prompt: Some(data.system_prompt),
            tint_color: Some(data.tint_color),
            chat_messages: Some(data.chat_messages),
            is_chat_mode: Some(data.is_chat_mode),
            current_session: Some(current_session),
            ..Default::default()
        });
    }

    // ============================================================================
    // Synced setters
    // ============================================================================

    pub fn set_input(&mut self, input: impl Into<String>) -> SyncOutcome {
        self.replica.set_input(input)
    }

    pub fn set_chat_input(&mut self, input: impl Into<String>) -> SyncOutcome {
        self.replica.set_chat_input(input)
    }

    pub fn set_active_tab(&mut self, tab: ActiveTab) -> SyncOutcome {
        self.replica.set_active_tab(tab)
    }

    pub fn set_system_prompt(&mut self, prompt: impl Into<String>) -> SyncOutcome {
        self.replica.set_system_prompt(prompt)
    }

    pub fn set_model(&mut self, model: impl Into<String>) -> SyncOutcome {
        self.replica.set_model(model)
    }

    /// Changes the tint here, in the other window and on the canvas pane.
    pub fn set_tint_color(&mut self, color: impl Into<String>) -> SyncOutcome {
        let color = color.into();
        if let Some(sink) = &self.pane_sink {
            sink.publish(PaneUpdate::Tint {
                chatbox_id: self.chatbox_id().to_string(),
                color: color.clone(),
            });
        }
        self.replica.set_tint_color(color)
    }

    pub async fn set_thinking_level(&mut self, level: ThinkingLevel) -> SyncOutcome {
        self.commit_and_persist(ChatboxStatePatch {
            thinking_level: Some(level),
            ..Default::default()
        })
        .await
    }
}

/// Pane cache keys touched by `patch`.
fn cached_keys(patch: &ChatboxStatePatch) -> Vec<PaneCacheKey> {
    let mut keys = Vec::new();
    if patch.is_chat_mode.is_some() {
        keys.push(PaneCacheKey::IsChatMode);
    }
    if patch.current_session.is_some() {
        keys.push(PaneCacheKey::CurrentSession);
    }
    if patch.chat_messages.is_some() {
        keys.push(PaneCacheKey::ChatMessages);
    }
    if patch.active_session_id.is_some() {
        keys.push(PaneCacheKey::ActiveSessionId);
    }
    if patch.thinking_level.is_some() {
        keys.push(PaneCacheKey::ThinkingLevel);
    }
    keys
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pegboard_core::canvas::PaneUpdate;
    use pegboard_core::chat::MessageRole;
    use pegboard_core::generation::{GenerationOutput, StreamSink};
    use pegboard_core::pane_cache::PaneLocalState;
    use pegboard_core::stream::StreamEventKind;
    use pegboard_core::sync::{SyncEndpoint, SyncTransport, WindowSide};
    use std::collections::HashMap;
    use std::sync::Mutex;
    use tokio::sync::mpsc;

    // Mock GenerationClient that replays a fixed script
    #[derive(Default)]
    struct ScriptedClient {
        events: Vec<StreamEventKind>,
        text: String,
        failure: Option<String>,
        step: Duration,
        requests: Mutex<Vec<GenerationRequest>>,
    }

    impl ScriptedClient {
        fn replying(text: &str) -> Self {
            Self {
                text: text.to_string(),
                ..Default::default()
            }
        }

        fn streaming(events: Vec<StreamEventKind>) -> Self {
            Self {
                events,
                ..Default::default()
            }
        }

        fn requests(&self) -> Vec<GenerationRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl GenerationClient for ScriptedClient {
        async fn generate(
            &self,
            request: GenerationRequest,
            sink: StreamSink,
        ) -> Result<GenerationOutput> {
            self.requests.lock().unwrap().push(request.clone());
            if let Some(failure) = &self.failure {
                return Err(PegboardError::generation(failure.clone()));
            }
            if request.streaming {
                for kind in &self.events {
                    if !self.step.is_zero() {
                        tokio::time::sleep(self.step).await;
                    }
                    sink.emit(kind.clone());
                }
            }
            Ok(GenerationOutput {
                text: self.text.clone(),
                streaming: request.streaming,
            })
        }
    }

    // Mock EmbeddingClient: one dimension per animal
    struct AnimalEmbedding {
        fail: bool,
    }

    #[async_trait]
    impl EmbeddingClient for AnimalEmbedding {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            if self.fail {
                return Err(PegboardError::embedding("offline"));
            }
            Ok(texts
                .iter()
                .map(|t| {
                    let t = t.to_lowercase();
                    vec![
                        if t.contains("cat") { 1.0 } else { 0.0 },
                        if t.contains("dog") { 1.0 } else { 0.0 },
                    ]
                })
                .collect())
        }
    }

    // In-memory PaneCache
    #[derive(Default)]
    struct MemoryCache {
        entries: Mutex<HashMap<(String, PaneCacheKey), serde_json::Value>>,
    }

    #[async_trait]
    impl PaneCache for MemoryCache {
        async fn load(&self, chatbox_id: &str) -> Result<PaneLocalState> {
            let mut state = PaneLocalState::default();
            for ((id, key), value) in self.entries.lock().unwrap().iter() {
                if id == chatbox_id {
                    state.insert(*key, value.clone());
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
            self.entries
                .lock()
                .unwrap()
                .insert((chatbox_id.to_string(), key), value);
            Ok(())
        }

        async fn clear(&self, chatbox_id: &str) -> Result<()> {
            self.entries.lock().unwrap().retain(|(id, _), _| id != chatbox_id);
            Ok(())
        }
    }

    #[derive(Default)]
    struct Wire {
        sent: Mutex<Vec<SyncMessage>>,
    }

    impl SyncTransport for Wire {
        fn send(&self, message: SyncMessage) -> Result<()> {
            self.sent.lock().unwrap().push(message);
            Ok(())
        }
    }

    fn keys() -> ApiKeys {
        ApiKeys {
            openai: "sk-test".into(),
            ..Default::default()
        }
    }

    fn state() -> ChatboxState {
        ChatboxState::new("You are a helpful assistant.", "gpt-4", "#3b82f6")
    }

    fn controller(client: Arc<ScriptedClient>, streaming: bool) -> ChatboxController {
        let replica = ChatboxReplica::new(state(), SyncEndpoint::detached("c1"));
        ChatboxController::new(replica, client)
            .with_api_keys(keys())
            .with_streaming(streaming)
    }

    #[tokio::test]
    async fn test_single_turn_non_streaming() {
        let client = Arc::new(ScriptedClient::replying("Hi there"));
        let mut ctl = controller(client.clone(), false);
        ctl.set_input("Hello");

        assert!(ctl.send().await);

        let state = ctl.state();
        assert_eq!(state.current_response(), Some("Hi there"));
        assert!(!state.is_loading);
        assert!(state.input.is_empty());
        assert_eq!(ctl.history().len(), 1);
        assert_eq!(ctl.history().as_slice()[0].title, "Hello");

        let requests = client.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(
            requests[0].payload,
            GenerationPayload::UserMessage("Hello".into())
        );
        assert!(requests[0].request_id.starts_with("req_"));
        assert_eq!(requests[0].thinking_level, None);
    }

    #[tokio::test]
    async fn test_send_requires_input_and_idle() {
        let client = Arc::new(ScriptedClient::replying("unused"));
        let mut ctl = controller(client.clone(), false);
        ctl.set_input("   ");
        assert!(!ctl.send().await);

        ctl.set_input("Hello");
        ctl.replica.set_loading(true);
        assert!(!ctl.send().await);
        assert!(client.requests().is_empty());
    }

    #[tokio::test]
    async fn test_streaming_single_turn_accumulates() {
        let client = Arc::new(ScriptedClient::streaming(vec![
            StreamEventKind::Thinking("a".into()),
            StreamEventKind::Thinking("b".into()),
            StreamEventKind::Chunk("x".into()),
            StreamEventKind::Chunk("y".into()),
            StreamEventKind::Complete,
        ]));
        let mut ctl = controller(client, true);
        ctl.set_input("Hello");
        ctl.send().await;

        let state = ctl.state();
        assert_eq!(state.current_response(), Some("xy"));
        assert_eq!(state.thinking_content, "ab");
        assert!(!state.is_thinking);
        assert!(!state.is_loading);

        let entry = &ctl.history().as_slice()[0];
        assert_eq!(entry.messages[1].content, "xy");
        assert_eq!(entry.messages[1].thinking_content.as_deref(), Some("ab"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_thinking_duration_counts_whole_seconds() {
        let client = Arc::new(ScriptedClient {
            events: vec![
                StreamEventKind::Thinking("hmm".into()),
                StreamEventKind::Chunk("done".into()),
                StreamEventKind::Complete,
            ],
            step: Duration::from_millis(1100),
            ..Default::default()
        });
        let mut ctl = controller(client, true);
        ctl.set_input("Hello");
        ctl.send().await;

        // First chunk arrives 2.2s after the request started.
        assert_eq!(ctl.state().thinking_duration, 2);
        assert_eq!(ctl.state().current_response(), Some("done"));
    }

    #[tokio::test]
    async fn test_completion_without_terminal_event() {
        let client = Arc::new(ScriptedClient::streaming(vec![StreamEventKind::Chunk(
            "partial".into(),
        )]));
        let mut ctl = controller(client, true);
        ctl.set_input("Hello");
        ctl.send().await;

        assert_eq!(ctl.state().current_response(), Some("partial"));
        assert_eq!(ctl.history().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_edits_land_while_response_streams() {
        let client = Arc::new(ScriptedClient {
            events: vec![
                StreamEventKind::Chunk("x".into()),
                StreamEventKind::Chunk("y".into()),
                StreamEventKind::Complete,
            ],
            step: Duration::from_millis(100),
            ..Default::default()
        });
        let wire = Arc::new(Wire::default());
        let endpoint = SyncEndpoint::new("c1", WindowSide::Hosted, Some(wire.clone()));
        endpoint.set_counterpart_present(true);
        let mut ctl = ChatboxController::new(ChatboxReplica::new(state(), endpoint), client)
            .with_api_keys(keys());
        ctl.set_input("Hello");

        assert!(ctl.begin_send().await);
        assert!(ctl.is_responding());
        assert!(ctl.state().is_loading);

        let step = ctl.next_response_step().await;
        ctl.apply_response_step(step).await;

        // The user types and the other window edits the prompt mid-response.
        assert_eq!(ctl.set_input("next question"), SyncOutcome::Sent);
        let remote = SyncMessage {
            chatbox_id: "c1".into(),
            state: ChatboxStatePatch {
                system_prompt: Some("Be brief.".into()),
                ..Default::default()
            },
            from_widget: true,
        };
        assert!(ctl.handle_sync(&remote).await);
        assert!(ctl.is_responding());
        assert_eq!(ctl.state().input, "next question");
        assert_eq!(ctl.state().system_prompt, "Be brief.");
        assert!(
            wire.sent
                .lock()
                .unwrap()
                .iter()
                .any(|m| m.state.input.as_deref() == Some("next question"))
        );

        ctl.complete_response().await;
        assert!(!ctl.is_responding());
        let state = ctl.state();
        assert_eq!(state.current_response(), Some("xy"));
        assert_eq!(state.input, "next question");
        assert_eq!(state.system_prompt, "Be brief.");
        assert!(!state.is_loading);
        assert_eq!(ctl.history().len(), 1);
    }

    #[tokio::test]
    async fn test_idle_controller_has_no_response_step() {
        let mut ctl = controller(Arc::new(ScriptedClient::default()), true);
        assert!(!ctl.is_responding());
        let step = tokio::time::timeout(Duration::from_millis(10), ctl.next_response_step()).await;
        assert!(step.is_err());
    }

    #[tokio::test]
    async fn test_missing_credential_fails_before_dispatch() {
        let client = Arc::new(ScriptedClient::replying("unused"));
        let mut ctl = controller(client.clone(), true);
        ctl.set_model("claude-3-opus");
        ctl.set_input("Hello");
        ctl.send().await;

        assert_eq!(
            ctl.state().current_response(),
            Some("Error: Claude API key is not configured. Please add it in Settings.")
        );
        assert!(!ctl.state().is_loading);
        assert!(client.requests().is_empty());
        assert!(ctl.history().is_empty());
    }

    #[tokio::test]
    async fn test_thinking_level_only_for_supporting_models() {
        let client = Arc::new(ScriptedClient::replying("ok"));
        let mut ctl = controller(client.clone(), false).with_api_keys(ApiKeys {
            gemini: "g-key".into(),
            ..Default::default()
        });
        ctl.set_model("gemini-3-pro");
        ctl.set_thinking_level(ThinkingLevel::Low).await;
        ctl.set_input("Hello");
        ctl.send().await;

        let requests = client.requests();
        let request = &requests[0];
        assert_eq!(request.api_key, "g-key");
        assert_eq!(request.thinking_level, Some(ThinkingLevel::Low));
    }

    async fn completed_single_turn(client: Arc<ScriptedClient>) -> ChatboxController {
        let mut ctl = controller(client, false);
        ctl.set_input("Hello");
        ctl.send().await;
        ctl
    }

    #[tokio::test]
    async fn test_refine_enters_chat_with_history() {
        let client = Arc::new(ScriptedClient::replying("Hi there"));
        let mut ctl = completed_single_turn(client.clone()).await;
        let session_id = ctl.state().current_session.clone().unwrap().session_id;

        assert!(ctl.refine_in_chat().await);
        assert!(ctl.state().is_chat_mode);
        assert_eq!(ctl.state().chat_messages.len(), 2);
        assert_eq!(ctl.state().active_session_id.as_deref(), Some(session_id.as_str()));

        ctl.set_chat_input("Shorter please");
        assert!(ctl.send_chat().await);

        let messages = &ctl.state().chat_messages;
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[3].role, MessageRole::Assistant);
        assert_eq!(messages[3].content, "Hi there");
        assert_eq!(ctl.history().get(&session_id).unwrap().messages.len(), 4);

        let request = client.requests().pop().unwrap();
        assert!(request.system_prompt.contains("REFINEMENT MODE"));
        assert!(request.system_prompt.contains("Original user input: \"Hello\""));
        match request.payload {
            GenerationPayload::Conversation(sent) => assert_eq!(sent.len(), 3),
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_fresh_send_clears_refine_context() {
        let client = Arc::new(ScriptedClient::replying("Hi there"));
        let mut ctl = completed_single_turn(client).await;
        ctl.refine_in_chat().await;
        assert!(ctl.refine_context().is_some());

        ctl.set_input("Something new");
        ctl.send().await;
        assert!(ctl.refine_context().is_none());
        assert!(!ctl.state().is_chat_mode);
        assert!(ctl.state().chat_messages.is_empty());
        assert_eq!(ctl.history().len(), 2);
    }

    #[tokio::test]
    async fn test_open_history_has_no_refine_context() {
        let client = Arc::new(ScriptedClient::replying("Hi there"));
        let mut ctl = completed_single_turn(client).await;
        let id = ctl.history().as_slice()[0].id.clone();
        ctl.set_active_tab(ActiveTab::History);

        assert!(ctl.open_history(&id).await);
        assert!(ctl.refine_context().is_none());
        assert_eq!(ctl.state().active_tab, ActiveTab::Main);
        assert_eq!(ctl.state().chat_messages.len(), 2);
        assert!(!ctl.open_history("missing").await);
    }

    #[tokio::test]
    async fn test_streaming_chat_fills_placeholder() {
        let client = Arc::new(ScriptedClient::streaming(vec![
            StreamEventKind::Chunk("Hi".into()),
            StreamEventKind::Complete,
        ]));
        let mut ctl = controller(client, true);
        ctl.replica.set_chat_mode(true);
        ctl.set_chat_input("Hello");
        ctl.send_chat().await;

        let messages = &ctl.state().chat_messages;
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].content, "Hi");
    }

    #[tokio::test]
    async fn test_chat_error_replaces_placeholder() {
        let client = Arc::new(ScriptedClient::streaming(vec![StreamEventKind::Error(
            Some("rate limited".into()),
        )]));
        let mut ctl = controller(client, true);
        ctl.replica.set_chat_mode(true);
        ctl.set_chat_input("Hello");
        ctl.send_chat().await;

        let messages = &ctl.state().chat_messages;
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].content, "Error: rate limited");
        assert!(!ctl.state().is_loading);
        assert!(!ctl.state().is_thinking);
    }

    #[tokio::test]
    async fn test_chat_provider_error_is_appended() {
        let client = Arc::new(ScriptedClient {
            failure: Some("bad gateway".into()),
            ..Default::default()
        });
        let mut ctl = controller(client, false);
        ctl.replica.set_chat_mode(true);
        ctl.set_chat_input("Hello");
        ctl.send_chat().await;

        let messages = &ctl.state().chat_messages;
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, MessageRole::User);
        assert_eq!(messages[1].content, "Error: bad gateway");
    }

    #[tokio::test]
    async fn test_rewind_drops_last_exchange() {
        let client = Arc::new(ScriptedClient::replying("Hi there"));
        let mut ctl = completed_single_turn(client).await;
        ctl.refine_in_chat().await;
        ctl.set_chat_input("again");
        ctl.send_chat().await;
        let id = ctl.state().active_session_id.clone().unwrap();

        assert!(!ctl.rewind(|| false).await);
        assert_eq!(ctl.state().chat_messages.len(), 4);

        assert!(ctl.rewind(|| true).await);
        assert_eq!(ctl.state().chat_messages.len(), 2);
        assert_eq!(ctl.history().get(&id).unwrap().messages.len(), 2);
    }

    #[tokio::test]
    async fn test_save_session_twice_keeps_one_entry() {
        let client = Arc::new(ScriptedClient::replying("first"));
        let mut ctl = completed_single_turn(client).await;
        ctl.replica
            .update_current_session(|s| s.assistant_response = "second".into());

        assert!(ctl.save_session_to_history(None).await);
        assert_eq!(ctl.history().len(), 1);
        assert_eq!(ctl.history().as_slice()[0].messages[1].content, "second");
    }

    const NOTES: &str = "# Cats\n\
        Cats are small domesticated mammals that purr and nap all day long.\n\
        # Dogs\n\
        Dogs are loyal and friendly animals that love long walks in the park.\n";

    #[tokio::test]
    async fn test_retrieval_adds_best_chunks() {
        let client = Arc::new(ScriptedClient::replying("ok"));
        let mut ctl = controller(client.clone(), false)
            .with_embedding(Arc::new(AnimalEmbedding { fail: false }));
        assert_eq!(ctl.load_resource("notes.md", NOTES).await.unwrap(), 2);

        ctl.set_input("Tell me about cats");
        ctl.send().await;

        let requests = client.requests();
        let prompt = &requests[0].system_prompt;
        assert!(prompt.starts_with("You are a helpful assistant.\n\n---\n"));
        assert!(prompt.contains("[Context 1]:\n# Cats"));
        assert!(prompt.contains("[Context 2]:\n# Dogs"));
    }

    #[tokio::test]
    async fn test_retrieval_failure_keeps_prompt() {
        let client = Arc::new(ScriptedClient::replying("ok"));
        let mut ctl = controller(client.clone(), false);
        ctl.resource = ResourceDocument {
            file_name: "notes.md".into(),
            text: NOTES.into(),
            chunks: vec!["cats".into()],
            embeddings: vec![vec![1.0, 0.0]],
        };
        ctl.embedding = Some(Arc::new(AnimalEmbedding { fail: true }));

        ctl.set_input("Tell me about cats");
        ctl.send().await;
        assert_eq!(
            client.requests()[0].system_prompt,
            "You are a helpful assistant."
        );
        assert_eq!(ctl.state().current_response(), Some("ok"));
    }

    #[tokio::test]
    async fn test_failed_embedding_keeps_text_for_retry() {
        let client = Arc::new(ScriptedClient::replying("ok"));
        let mut ctl = controller(client, false)
            .with_embedding(Arc::new(AnimalEmbedding { fail: true }));
        let err = ctl.load_resource("notes.md", NOTES).await.unwrap_err();
        assert!(matches!(err, PegboardError::Embedding(_)));
        assert_eq!(ctl.resource().chunks.len(), 2);
        assert!(!ctl.resource().is_searchable());

        ctl.embedding = Some(Arc::new(AnimalEmbedding { fail: false }));
        assert_eq!(ctl.reembed_resource().await.unwrap(), 2);
        assert!(ctl.resource().is_searchable());
    }

    #[tokio::test]
    async fn test_restore_from_cache() {
        let cache = Arc::new(MemoryCache::default());
        let client = Arc::new(ScriptedClient::replying("Hi there"));
        let mut first = controller(client.clone(), false).with_cache(cache.clone());
        first.set_input("Hello");
        first.send().await;
        first.refine_in_chat().await;

        let mut second = controller(client, false).with_cache(cache);
        second.restore().await;
        assert!(second.state().is_chat_mode);
        assert_eq!(second.state().chat_messages.len(), 2);
        assert_eq!(second.state().current_response(), Some("Hi there"));
        assert_eq!(second.history().len(), 1);
        assert_eq!(
            second.state().active_session_id,
            first.state().active_session_id
        );
    }

    #[tokio::test]
    async fn test_pending_input_auto_send_is_not_streamed() {
        let client = Arc::new(ScriptedClient::replying("Hi there"));
        let mut ctl = controller(client.clone(), true);
        ctl.set_active_tab(ActiveTab::Settings);

        let sent = ctl
            .accept_pending_input(PendingInput {
                text: "Hello".into(),
                auto_send: true,
            })
            .await;
        assert!(sent);
        assert_eq!(ctl.state().active_tab, ActiveTab::Main);
        assert!(!client.requests()[0].streaming);
        assert_eq!(ctl.state().current_response(), Some("Hi there"));
    }

    #[tokio::test]
    async fn test_remote_tint_reaches_canvas() {
        let (tx, mut rx) = mpsc::unbounded_channel::<PaneUpdate>();
        let wire = Arc::new(Wire::default());
        let endpoint = SyncEndpoint::new("c1", WindowSide::Hosted, Some(wire.clone()));
        endpoint.set_counterpart_present(true);
        let mut ctl = ChatboxController::new(
            ChatboxReplica::new(state(), endpoint),
            Arc::new(ScriptedClient::default()),
        )
        .with_pane_sink(Arc::new(tx));

        let message = SyncMessage {
            chatbox_id: "c1".into(),
            state: ChatboxStatePatch {
                tint_color: Some("#ec4899".into()),
                ..Default::default()
            },
            from_widget: true,
        };
        assert!(ctl.handle_sync(&message).await);
        assert_eq!(ctl.state().tint_color, "#ec4899");
        assert_eq!(
            rx.try_recv().unwrap(),
            PaneUpdate::Tint {
                chatbox_id: "c1".into(),
                color: "#ec4899".into()
            }
        );

        // Our own role's message looped back is ignored.
        let echo = SyncMessage {
            from_widget: false,
            ..message
        };
        assert!(!ctl.handle_sync(&echo).await);
        assert!(wire.sent.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_edit_during_guard_is_flushed_after_settle() {
        let wire = Arc::new(Wire::default());
        let endpoint = SyncEndpoint::new("c1", WindowSide::Floating, Some(wire.clone()));
        let mut ctl = ChatboxController::new(
            ChatboxReplica::new(state(), endpoint),
            Arc::new(ScriptedClient::default()),
        );
        let message = SyncMessage {
            chatbox_id: "c1".into(),
            state: ChatboxStatePatch {
                is_loading: Some(true),
                ..Default::default()
            },
            from_widget: false,
        };
        assert!(ctl.handle_sync(&message).await);
        assert_eq!(ctl.set_input("typed"), SyncOutcome::Suppressed);
        assert!(ctl.has_deferred_sync());
        assert!(wire.sent.lock().unwrap().is_empty());

        ctl.sync_guard().settled().await;
        assert_eq!(ctl.flush_deferred_sync(), Some(SyncOutcome::Sent));
        assert!(!ctl.has_deferred_sync());
        let sent = wire.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].state.input.as_deref(), Some("typed"));
    }

    #[tokio::test]
    async fn test_window_data_reflects_state() {
        let client = Arc::new(ScriptedClient::replying("Hi there"));
        let ctl = completed_single_turn(client.clone()).await;
        let data = ctl.window_data("Agent 1");
        assert_eq!(data.name, "Agent 1");
        assert_eq!(data.current_response.as_deref(), Some("Hi there"));
        assert_eq!(data.api_keys, keys());

        let floating = SyncEndpoint::new("c1", WindowSide::Floating, None);
        let mut widget = ChatboxController::new(ChatboxReplica::new(state(), floating), client);
        widget.adopt_window_data(data);
        assert_eq!(widget.state().current_response(), Some("Hi there"));
    }
}
