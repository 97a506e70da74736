//! Canvas use cases: the single gatekeeper for pane geometry.
//!
//! `CanvasService` owns the [`AppSnapshot`]. Every mutation goes through it
//! so the non-overlap rule is checked in one place, and every committed
//! change schedules a debounced snapshot write when autosave is enabled.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use pegboard_core::canvas::{
    AppSnapshot, Canvas, ChatBoxPane, ChatBoxUpdate, GeometryCommit, PaneUpdate, PendingInput,
    SnapshotRepository, TINT_PALETTE, TextBoxPane, TextBoxUpdate,
};
use pegboard_core::canvas::model::{CHAT_DEFAULT_SIZE, TEXT_DEFAULT_SIZE};
use pegboard_core::config::PegboardConfig;
use pegboard_core::layout::{
    ContainerSize, GridPoint, PaneKey, PaneKind, Viewport, WheelInput, WheelOutcome,
    find_free_position,
};
use pegboard_core::provider::Provider;
use pegboard_core::sync::SyncEndpoint;
use pegboard_infrastructure::{BlockingStore, DebouncedWriter};
use rand::seq::SliceRandom;
use uuid::Uuid;

/// Height of the canvas tab strip excluded from the viewport area.
pub const TAB_STRIP_PX: f64 = 40.0;

/// Canvas list, pane records, drag state and viewport of the main window.
pub struct CanvasService {
    snapshot: AppSnapshot,
    dragging: Option<PaneKey>,
    viewport: Viewport,
    retention: Option<Duration>,
    writer: Option<DebouncedWriter<AppSnapshot>>,
    endpoints: HashMap<String, SyncEndpoint>,
    open_widgets: HashSet<String>,
}

impl CanvasService {
    pub fn new(snapshot: AppSnapshot, config: &PegboardConfig) -> Self {
        Self {
            snapshot,
            dragging: None,
            viewport: Viewport::new(
                f64::from(config.grid_size_px),
                config.pan_gesture_idle(),
                config.scroll_highlight(),
            ),
            retention: config.archived_retention(),
            writer: None,
            endpoints: HashMap::new(),
            open_widgets: HashSet::new(),
        }
    }

    /// Loads the stored snapshot and purges expired archived panes.
    ///
    /// A missing snapshot yields the default single-canvas document. An
    /// unreadable one is logged and replaced by the default as well, since
    /// the canvas must always open.
    pub async fn restore(repository: &dyn SnapshotRepository, config: &PegboardConfig) -> Self {
        let snapshot = match repository.load().await {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => {
                tracing::info!("[CanvasService] No saved snapshot, starting fresh");
                AppSnapshot::default()
            }
            Err(e) => {
                tracing::error!("[CanvasService] Failed to load snapshot: {}", e);
                AppSnapshot::default()
            }
        };

        let mut service = Self::new(snapshot, config);
        service.ensure_active_canvas();
        if let Some(retention) = service.retention {
            let purged = service.purge_archived(retention);
            if purged > 0 {
                tracing::info!("[CanvasService] Purged {} expired archived panes", purged);
            }
        }
        service
    }

    /// Schedules a debounced write to `store` after every change.
    pub fn with_autosave(
        mut self,
        store: Arc<dyn BlockingStore<AppSnapshot>>,
        debounce: Duration,
    ) -> Self {
        self.writer = Some(DebouncedWriter::spawn("SnapshotWriter", store, debounce));
        self
    }

    pub fn snapshot(&self) -> &AppSnapshot {
        &self.snapshot
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn dragging(&self) -> Option<&PaneKey> {
        self.dragging.as_ref()
    }

    pub fn active_canvas(&self) -> Option<&Canvas> {
        self.snapshot.active_canvas()
    }

    fn active_canvas_mut(&mut self) -> Option<&mut Canvas> {
        let id = self.snapshot.active_canvas_id.clone();
        self.snapshot.canvases.iter_mut().find(|c| c.id == id)
    }

    fn ensure_active_canvas(&mut self) {
        if self.snapshot.canvases.is_empty() {
            self.snapshot = AppSnapshot::default();
            return;
        }
        if self.snapshot.active_canvas().is_none() {
            self.snapshot.active_canvas_id = self.snapshot.canvases[0].id.clone();
        }
    }

    fn purge_archived(&mut self, retention: Duration) -> usize {
        let retention_ms = i64::try_from(retention.as_millis()).unwrap_or(i64::MAX);
        let cutoff = Utc::now().timestamp_millis().saturating_sub(retention_ms);
        self.snapshot
            .canvases
            .iter_mut()
            .map(|c| c.purge_archived_before(cutoff))
            .sum()
    }

    fn touch(&self) {
        if let Some(writer) = &self.writer {
            writer.schedule(self.snapshot.clone());
        }
    }

    // ============================================================================
    // Canvases
    // ============================================================================

    /// Adds an empty canvas named `Canvas <n>` and makes it active.
    ///
    /// `n` follows the highest number in use, so names stay unique after
    /// deletions.
    pub fn add_canvas(&mut self) -> String {
        let id = Uuid::new_v4().to_string();
        let names = self.snapshot.canvases.iter().map(|c| c.name.as_str());
        let name = next_numbered_name("Canvas", names);
        self.snapshot.canvases.push(Canvas::new(id.clone(), name));
        self.snapshot.active_canvas_id = id.clone();
        self.touch();
        id
    }

    pub fn rename_canvas(&mut self, id: &str, name: impl Into<String>) -> bool {
        let Some(canvas) = self.snapshot.canvases.iter_mut().find(|c| c.id == id) else {
            return false;
        };
        canvas.name = name.into();
        self.touch();
        true
    }

    /// Deletes a canvas. The last remaining canvas cannot be deleted.
    pub fn delete_canvas(&mut self, id: &str) -> bool {
        if self.snapshot.canvases.len() <= 1 {
            tracing::debug!("[CanvasService] Refusing to delete the last canvas");
            return false;
        }
        let before = self.snapshot.canvases.len();
        self.snapshot.canvases.retain(|c| c.id != id);
        if self.snapshot.canvases.len() == before {
            return false;
        }
        if self.snapshot.active_canvas_id == id {
            self.snapshot.active_canvas_id = self.snapshot.canvases[0].id.clone();
        }
        self.dragging = None;
        self.touch();
        true
    }

    pub fn switch_canvas(&mut self, id: &str) -> bool {
        if !self.snapshot.canvases.iter().any(|c| c.id == id) {
            return false;
        }
        self.snapshot.active_canvas_id = id.to_string();
        self.dragging = None;
        self.touch();
        true
    }

    // ============================================================================
    // Panes
    // ============================================================================

    /// Places a new chatbox at the first free cell of the active canvas.
    ///
    /// The tint is picked at random from [`TINT_PALETTE`]. Adding a pane
    /// unlocks the canvas.
    pub fn add_chat_box(&mut self) -> Option<String> {
        let tint = TINT_PALETTE
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or(TINT_PALETTE[0]);
        let id = Uuid::new_v4().to_string();
        let canvas = self.active_canvas_mut()?;
        let (width, height) = CHAT_DEFAULT_SIZE;
        let at = find_free_position(&canvas.placed_panes(), width, height);
        let name = next_numbered_name("Agent", canvas.chat_boxes.iter().map(|b| b.name.as_str()));
        canvas
            .chat_boxes
            .push(ChatBoxPane::new(id.clone(), name, at, tint));
        tracing::info!("[CanvasService] Added chatbox {} at ({}, {})", id, at.x, at.y);

        self.snapshot.is_locked = false;
        self.touch();
        Some(id)
    }

    pub fn add_text_box(&mut self) -> Option<String> {
        let id = Uuid::new_v4().to_string();
        let canvas = self.active_canvas_mut()?;
        let (width, height) = TEXT_DEFAULT_SIZE;
        let at = find_free_position(&canvas.placed_panes(), width, height);
        canvas.text_boxes.push(TextBoxPane::new(id.clone(), at));
        tracing::info!("[CanvasService] Added text box {} at ({}, {})", id, at.x, at.y);

        self.snapshot.is_locked = false;
        self.touch();
        Some(id)
    }

    /// Applies a chatbox record update on the active canvas.
    ///
    /// # Returns
    ///
    /// [`GeometryCommit::Rejected`] when the new geometry would overlap
    /// another live pane; nothing is changed in that case.
    pub fn update_chat_box(&mut self, id: &str, update: &ChatBoxUpdate) -> GeometryCommit {
        let dragging = self.dragging.clone();
        let Some(canvas) = self.active_canvas_mut() else {
            return GeometryCommit::NotFound;
        };
        let commit = canvas.apply_chat_update(id, update, dragging.as_ref());
        self.after_commit(commit, || format!("chatbox {id}"))
    }

    pub fn update_text_box(&mut self, id: &str, update: &TextBoxUpdate) -> GeometryCommit {
        let dragging = self.dragging.clone();
        let Some(canvas) = self.active_canvas_mut() else {
            return GeometryCommit::NotFound;
        };
        let commit = canvas.apply_text_update(id, update, dragging.as_ref());
        self.after_commit(commit, || format!("text box {id}"))
    }

    fn after_commit(
        &self,
        commit: GeometryCommit,
        what: impl FnOnce() -> String,
    ) -> GeometryCommit {
        match commit {
            GeometryCommit::Committed => self.touch(),
            GeometryCommit::Rejected => {
                tracing::debug!("[CanvasService] Rejected overlapping update of {}", what());
            }
            GeometryCommit::NotFound => {
                tracing::debug!("[CanvasService] Update for unknown {}", what());
            }
        }
        commit
    }

    /// Marks `key` as the pane being dragged.
    ///
    /// Refused while the canvas or the pane is locked.
    pub fn begin_drag(&mut self, key: PaneKey) -> bool {
        if self.snapshot.is_locked {
            return false;
        }
        let Some(canvas) = self.active_canvas() else {
            return false;
        };
        if canvas.rect_of(&key).is_none() || canvas.is_pane_locked(&key) {
            return false;
        }
        self.dragging = Some(key);
        true
    }

    /// Moves the dragged pane; overlap is allowed until the drag ends.
    pub fn drag_to(&mut self, point: GridPoint) -> GeometryCommit {
        let Some(key) = self.dragging.clone() else {
            return GeometryCommit::NotFound;
        };
        match key.kind {
            PaneKind::Chat => self.update_chat_box(&key.id, &ChatBoxUpdate::move_to(point)),
            PaneKind::Text => self.update_text_box(&key.id, &TextBoxUpdate::move_to(point)),
        }
    }

    /// Ends the drag and snaps the pane to the nearest free cell.
    pub fn end_drag(&mut self) -> Option<GridPoint> {
        let key = self.dragging.take()?;
        let snapped = self.active_canvas_mut()?.snap_to_free(&key);
        if let Some(point) = snapped {
            tracing::debug!(
                "[CanvasService] Drag of {} ended at ({}, {})",
                key.id,
                point.x,
                point.y
            );
            self.touch();
        }
        snapped
    }

    /// Archives a pane once `confirm` agrees.
    pub fn archive_pane(&mut self, key: &PaneKey, confirm: impl FnOnce() -> bool) -> bool {
        if !confirm() {
            return false;
        }
        let now = Utc::now().timestamp_millis();
        let Some(canvas) = self.active_canvas_mut() else {
            return false;
        };
        if !canvas.archive(key, now) {
            return false;
        }
        if self.dragging.as_ref() == Some(key) {
            self.dragging = None;
        }
        self.touch();
        true
    }

    /// Restores an archived pane at the nearest free cell.
    pub fn unarchive_pane(&mut self, key: &PaneKey) -> Option<GridPoint> {
        let point = self.active_canvas_mut()?.unarchive(key)?;
        self.touch();
        Some(point)
    }

    /// Delivers text to another chatbox ("send to window").
    pub fn send_to_window(
        &mut self,
        chatbox_id: &str,
        text: impl Into<String>,
        auto_send: bool,
    ) -> bool {
        let update = ChatBoxUpdate {
            pending_input: Some(Some(PendingInput {
                text: text.into(),
                auto_send,
            })),
            ..Default::default()
        };
        self.update_chat_box(chatbox_id, &update) == GeometryCommit::Committed
    }

    /// Takes and clears the pending input of a chatbox.
    pub fn take_pending_input(&mut self, chatbox_id: &str) -> Option<PendingInput> {
        let pending = self
            .active_canvas()?
            .chat_box(chatbox_id)?
            .pending_input
            .clone()?;
        let clear = ChatBoxUpdate {
            pending_input: Some(None),
            ..Default::default()
        };
        self.update_chat_box(chatbox_id, &clear);
        Some(pending)
    }

    /// Applies a pane record change raised by a chatbox replica.
    ///
    /// The owning canvas need not be the active one.
    pub fn apply_pane_update(&mut self, update: PaneUpdate) -> bool {
        let PaneUpdate::Tint { chatbox_id, color } = update;
        let pane = self
            .snapshot
            .canvases
            .iter_mut()
            .flat_map(|c| c.chat_boxes.iter_mut())
            .find(|b| b.id == chatbox_id);
        let Some(pane) = pane else {
            tracing::debug!("[CanvasService] Tint for unknown chatbox {}", chatbox_id);
            return false;
        };
        if pane.tint_color == color {
            return false;
        }
        pane.tint_color = color;
        self.touch();
        true
    }

    // ============================================================================
    // Settings
    // ============================================================================

    pub fn set_api_key(&mut self, provider: Provider, key: impl Into<String>) {
        self.snapshot.api_keys.set(provider, key);
        self.touch();
    }

    pub fn set_locked(&mut self, locked: bool) {
        self.snapshot.is_locked = locked;
        if locked {
            self.dragging = None;
        }
        self.touch();
    }

    // ============================================================================
    // Viewport
    // ============================================================================

    pub fn zoom_in(&mut self) {
        self.viewport.zoom_in();
    }

    pub fn zoom_out(&mut self) {
        self.viewport.zoom_out();
    }

    /// Fits the live panes of the active canvas into `container`.
    pub fn fit_to_screen(&mut self, container: ContainerSize) {
        let bounds = self.active_canvas().and_then(Canvas::content_bounds);
        self.viewport
            .fit_to_screen(bounds, container.without_bottom_strip(TAB_STRIP_PX));
    }

    pub fn reset_zoom(&mut self, container: ContainerSize) {
        let bounds = self.active_canvas().and_then(Canvas::content_bounds);
        self.viewport
            .reset_zoom(bounds, container.without_bottom_strip(TAB_STRIP_PX));
    }

    pub fn wheel(&mut self, input: WheelInput, now: Instant) -> WheelOutcome {
        self.viewport.wheel(input, now)
    }

    // ============================================================================
    // Floating widgets
    // ============================================================================

    /// Registers the hosted endpoint of a chatbox so widget open/close
    /// reaches its counterpart flag.
    pub fn track_endpoint(&mut self, endpoint: SyncEndpoint) {
        let id = endpoint.chatbox_id().to_string();
        endpoint.set_counterpart_present(self.open_widgets.contains(&id));
        self.endpoints.insert(id, endpoint);
    }

    pub fn set_widget_open(&mut self, chatbox_id: &str, open: bool) {
        if open {
            self.open_widgets.insert(chatbox_id.to_string());
        } else {
            self.open_widgets.remove(chatbox_id);
        }
        if let Some(endpoint) = self.endpoints.get(chatbox_id) {
            endpoint.set_counterpart_present(open);
        }
        tracing::debug!("[CanvasService] Widget for {} open={}", chatbox_id, open);
    }

    pub fn has_active_widget(&self, chatbox_id: &str) -> bool {
        self.open_widgets.contains(chatbox_id)
    }

    // ============================================================================
    // Persistence
    // ============================================================================

    /// Writes any pending change now.
    pub async fn flush(&self) {
        if let Some(writer) = &self.writer {
            writer.flush().await;
        }
    }

    /// Synchronous best-effort write for the exit path.
    pub fn shutdown_blocking(&self) {
        if let Some(writer) = &self.writer {
            writer.shutdown_blocking();
        }
    }
}

/// `<prefix> <n>` with `n` one past the highest number already taken.
fn next_numbered_name<'a>(prefix: &str, names: impl Iterator<Item = &'a str>) -> String {
    let highest = names
        .filter_map(|name| name.strip_prefix(prefix)?.strip_prefix(' ')?.parse::<u32>().ok())
        .max()
        .unwrap_or(0);
    format!("{prefix} {}", highest + 1)
}
