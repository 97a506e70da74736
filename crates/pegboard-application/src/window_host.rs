//! In-process window host: relays sync messages between the main window and
//! floating chatbox windows and answers floating data requests.
//!
//! Each window owns an unbounded receiver of its events. The host keeps only
//! the senders, so a closed window simply stops receiving and messages to it
//! are dropped.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use pegboard_core::config::PegboardConfig;
use pegboard_core::error::Result;
use pegboard_core::sync::{
    SyncMessage, SyncTransport, WidgetState, WindowBounds, WindowData, WindowDataSource,
};
use pegboard_infrastructure::{BlockingStore, DebouncedWriter};
use tokio::sync::{mpsc, oneshot};

/// Events delivered to the main window.
#[derive(Debug, Clone, PartialEq)]
pub enum MainWindowEvent {
    /// A patch sent by a floating replica.
    Sync(SyncMessage),
    /// A floating window asks for its data; answer with
    /// [`LocalWindowHost::send_data_response`].
    RequestData { chatbox_id: String },
    FloatingClosed { chatbox_id: String },
}

/// Events delivered to one floating window.
#[derive(Debug, Clone, PartialEq)]
pub enum FloatingWindowEvent {
    /// Pushed once the window has finished loading.
    Init(WindowData),
    /// A patch sent by the hosted replica.
    Sync(SyncMessage),
}

#[derive(Debug)]
pub enum CreateOutcome {
    Created(mpsc::UnboundedReceiver<FloatingWindowEvent>),
    /// A window for this chatbox is already open; it is focused instead.
    AlreadyExists,
}

struct FloatingWindow {
    tx: mpsc::UnboundedSender<FloatingWindowEvent>,
    data: WindowData,
    bounds: WindowBounds,
    loaded: bool,
}

#[derive(Default)]
struct HostInner {
    main: Option<mpsc::UnboundedSender<MainWindowEvent>>,
    floating: HashMap<String, FloatingWindow>,
    pending_data: HashMap<String, Vec<oneshot::Sender<Option<WindowData>>>>,
}

/// Window host for a single process.
///
/// Share it as `Arc<LocalWindowHost>`; it is both the [`SyncTransport`] and
/// the [`WindowDataSource`] of every replica.
pub struct LocalWindowHost {
    inner: Mutex<HostInner>,
    data_timeout: Duration,
    widget_writer: Option<DebouncedWriter<Vec<WidgetState>>>,
}

impl LocalWindowHost {
    pub fn new(data_timeout: Duration) -> Self {
        Self {
            inner: Mutex::new(HostInner::default()),
            data_timeout,
            widget_writer: None,
        }
    }

    pub fn from_config(config: &PegboardConfig) -> Self {
        Self::new(config.data_request_timeout())
    }

    /// Persists open floating windows to `store`, debounced.
    pub fn with_widget_store(
        mut self,
        store: Arc<dyn BlockingStore<Vec<WidgetState>>>,
        debounce: Duration,
    ) -> Self {
        self.widget_writer = Some(DebouncedWriter::spawn("WidgetWriter", store, debounce));
        self
    }

    fn lock(&self) -> MutexGuard<'_, HostInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ============================================================================
    // Window lifecycle
    // ============================================================================

    /// Registers the main window, replacing any earlier one.
    pub fn attach_main(&self) -> mpsc::UnboundedReceiver<MainWindowEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().main = Some(tx);
        tracing::info!("[WindowHost] Main window attached");
        rx
    }

    pub fn detach_main(&self) {
        self.lock().main = None;
        tracing::info!("[WindowHost] Main window detached");
    }

    /// Opens a floating window for `chatbox_id`.
    ///
    /// The window receives [`FloatingWindowEvent::Init`] once it is marked
    /// loaded.
    pub fn create_floating(
        &self,
        chatbox_id: &str,
        data: WindowData,
        bounds: WindowBounds,
    ) -> CreateOutcome {
        let rx = {
            let mut inner = self.lock();
            if inner.floating.contains_key(chatbox_id) {
                tracing::debug!("[WindowHost] Focusing existing window for {}", chatbox_id);
                return CreateOutcome::AlreadyExists;
            }
            let (tx, rx) = mpsc::unbounded_channel();
            inner.floating.insert(
                chatbox_id.to_string(),
                FloatingWindow {
                    tx,
                    data,
                    bounds,
                    loaded: false,
                },
            );
            rx
        };
        tracing::info!("[WindowHost] Created floating window for {}", chatbox_id);
        self.persist_widgets();
        CreateOutcome::Created(rx)
    }

    /// The window finished loading; pushes its data.
    pub fn mark_loaded(&self, chatbox_id: &str) -> bool {
        let mut inner = self.lock();
        let Some(window) = inner.floating.get_mut(chatbox_id) else {
            return false;
        };
        window.loaded = true;
        window
            .tx
            .send(FloatingWindowEvent::Init(window.data.clone()))
            .is_ok()
    }

    pub fn is_loaded(&self, chatbox_id: &str) -> bool {
        self.lock()
            .floating
            .get(chatbox_id)
            .is_some_and(|w| w.loaded)
    }

    pub fn is_open(&self, chatbox_id: &str) -> bool {
        self.lock().floating.contains_key(chatbox_id)
    }

    pub fn update_window_data(&self, chatbox_id: &str, data: WindowData) -> bool {
        let updated = match self.lock().floating.get_mut(chatbox_id) {
            Some(window) => {
                window.data = data;
                true
            }
            None => false,
        };
        if updated {
            self.persist_widgets();
        }
        updated
    }

    pub fn move_floating(&self, chatbox_id: &str, bounds: WindowBounds) -> bool {
        let moved = match self.lock().floating.get_mut(chatbox_id) {
            Some(window) => {
                window.bounds = bounds;
                true
            }
            None => false,
        };
        if moved {
            self.persist_widgets();
        }
        moved
    }

    /// Closes a floating window and tells the main window about it.
    pub fn close_floating(&self, chatbox_id: &str) -> bool {
        {
            let mut inner = self.lock();
            if inner.floating.remove(chatbox_id).is_none() {
                return false;
            }
            if let Some(main) = &inner.main {
                let _ = main.send(MainWindowEvent::FloatingClosed {
                    chatbox_id: chatbox_id.to_string(),
                });
            }
        }
        tracing::info!("[WindowHost] Closed floating window for {}", chatbox_id);
        self.persist_widgets();
        true
    }

    /// Reopens windows saved by an earlier launch.
    pub fn restore_widgets(
        &self,
        widgets: Vec<WidgetState>,
    ) -> Vec<(String, mpsc::UnboundedReceiver<FloatingWindowEvent>)> {
        let mut opened = Vec::new();
        for widget in widgets {
            match self.create_floating(&widget.chatbox_id, widget.window_data, widget.bounds) {
                CreateOutcome::Created(rx) => opened.push((widget.chatbox_id, rx)),
                CreateOutcome::AlreadyExists => {}
            }
        }
        tracing::info!("[WindowHost] Restored {} floating windows", opened.len());
        opened
    }

    // ============================================================================
    // Data requests
    // ============================================================================

    /// Answers every outstanding data request for `chatbox_id`.
    ///
    /// # Returns
    ///
    /// How many waiting requests were resolved.
    pub fn send_data_response(&self, chatbox_id: &str, data: Option<WindowData>) -> usize {
        let waiting = self
            .lock()
            .pending_data
            .remove(chatbox_id)
            .unwrap_or_default();
        waiting
            .into_iter()
            .map(|tx| tx.send(data.clone()).is_ok())
            .filter(|&sent| sent)
            .count()
    }

    fn forget_abandoned_requests(&self, chatbox_id: &str) {
        let mut inner = self.lock();
        if let Some(waiting) = inner.pending_data.get_mut(chatbox_id) {
            waiting.retain(|tx| !tx.is_closed());
            if waiting.is_empty() {
                inner.pending_data.remove(chatbox_id);
            }
        }
    }

    // ============================================================================
    // Widget persistence
    // ============================================================================

    /// Open floating windows, ordered by chatbox id.
    pub fn widget_states(&self) -> Vec<WidgetState> {
        let inner = self.lock();
        let mut widgets: Vec<WidgetState> = inner
            .floating
            .iter()
            .map(|(id, window)| WidgetState {
                chatbox_id: id.clone(),
                bounds: window.bounds,
                window_data: window.data.clone(),
            })
            .collect();
        widgets.sort_by(|a, b| a.chatbox_id.cmp(&b.chatbox_id));
        widgets
    }

    fn persist_widgets(&self) {
        if let Some(writer) = &self.widget_writer {
            writer.schedule(self.widget_states());
        }
    }

    pub async fn flush_widgets(&self) {
        if let Some(writer) = &self.widget_writer {
            writer.flush().await;
        }
    }

    pub fn shutdown_blocking(&self) {
        if let Some(writer) = &self.widget_writer {
            writer.shutdown_blocking();
        }
    }
}

impl SyncTransport for LocalWindowHost {
    /// Routes by sender: floating messages go to the main window, hosted
    /// messages to the chatbox's floating window.
    fn send(&self, message: SyncMessage) -> Result<()> {
        let chatbox_id = message.chatbox_id.clone();
        let inner = self.lock();
        let delivered = if message.from_widget {
            inner
                .main
                .as_ref()
                .is_some_and(|main| main.send(MainWindowEvent::Sync(message)).is_ok())
        } else {
            inner
                .floating
                .get(&chatbox_id)
                .is_some_and(|w| w.tx.send(FloatingWindowEvent::Sync(message)).is_ok())
        };
        if !delivered {
            tracing::debug!("[WindowHost] Dropped undeliverable sync for {}", chatbox_id);
        }
        Ok(())
    }
}

#[async_trait]
impl WindowDataSource for LocalWindowHost {
    async fn request_window_data(&self, chatbox_id: &str) -> Option<WindowData> {
        let rx = {
            let mut inner = self.lock();
            let Some(main) = inner.main.clone() else {
                tracing::debug!("[WindowHost] No main window to ask for {}", chatbox_id);
                return None;
            };
            let (tx, rx) = oneshot::channel();
            inner
                .pending_data
                .entry(chatbox_id.to_string())
                .or_default()
                .push(tx);
            let request = MainWindowEvent::RequestData {
                chatbox_id: chatbox_id.to_string(),
            };
            if main.send(request).is_err() {
                inner.pending_data.remove(chatbox_id);
                return None;
            }
            rx
        };

        match tokio::time::timeout(self.data_timeout, rx).await {
            Ok(Ok(data)) => data,
            Ok(Err(_)) => None,
            Err(_) => {
                tracing::warn!(
                    "[WindowHost] Data request for {} timed out after {:?}",
                    chatbox_id,
                    self.data_timeout
                );
                self.forget_abandoned_requests(chatbox_id);
                None
            }
        }
    }
}
