//! Start-up of a floating chatbox window.
//!
//! The window data can reach a new floating window two ways: the host pushes
//! [`FloatingWindowEvent::Init`] once the window is loaded, and the window
//! itself asks the main window through a [`WindowDataSource`]. Both run at
//! once and the first to deliver wins.

use pegboard_core::sync::{SyncMessage, WindowData, WindowDataSource};
use tokio::sync::mpsc;

use crate::chatbox::ChatboxController;
use crate::window_host::FloatingWindowEvent;

/// Which path delivered the window data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataOrigin {
    Push,
    Request,
}

/// Holds the first window data delivered; later deliveries are ignored.
#[derive(Debug, Clone, Default)]
pub struct WindowDataSlot {
    filled: Option<(WindowData, DataOrigin)>,
}

impl WindowDataSlot {
    /// Returns false, leaving the slot unchanged, when it is already filled.
    pub fn fill(&mut self, data: WindowData, origin: DataOrigin) -> bool {
        if self.filled.is_some() {
            tracing::debug!("[FloatingBootstrap] Ignoring late window data ({:?})", origin);
            return false;
        }
        self.filled = Some((data, origin));
        true
    }

    pub fn is_filled(&self) -> bool {
        self.filled.is_some()
    }

    pub fn data(&self) -> Option<&WindowData> {
        self.filled.as_ref().map(|(data, _)| data)
    }

    pub fn origin(&self) -> Option<DataOrigin> {
        self.filled.as_ref().map(|(_, origin)| *origin)
    }
}

/// A floating window whose data has arrived.
#[derive(Debug)]
pub struct Bootstrapped {
    pub slot: WindowDataSlot,
    /// Sync messages that arrived before the data, oldest first.
    pub backlog: Vec<SyncMessage>,
}

impl Bootstrapped {
    /// Initialises `controller` from the window data, then replays the
    /// buffered sync messages on top of it.
    pub async fn apply_to(self, controller: &mut ChatboxController) {
        if let Some(data) = self.slot.data() {
            controller.adopt_window_data(data.clone());
        }
        for message in &self.backlog {
            controller.handle_sync(message).await;
        }
    }
}

/// Waits for the window data of `chatbox_id`.
///
/// A push that is already queued wins over the request. A request that
/// resolves to `None` (timeout or no main window) keeps waiting for the
/// push.
///
/// # Returns
///
/// `None` when the event channel closes before any data arrived.
pub async fn bootstrap_floating(
    chatbox_id: &str,
    events: &mut mpsc::UnboundedReceiver<FloatingWindowEvent>,
    source: &dyn WindowDataSource,
) -> Option<Bootstrapped> {
    let mut slot = WindowDataSlot::default();
    let mut backlog = Vec::new();
    let request = source.request_window_data(chatbox_id);
    tokio::pin!(request);
    let mut requested = false;

    while !slot.is_filled() {
        tokio::select! {
            biased;
            event = events.recv() => match event {
                Some(FloatingWindowEvent::Init(data)) => {
                    slot.fill(data, DataOrigin::Push);
                }
                Some(FloatingWindowEvent::Sync(message)) => backlog.push(message),
                None => {
                    tracing::warn!(
                        "[FloatingBootstrap] Window {} closed before data arrived",
                        chatbox_id
                    );
                    return None;
                }
            },
            data = &mut request, if !requested => {
                requested = true;
                match data {
                    Some(data) => {
                        slot.fill(data, DataOrigin::Request);
                    }
                    None => tracing::debug!(
                        "[FloatingBootstrap] No data for {} yet, waiting for init",
                        chatbox_id
                    ),
                }
            }
        }
    }

    tracing::info!(
        "[FloatingBootstrap] {} initialised from {:?} with {} queued sync messages",
        chatbox_id,
        slot.origin(),
        backlog.len()
    );
    Some(Bootstrapped { slot, backlog })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pegboard_core::chat::{ChatboxState, ChatboxStatePatch};
    use pegboard_core::generation::{
        GenerationClient, GenerationOutput, GenerationRequest, StreamSink,
    };
    use pegboard_core::sync::{ChatboxReplica, SyncEndpoint, WindowSide};
    use std::sync::Arc;
    use std::time::Duration;

    fn data(name: &str) -> WindowData {
        WindowData {
            name: name.into(),
            model: "gpt-4".into(),
            system_prompt: "Be brief.".into(),
            tint_color: "#ec4899".into(),
            api_keys: Default::default(),
            current_response: Some("Hi there".into()),
            chat_messages: Vec::new(),
            is_chat_mode: false,
        }
    }

    // Answers after `delay` with `answer`
    struct FixedSource {
        answer: Option<WindowData>,
        delay: Duration,
    }

    #[async_trait]
    impl WindowDataSource for FixedSource {
        async fn request_window_data(&self, _chatbox_id: &str) -> Option<WindowData> {
            tokio::time::sleep(self.delay).await;
            self.answer.clone()
        }
    }

    struct Unused;

    #[async_trait]
    impl GenerationClient for Unused {
        async fn generate(
            &self,
            _request: GenerationRequest,
            _sink: StreamSink,
        ) -> pegboard_core::error::Result<GenerationOutput> {
            unreachable!("no generation during bootstrap")
        }
    }

    #[tokio::test]
    async fn test_queued_push_wins() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        tx.send(FloatingWindowEvent::Init(data("pushed"))).unwrap();
        let source = FixedSource {
            answer: Some(data("requested")),
            delay: Duration::ZERO,
        };

        let boot = bootstrap_floating("c1", &mut rx, &source).await.unwrap();
        assert_eq!(boot.slot.origin(), Some(DataOrigin::Push));
        assert_eq!(boot.slot.data().unwrap().name, "pushed");
    }

    #[tokio::test]
    async fn test_request_wins_when_not_loaded() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let source = FixedSource {
            answer: Some(data("requested")),
            delay: Duration::ZERO,
        };

        let mut boot = bootstrap_floating("c1", &mut rx, &source).await.unwrap();
        assert_eq!(boot.slot.origin(), Some(DataOrigin::Request));

        // The push arriving afterwards is a no-op.
        tx.send(FloatingWindowEvent::Init(data("pushed"))).unwrap();
        let Some(FloatingWindowEvent::Init(late)) = rx.recv().await else {
            panic!("expected init");
        };
        assert!(!boot.slot.fill(late, DataOrigin::Push));
        assert_eq!(boot.slot.data().unwrap().name, "requested");
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_request_waits_for_push() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let source = FixedSource {
            answer: None,
            delay: Duration::from_millis(5000),
        };
        tx.send(FloatingWindowEvent::Sync(SyncMessage {
            chatbox_id: "c1".into(),
            state: ChatboxStatePatch {
                input: Some("typed early".into()),
                ..Default::default()
            },
            from_widget: false,
        }))
        .unwrap();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(6000)).await;
            let _ = tx.send(FloatingWindowEvent::Init(data("pushed")));
        });

        let boot = bootstrap_floating("c1", &mut rx, &source).await.unwrap();
        assert_eq!(boot.slot.origin(), Some(DataOrigin::Push));
        assert_eq!(boot.backlog.len(), 1);

        let replica = ChatboxReplica::new(
            ChatboxState::new("", "", ""),
            SyncEndpoint::new("c1", WindowSide::Floating, None),
        );
        let mut controller = ChatboxController::new(replica, Arc::new(Unused));
        boot.apply_to(&mut controller).await;
        assert_eq!(controller.state().system_prompt, "Be brief.");
        assert_eq!(controller.state().tint_color, "#ec4899");
        assert_eq!(controller.state().current_response(), Some("Hi there"));
        assert_eq!(controller.state().input, "typed early");
    }

    #[tokio::test]
    async fn test_closed_window_gives_up() {
        let (tx, mut rx) = mpsc::unbounded_channel::<FloatingWindowEvent>();
        drop(tx);
        let source = FixedSource {
            answer: None,
            delay: Duration::ZERO,
        };
        assert!(bootstrap_floating("c1", &mut rx, &source).await.is_none());
    }
}
