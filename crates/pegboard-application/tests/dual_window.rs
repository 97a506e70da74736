//! A chatbox shown on the canvas and in a floating window at the same time,
//! wired through the in-process window host.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pegboard_application::{
    ChatboxController, CreateOutcome, DataOrigin, FloatingWindowEvent, LocalWindowHost,
    MainWindowEvent, bootstrap_floating,
};
use pegboard_core::chat::ChatboxState;
use pegboard_core::error::Result;
use pegboard_core::generation::{GenerationClient, GenerationOutput, GenerationRequest, StreamSink};
use pegboard_core::provider::ApiKeys;
use pegboard_core::stream::StreamEventKind;
use pegboard_core::sync::{ChatboxReplica, SyncEndpoint, SyncOutcome, WindowBounds, WindowSide};
use tokio::sync::mpsc;

/// Streams a fixed answer, waiting `pace` before each event.
struct StreamingReply {
    pace: Duration,
}

impl StreamingReply {
    fn instant() -> Arc<Self> {
        Arc::new(Self {
            pace: Duration::ZERO,
        })
    }

    fn paced(pace: Duration) -> Arc<Self> {
        Arc::new(Self { pace })
    }
}

#[async_trait]
impl GenerationClient for StreamingReply {
    async fn generate(
        &self,
        request: GenerationRequest,
        sink: StreamSink,
    ) -> Result<GenerationOutput> {
        for kind in [
            StreamEventKind::Thinking("a".into()),
            StreamEventKind::Thinking("b".into()),
            StreamEventKind::Chunk("x".into()),
            StreamEventKind::Chunk("y".into()),
            StreamEventKind::Complete,
        ] {
            if !self.pace.is_zero() {
                tokio::time::sleep(self.pace).await;
            }
            sink.emit(kind);
        }
        Ok(GenerationOutput {
            text: String::new(),
            streaming: request.streaming,
        })
    }
}

fn keys() -> ApiKeys {
    ApiKeys {
        openai: "sk-test".into(),
        ..Default::default()
    }
}

fn drain<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> Vec<T> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test(start_paused = true)]
async fn test_hosted_and_floating_replicas_converge() {
    let host = Arc::new(LocalWindowHost::new(Duration::from_millis(5000)));
    let mut main = host.attach_main();

    let hosted_endpoint = SyncEndpoint::new("c1", WindowSide::Hosted, Some(host.clone()));
    let hosted_replica = ChatboxReplica::new(
        ChatboxState::new("You are a helpful assistant.", "gpt-4", "#3b82f6"),
        hosted_endpoint.clone(),
    );
    let mut hosted =
        ChatboxController::new(hosted_replica, StreamingReply::instant()).with_api_keys(keys());

    // Open the floating window and let it bootstrap from the pushed data.
    let mut widget_events = match host.create_floating(
        "c1",
        hosted.window_data("Agent 1"),
        WindowBounds::default(),
    ) {
        CreateOutcome::Created(rx) => rx,
        CreateOutcome::AlreadyExists => panic!("window already existed"),
    };
    hosted_endpoint.set_counterpart_present(true);
    assert!(host.mark_loaded("c1"));

    let boot = bootstrap_floating("c1", &mut widget_events, host.as_ref())
        .await
        .expect("window data");
    assert_eq!(boot.slot.origin(), Some(DataOrigin::Push));

    let floating_replica = ChatboxReplica::new(
        ChatboxState::new("", "", ""),
        SyncEndpoint::new("c1", WindowSide::Floating, Some(host.clone())),
    );
    let mut floating = ChatboxController::new(floating_replica, StreamingReply::instant());
    boot.apply_to(&mut floating).await;
    assert_eq!(floating.state().model, "gpt-4");
    assert_eq!(floating.state().tint_color, "#3b82f6");

    // A streamed answer on the canvas shows up in the floating window.
    hosted.set_input("Hello");
    assert!(hosted.send().await);
    for event in drain(&mut widget_events) {
        let FloatingWindowEvent::Sync(message) = event else {
            panic!("unexpected init after bootstrap");
        };
        floating.handle_sync(&message).await;
    }
    assert_eq!(floating.state().current_response(), Some("xy"));
    assert_eq!(floating.state().thinking_content, "ab");
    assert!(!floating.state().is_loading);

    // Once the guard delay has passed the floating window talks back.
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(floating.set_input("follow-up"), SyncOutcome::Sent);
    let events = drain(&mut main);
    assert_eq!(events.len(), 1);
    let MainWindowEvent::Sync(message) = &events[0] else {
        panic!("expected a sync event");
    };
    assert!(message.from_widget);
    assert!(hosted.handle_sync(message).await);
    assert_eq!(hosted.state().input, "follow-up");

    // A looped-back message from the floating side is ignored there.
    assert!(!floating.handle_sync(message).await);

    // Closing the window stops the canvas from syncing.
    assert!(host.close_floating("c1"));
    assert_eq!(
        drain(&mut main),
        vec![MainWindowEvent::FloatingClosed {
            chatbox_id: "c1".into()
        }]
    );
    hosted_endpoint.set_counterpart_present(false);
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(hosted.set_input("alone"), SyncOutcome::NoCounterpart);
}

#[tokio::test(start_paused = true)]
async fn test_floating_edit_during_canvas_stream_converges() {
    let host = Arc::new(LocalWindowHost::new(Duration::from_millis(5000)));
    let mut main = host.attach_main();

    let hosted_endpoint = SyncEndpoint::new("c1", WindowSide::Hosted, Some(host.clone()));
    let hosted_replica = ChatboxReplica::new(
        ChatboxState::new("You are a helpful assistant.", "gpt-4", "#3b82f6"),
        hosted_endpoint.clone(),
    );
    let client = StreamingReply::paced(Duration::from_millis(150));
    let mut hosted = ChatboxController::new(hosted_replica, client).with_api_keys(keys());

    let mut widget_events = match host.create_floating(
        "c1",
        hosted.window_data("Agent 1"),
        WindowBounds::default(),
    ) {
        CreateOutcome::Created(rx) => rx,
        CreateOutcome::AlreadyExists => panic!("window already existed"),
    };
    hosted_endpoint.set_counterpart_present(true);
    assert!(host.mark_loaded("c1"));
    let boot = bootstrap_floating("c1", &mut widget_events, host.as_ref())
        .await
        .expect("window data");
    let floating_replica = ChatboxReplica::new(
        ChatboxState::new("", "", ""),
        SyncEndpoint::new("c1", WindowSide::Floating, Some(host.clone())),
    );
    let mut floating = ChatboxController::new(floating_replica, StreamingReply::instant());
    boot.apply_to(&mut floating).await;

    hosted.set_input("Hello");
    assert!(hosted.begin_send().await);

    // Both windows run one event loop each, interleaved on one task.
    let hosted_guard = hosted.sync_guard();
    let floating_guard = floating.sync_guard();
    let mut typed = false;
    let deadline = tokio::time::sleep(Duration::from_secs(5));
    tokio::pin!(deadline);
    loop {
        tokio::select! {
            step = hosted.next_response_step() => hosted.apply_response_step(step).await,
            Some(event) = widget_events.recv() => {
                let FloatingWindowEvent::Sync(message) = event else {
                    panic!("unexpected init after bootstrap");
                };
                assert!(floating.handle_sync(&message).await);
                if !typed && floating.state().is_loading {
                    // Typed in the floating window while the canvas streams.
                    typed = true;
                    assert_eq!(floating.set_input("typed meanwhile"), SyncOutcome::Suppressed);
                    assert!(floating.has_deferred_sync());
                }
            }
            Some(MainWindowEvent::Sync(message)) = main.recv() => {
                assert!(hosted.handle_sync(&message).await);
            }
            _ = floating_guard.settled(), if floating.has_deferred_sync() => {
                assert_eq!(floating.flush_deferred_sync(), Some(SyncOutcome::Sent));
            }
            _ = hosted_guard.settled(), if hosted.has_deferred_sync() => {
                hosted.flush_deferred_sync();
            }
            _ = &mut deadline => break,
        }
    }

    assert!(typed);
    assert!(!hosted.is_responding());
    assert!(!hosted.has_deferred_sync());
    assert!(!floating.has_deferred_sync());
    for state in [hosted.state(), floating.state()] {
        assert_eq!(state.current_response(), Some("xy"));
        assert_eq!(state.thinking_content, "ab");
        assert_eq!(state.input, "typed meanwhile");
        assert!(!state.is_loading);
        assert!(!state.is_thinking);
    }
    assert_eq!(hosted.history().len(), 1);
}
