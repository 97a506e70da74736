//! One in-flight generation request, advanced a step at a time.

use std::sync::Arc;
use std::time::Duration;

use pegboard_core::chat::{ChatMessage, ChatboxStatePatch, upsert_trailing_assistant};
use pegboard_core::error::{PegboardError, Result};
use pegboard_core::generation::{GenerationClient, GenerationOutput, GenerationRequest, StreamSink};
use pegboard_core::stream::{StreamAccumulator, StreamEffect, StreamEvent, StreamPhase};
use pegboard_core::sync::ChatboxReplica;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};

/// Where response text is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum StreamTarget {
    /// The current single-turn session's `assistant_response`.
    Session,
    /// The trailing assistant message of the chat conversation.
    TrailingMessage,
}

impl StreamTarget {
    pub(super) fn write(self, replica: &mut ChatboxReplica, content: &str) {
        match self {
            Self::Session => {
                replica.update_current_session(|s| s.assistant_response = content.to_string());
            }
            Self::TrailingMessage => {
                replica.update_chat_messages(|m| upsert_trailing_assistant(m, content));
            }
        }
    }

    /// In chat mode an error fills an empty placeholder, otherwise it is
    /// appended as its own assistant message.
    pub(super) fn write_error(self, replica: &mut ChatboxReplica, text: &str) {
        match self {
            Self::Session => self.write(replica, text),
            Self::TrailingMessage => {
                replica.update_chat_messages(|m| match m.last_mut() {
                    Some(last) if last.is_placeholder() => last.content = text.to_string(),
                    _ => m.push(ChatMessage::assistant(text)),
                });
            }
        }
    }

    /// Writes stream effects into `replica` through its commit path.
    pub(super) fn apply(self, replica: &mut ChatboxReplica, effects: Vec<StreamEffect>) {
        for effect in effects {
            match effect {
                StreamEffect::ThinkingUpdated(text) => {
                    replica.set_thinking_content(text);
                }
                StreamEffect::ThinkingStopped { duration_secs } => {
                    replica.commit(ChatboxStatePatch {
                        is_thinking: Some(false),
                        thinking_duration: Some(duration_secs),
                        ..Default::default()
                    });
                }
                // Consumed by the stream itself.
                StreamEffect::ArmPublishTimer => {}
                StreamEffect::Publish(content) => self.write(replica, &content),
                StreamEffect::Completed {
                    content,
                    thinking,
                    thinking_duration,
                } => self.write_final(replica, &content, &thinking, thinking_duration),
                StreamEffect::Failed(text) => self.write_error(replica, &text),
            }
        }
    }

    fn write_final(self, replica: &mut ChatboxReplica, content: &str, thinking: &str, secs: u64) {
        match self {
            Self::Session => self.write(replica, content),
            Self::TrailingMessage => {
                replica.update_chat_messages(|m| {
                    upsert_trailing_assistant(m, content);
                    if let Some(last) = m.last_mut() {
                        if !thinking.is_empty() {
                            last.thinking_content = Some(thinking.to_string());
                            last.thinking_duration = Some(secs);
                        }
                    }
                });
            }
        }
    }
}

/// A response that reached the complete state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct FinishedResponse {
    pub content: String,
    pub thinking: String,
    pub thinking_duration: u64,
}

impl FinishedResponse {
    /// Thinking transcript for the history entry, if any was streamed.
    pub fn thinking_for_history(&self) -> Option<(&str, u64)> {
        (!self.thinking.is_empty()).then_some((self.thinking.as_str(), self.thinking_duration))
    }
}

#[derive(Debug, Clone, Copy)]
pub(super) struct StreamTimers {
    pub throttle: Duration,
    pub tick: Duration,
}

/// What the owner of a [`ResponseStream`] has to do next.
#[derive(Debug, Clone, PartialEq)]
pub(super) enum StreamStep {
    /// Write these into the replica with [`StreamTarget::apply`].
    Effects(Vec<StreamEffect>),
    /// The thinking counter reached this many seconds.
    ThinkingTick(u64),
    /// The request is over; `Some` only when it completed.
    Finished(Option<FinishedResponse>),
}

type Generation = JoinHandle<Result<GenerationOutput>>;

fn now() -> std::time::Instant {
    Instant::now().into_std()
}

/// A generation request and the accumulator folding its events.
///
/// The provider call runs as its own task; the stream owns its handle and
/// the event receiver, so the caller is free to handle other work between
/// steps. Dropping the stream aborts the provider call. The receiver lives only as long as
/// the stream, so events of another request can never reach it. A provider
/// that returns without a terminal event is finalized as complete; a
/// provider error after a terminal event is ignored.
pub(super) struct ResponseStream {
    target: StreamTarget,
    streaming: bool,
    acc: StreamAccumulator,
    events: mpsc::UnboundedReceiver<StreamEvent>,
    events_open: bool,
    generation: Option<Generation>,
    publish_at: Option<Instant>,
    ticker: Interval,
    throttle: Duration,
}

impl ResponseStream {
    pub(super) fn start(
        client: Arc<dyn GenerationClient>,
        request: GenerationRequest,
        target: StreamTarget,
        timers: StreamTimers,
    ) -> Self {
        let request_id = request.request_id.clone();
        let streaming = request.streaming;
        let (sink, events) = StreamSink::channel(request_id.clone());
        let mut acc = StreamAccumulator::new(request_id.clone());
        if streaming {
            acc.start(now());
        }
        let generation = tokio::spawn(async move { client.generate(request, sink).await });
        let mut ticker = tokio::time::interval(timers.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::debug!(
            "[ResponseStream] {} started (streaming={})",
            request_id,
            streaming
        );

        Self {
            target,
            streaming,
            acc,
            events,
            events_open: streaming,
            generation: Some(generation),
            publish_at: None,
            ticker,
            throttle: timers.throttle,
        }
    }

    pub(super) fn target(&self) -> StreamTarget {
        self.target
    }

    /// Waits for the next thing to write.
    ///
    /// Cancel safe: all state changes happen after a branch has completed,
    /// so dropping the returned future loses nothing.
    pub(super) async fn next(&mut self) -> StreamStep {
        loop {
            if self.generation.is_none() && self.acc.is_terminal() {
                return StreamStep::Finished(self.finished());
            }
            let listening = self.events_open && !self.acc.is_terminal();
            let thinking = self.acc.is_thinking();
            let publish_at = self.publish_at;

            let effects = tokio::select! {
                event = self.events.recv(), if listening => match event {
                    Some(event) => self.acc.handle(&event, now()),
                    None => {
                        self.events_open = false;
                        continue;
                    }
                },
                result = resolve(&mut self.generation), if self.generation.is_some() => {
                    self.generation = None;
                    self.on_generation_done(result)
                }
                _ = tokio::time::sleep_until(publish_at.unwrap_or_else(Instant::now)),
                    if publish_at.is_some() =>
                {
                    self.publish_at = None;
                    self.acc.on_publish_timer()
                }
                _ = self.ticker.tick(), if thinking => {
                    return StreamStep::ThinkingTick(self.acc.elapsed_secs(now()));
                }
                else => return StreamStep::Finished(self.finished()),
            };

            let effects = self.arm_publish_timer(effects);
            if self.acc.is_terminal() {
                self.publish_at = None;
            }
            if !effects.is_empty() {
                return StreamStep::Effects(effects);
            }
        }
    }

    fn on_generation_done(&mut self, result: Result<GenerationOutput>) -> Vec<StreamEffect> {
        // The provider has returned; take what it already pushed first.
        let mut effects = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            effects.extend(self.acc.handle(&event, now()));
        }
        self.events_open = false;

        let finished_at = now();
        match result {
            Ok(_) if self.streaming => effects.extend(self.acc.finish(finished_at)),
            Ok(output) => effects.extend(self.acc.finish_with(output.text, finished_at)),
            Err(e) => {
                tracing::warn!("[ResponseStream] {} failed: {}", self.acc.request_id(), e);
                effects.extend(self.acc.fail(Some(&e.to_string()), finished_at));
            }
        }
        effects
    }

    fn arm_publish_timer(&mut self, effects: Vec<StreamEffect>) -> Vec<StreamEffect> {
        let mut rest = Vec::with_capacity(effects.len());
        for effect in effects {
            match effect {
                StreamEffect::ArmPublishTimer => {
                    self.publish_at = Some(Instant::now() + self.throttle);
                }
                other => rest.push(other),
            }
        }
        rest
    }

    fn finished(&self) -> Option<FinishedResponse> {
        tracing::debug!(
            "[ResponseStream] {} ended in {:?}",
            self.acc.request_id(),
            self.acc.phase()
        );
        (self.acc.phase() == StreamPhase::Complete).then(|| FinishedResponse {
            content: self.acc.content().to_string(),
            thinking: self.acc.thinking().to_string(),
            thinking_duration: self.acc.elapsed_secs(now()),
        })
    }
}

impl Drop for ResponseStream {
    fn drop(&mut self) {
        if let Some(generation) = &self.generation {
            generation.abort();
        }
    }
}

async fn resolve(generation: &mut Option<Generation>) -> Result<GenerationOutput> {
    let Some(handle) = generation else {
        return std::future::pending().await;
    };
    match handle.await {
        Ok(result) => result,
        Err(e) => Err(PegboardError::generation(format!("Generation task ended: {e}"))),
    }
}
