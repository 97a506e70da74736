//! Per-request stream state machine.

use std::time::Instant;

use super::event::{StreamEvent, StreamEventKind};
use super::scheduler::CoalescingScheduler;

const DEFAULT_ERROR: &str = "Failed to get response from AI.";

/// Lifecycle of one streamed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamPhase {
    Idle,
    Thinking,
    StreamingContent,
    Complete,
    Error,
}

/// Instructions for the driver of a [`StreamAccumulator`].
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEffect {
    /// Thinking text grew; carries the full text so far.
    ThinkingUpdated(String),
    /// The thinking counter stopped at this many whole seconds.
    ThinkingStopped { duration_secs: u64 },
    /// Arm the publish timer once; it must call [`StreamAccumulator::on_publish_timer`].
    ArmPublishTimer,
    /// Throttled snapshot of the content so far.
    Publish(String),
    /// Terminal publish of the full response.
    Completed {
        content: String,
        thinking: String,
        thinking_duration: u64,
    },
    /// Terminal failure; carries the text to display in place of the response.
    Failed(String),
}

/// Folds [`StreamEvent`]s for a single request id into response text.
///
/// Events for other request ids and anything after a terminal event are
/// ignored.
#[derive(Debug)]
pub struct StreamAccumulator {
    request_id: String,
    phase: StreamPhase,
    content: String,
    thinking: String,
    thinking_started: Option<Instant>,
    thinking_duration: u64,
    scheduler: CoalescingScheduler,
}

impl StreamAccumulator {
    pub fn new(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            phase: StreamPhase::Idle,
            content: String::new(),
            thinking: String::new(),
            thinking_started: None,
            thinking_duration: 0,
            scheduler: CoalescingScheduler::new(),
        }
    }

    /// Enters the thinking phase and starts the thinking clock.
    pub fn start(&mut self, now: Instant) {
        self.phase = StreamPhase::Thinking;
        self.content.clear();
        self.thinking.clear();
        self.thinking_started = Some(now);
        self.thinking_duration = 0;
        self.scheduler.cancel();
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn phase(&self) -> StreamPhase {
        self.phase
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn thinking(&self) -> &str {
        &self.thinking
    }

    pub fn is_thinking(&self) -> bool {
        self.thinking_started.is_some()
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.phase, StreamPhase::Complete | StreamPhase::Error)
    }

    /// Whole seconds since thinking started, or the frozen duration once it stopped.
    pub fn elapsed_secs(&self, now: Instant) -> u64 {
        match self.thinking_started {
            Some(started) => now.saturating_duration_since(started).as_secs(),
            None => self.thinking_duration,
        }
    }

    pub fn handle(&mut self, event: &StreamEvent, now: Instant) -> Vec<StreamEffect> {
        if event.request_id != self.request_id || self.is_terminal() {
            return Vec::new();
        }

        match &event.kind {
            StreamEventKind::Thinking(text) => {
                self.thinking.push_str(text);
                vec![StreamEffect::ThinkingUpdated(self.thinking.clone())]
            }
            StreamEventKind::Chunk(text) => {
                let mut effects = self.stop_thinking(now).into_iter().collect::<Vec<_>>();
                self.phase = StreamPhase::StreamingContent;
                self.content.push_str(text);
                if self.scheduler.request() {
                    effects.push(StreamEffect::ArmPublishTimer);
                }
                effects
            }
            StreamEventKind::Complete => self.finish(now),
            StreamEventKind::Error(message) => self.fail(message.as_deref(), now),
        }
    }

    /// The armed publish timer fired.
    pub fn on_publish_timer(&mut self) -> Vec<StreamEffect> {
        if self.is_terminal() {
            return Vec::new();
        }
        let mut effects = vec![StreamEffect::Publish(self.content.clone())];
        if self.scheduler.fire() {
            effects.push(StreamEffect::ArmPublishTimer);
        }
        effects
    }

    /// Completes the request with whatever content has accumulated.
    pub fn finish(&mut self, now: Instant) -> Vec<StreamEffect> {
        if self.is_terminal() {
            return Vec::new();
        }
        let mut effects: Vec<StreamEffect> = self.stop_thinking(now).into_iter().collect();
        self.scheduler.cancel();
        self.phase = StreamPhase::Complete;
        effects.push(StreamEffect::Completed {
            content: self.content.clone(),
            thinking: self.thinking.clone(),
            thinking_duration: self.thinking_duration,
        });
        effects
    }

    /// Completes a request whose provider returned the whole response at once.
    pub fn finish_with(&mut self, content: impl Into<String>, now: Instant) -> Vec<StreamEffect> {
        if self.is_terminal() {
            return Vec::new();
        }
        self.content = content.into();
        self.finish(now)
    }

    /// Fails the request; no retry is attempted.
    pub fn fail(&mut self, message: Option<&str>, now: Instant) -> Vec<StreamEffect> {
        if self.is_terminal() {
            return Vec::new();
        }
        let mut effects: Vec<StreamEffect> = self.stop_thinking(now).into_iter().collect();
        self.scheduler.cancel();
        self.phase = StreamPhase::Error;
        self.content = format_stream_error(message);
        effects.push(StreamEffect::Failed(self.content.clone()));
        effects
    }

    fn stop_thinking(&mut self, now: Instant) -> Option<StreamEffect> {
        let started = self.thinking_started.take()?;
        self.thinking_duration = now.saturating_duration_since(started).as_secs();
        Some(StreamEffect::ThinkingStopped {
            duration_secs: self.thinking_duration,
        })
    }
}

/// Text shown in place of a response that failed.
pub fn format_stream_error(message: Option<&str>) -> String {
    let message = message.filter(|m| !m.is_empty()).unwrap_or(DEFAULT_ERROR);
    format!("Error: {message}")
}
