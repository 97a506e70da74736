//! Application layer for Pegboard.
//!
//! This crate provides the use cases that coordinate the core state machines
//! with infrastructure: the per-chatbox controller, the canvas service that
//! arbitrates pane geometry, the in-process window host and the floating
//! window start-up.

pub mod canvas_service;
pub mod chatbox;
pub mod floating;
pub mod window_host;

pub use canvas_service::{CanvasService, TAB_STRIP_PX};
pub use chatbox::{ChatboxController, ChatboxTiming, PromptBuilder, RefineContext, ResponseStep};
pub use floating::{Bootstrapped, DataOrigin, WindowDataSlot, bootstrap_floating};
pub use window_host::{CreateOutcome, FloatingWindowEvent, LocalWindowHost, MainWindowEvent};
