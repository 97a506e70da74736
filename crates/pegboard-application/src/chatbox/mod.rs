//! Chat Session Manager: one controller per chatbox replica.

mod controller;
mod prompt;
mod streaming;

pub use controller::{ChatboxController, ChatboxTiming, ResponseStep};
pub use prompt::{PromptBuilder, RefineContext};
