//! Streaming response accumulation.
//!
//! Providers push [`StreamEvent`]s tagged with the request id they belong
//! to. A [`StreamAccumulator`] folds them into content and thinking text and
//! tells its driver what to do next through [`StreamEffect`]s; timers and
//! UI writes stay with the driver.

pub mod accumulator;
pub mod event;
pub mod scheduler;

pub use accumulator::{StreamAccumulator, StreamEffect, StreamPhase, format_stream_error};
pub use event::{StreamEvent, StreamEventKind};
pub use scheduler::{CoalescingScheduler, SchedulerState};
