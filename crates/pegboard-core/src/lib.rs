//! Core domain of Pegboard: a canvas of draggable LLM chat panes.
//!
//! This crate is free of I/O. It holds the models, the pure state machines
//! (layout, streaming, sync) and the traits that infrastructure and
//! application crates implement or consume.

pub mod canvas;
pub mod chat;
pub mod config;
pub mod error;
pub mod generation;
pub mod layout;
pub mod pane_cache;
pub mod provider;
pub mod retrieval;
pub mod stream;
pub mod sync;

// Re-export common error type
pub use error::PegboardError;
