//! Canvases and the panes placed on them.

pub mod model;
pub mod repository;
pub mod snapshot;
pub mod updates;

pub use model::{
    Canvas, ChatBoxPane, ChatBoxUpdate, GeometryCommit, PendingInput, TextBoxPane, TextBoxUpdate,
    TINT_PALETTE,
};
pub use repository::SnapshotRepository;
pub use snapshot::{AppSnapshot, DEFAULT_CANVAS_ID};
pub use updates::{PaneUpdate, PaneUpdateSink};
