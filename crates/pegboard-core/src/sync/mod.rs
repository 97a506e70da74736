//! Dual-window state synchronization.
//!
//! A chatbox can be shown both on the canvas ([`WindowSide::Hosted`]) and in
//! a detached window ([`WindowSide::Floating`]). Each side owns a
//! [`ChatboxReplica`]; every local mutation is mirrored to the other side as
//! a [`SyncMessage`] carrying a partial state patch.

pub mod endpoint;
pub mod guard;
pub mod message;
pub mod replica;
pub mod transport;

pub use endpoint::{SyncEndpoint, SyncOutcome};
pub use guard::{ApplyScope, SyncGuard};
pub use message::{SyncMessage, WidgetState, WindowBounds, WindowData, WindowSide};
pub use replica::{ChatboxReplica, RemoteApply};
pub use transport::{SyncTransport, WindowDataSource};
