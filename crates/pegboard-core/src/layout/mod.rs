//! Positional layout engine: grid geometry, collision-free placement and
//! the canvas viewport.

pub mod geometry;
pub mod placement;
pub mod viewport;

pub use geometry::{GridPoint, GridRect, PaneKey, PaneKind, PlacedPane};
pub use placement::{check_collision, find_free_position, find_nearest_free_position};
pub use viewport::{
    ContainerSize, ContentBounds, PixelPoint, Viewport, WheelInput, WheelOutcome, MAX_ZOOM,
    MIN_ZOOM,
};
