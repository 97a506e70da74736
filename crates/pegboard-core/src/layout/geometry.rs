//! Grid geometry primitives.

use serde::{Deserialize, Serialize};

/// A cell position in grid units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridPoint {
    pub x: i32,
    pub y: i32,
}

impl GridPoint {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Chebyshev distance between two cells.
    pub fn chebyshev(&self, other: &GridPoint) -> i32 {
        (self.x - other.x).abs().max((self.y - other.y).abs())
    }
}

/// An axis-aligned rectangle in grid units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl GridRect {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    pub fn origin(&self) -> GridPoint {
        GridPoint::new(self.x, self.y)
    }

    /// Same size, moved to `point`.
    pub fn at(&self, point: GridPoint) -> Self {
        Self {
            x: point.x,
            y: point.y,
            ..*self
        }
    }

    /// Strict overlap; rectangles that only share an edge do not overlap.
    pub fn overlaps(&self, other: &GridRect) -> bool {
        !(self.x >= other.right()
            || self.right() <= other.x
            || self.y >= other.bottom()
            || self.bottom() <= other.y)
    }
}

/// The two kinds of pane that live on a canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaneKind {
    Chat,
    Text,
}

/// Identity of a pane for collision exclusion: chat and text panes have
/// independent id spaces.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PaneKey {
    pub kind: PaneKind,
    pub id: String,
}

impl PaneKey {
    pub fn chat(id: impl Into<String>) -> Self {
        Self {
            kind: PaneKind::Chat,
            id: id.into(),
        }
    }

    pub fn text(id: impl Into<String>) -> Self {
        Self {
            kind: PaneKind::Text,
            id: id.into(),
        }
    }
}

/// A live (non-archived) pane occupying grid space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacedPane {
    pub key: PaneKey,
    pub rect: GridRect,
}
