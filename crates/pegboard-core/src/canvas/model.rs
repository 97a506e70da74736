//! Pane records and geometry arbitration for a single canvas.

use serde::{Deserialize, Serialize};

use crate::layout::{
    ContentBounds, GridPoint, GridRect, PaneKey, PaneKind, PlacedPane, check_collision,
    find_nearest_free_position,
};

/// Tints a new chatbox is picked from.
pub const TINT_PALETTE: [&str; 8] = [
    "#3b82f6", "#a855f7", "#ec4899", "#ef4444", "#f97316", "#22c55e", "#14b8a6", "#0ea5e9",
];

pub const CHAT_DEFAULT_SIZE: (i32, i32) = (18, 16);
pub const CHAT_MIN_SIZE: (i32, i32) = (18, 14);
pub const TEXT_DEFAULT_SIZE: (i32, i32) = (8, 4);
pub const TEXT_MIN_SIZE: (i32, i32) = (4, 2);

const DEFAULT_PROMPT: &str = "You are a helpful assistant.";
const DEFAULT_MODEL: &str = "gpt-4";

/// Text delivered to a chatbox from another pane ("send to window").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingInput {
    pub text: String,
    pub auto_send: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatBoxPane {
    pub id: String,
    pub name: String,
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub prompt: String,
    pub model: String,
    #[serde(default)]
    pub locked: bool,
    #[serde(default = "default_true")]
    pub streaming: bool,
    pub tint_color: String,
    #[serde(default)]
    pub archived: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archived_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_input: Option<PendingInput>,
}

fn default_true() -> bool {
    true
}

impl ChatBoxPane {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        at: GridPoint,
        tint_color: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            x: at.x,
            y: at.y,
            width: CHAT_DEFAULT_SIZE.0,
            height: CHAT_DEFAULT_SIZE.1,
            prompt: DEFAULT_PROMPT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            locked: false,
            streaming: true,
            tint_color: tint_color.into(),
            archived: false,
            archived_at: None,
            pending_input: None,
        }
    }

    pub fn rect(&self) -> GridRect {
        GridRect::new(self.x, self.y, self.width, self.height)
    }

    pub fn key(&self) -> PaneKey {
        PaneKey::chat(&self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextBoxPane {
    pub id: String,
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub text: String,
    pub font_family: String,
    pub font_size: String,
    pub font_weight: String,
    pub font_style: String,
    pub text_color: String,
    pub drop_shadow: String,
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub archived: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archived_at: Option<i64>,
}

impl TextBoxPane {
    pub fn new(id: impl Into<String>, at: GridPoint) -> Self {
        Self {
            id: id.into(),
            x: at.x,
            y: at.y,
            width: TEXT_DEFAULT_SIZE.0,
            height: TEXT_DEFAULT_SIZE.1,
            text: "Your text here".to_string(),
            font_family: "sans-serif".to_string(),
            font_size: "24px".to_string(),
            font_weight: "normal".to_string(),
            font_style: "normal".to_string(),
            text_color: "#ffffff".to_string(),
            drop_shadow: "none".to_string(),
            locked: false,
            archived: false,
            archived_at: None,
        }
    }

    pub fn rect(&self) -> GridRect {
        GridRect::new(self.x, self.y, self.width, self.height)
    }

    pub fn key(&self) -> PaneKey {
        PaneKey::text(&self.id)
    }
}

/// Partial update of a chatbox record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatBoxUpdate {
    pub x: Option<i32>,
    pub y: Option<i32>,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub name: Option<String>,
    pub prompt: Option<String>,
    pub model: Option<String>,
    pub locked: Option<bool>,
    pub streaming: Option<bool>,
    pub tint_color: Option<String>,
    pub pending_input: Option<Option<PendingInput>>,
}

impl ChatBoxUpdate {
    pub fn move_to(point: GridPoint) -> Self {
        Self {
            x: Some(point.x),
            y: Some(point.y),
            ..Default::default()
        }
    }

    pub fn resize(width: i32, height: i32) -> Self {
        Self {
            width: Some(width),
            height: Some(height),
            ..Default::default()
        }
    }

    pub fn touches_geometry(&self) -> bool {
        self.x.is_some() || self.y.is_some() || self.width.is_some() || self.height.is_some()
    }
}

/// Partial update of a text pane record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextBoxUpdate {
    pub x: Option<i32>,
    pub y: Option<i32>,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub text: Option<String>,
    pub font_family: Option<String>,
    pub font_size: Option<String>,
    pub font_weight: Option<String>,
    pub font_style: Option<String>,
    pub text_color: Option<String>,
    pub drop_shadow: Option<String>,
    pub locked: Option<bool>,
}

impl TextBoxUpdate {
    pub fn move_to(point: GridPoint) -> Self {
        Self {
            x: Some(point.x),
            y: Some(point.y),
            ..Default::default()
        }
    }

    pub fn touches_geometry(&self) -> bool {
        self.x.is_some() || self.y.is_some() || self.width.is_some() || self.height.is_some()
    }
}

/// Result of submitting an update to the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometryCommit {
    Committed,
    /// The new geometry would overlap another pane; nothing was changed.
    Rejected,
    NotFound,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Canvas {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub chat_boxes: Vec<ChatBoxPane>,
    #[serde(default)]
    pub text_boxes: Vec<TextBoxPane>,
}

impl Canvas {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            chat_boxes: Vec::new(),
            text_boxes: Vec::new(),
        }
    }

    /// Non-archived panes of both kinds.
    pub fn placed_panes(&self) -> Vec<PlacedPane> {
        let chats = self
            .chat_boxes
            .iter()
            .filter(|b| !b.archived)
            .map(|b| PlacedPane {
                key: b.key(),
                rect: b.rect(),
            });
        let texts = self
            .text_boxes
            .iter()
            .filter(|b| !b.archived)
            .map(|b| PlacedPane {
                key: b.key(),
                rect: b.rect(),
            });
        chats.chain(texts).collect()
    }

    pub fn content_bounds(&self) -> Option<ContentBounds> {
        let rects: Vec<GridRect> = self.placed_panes().into_iter().map(|p| p.rect).collect();
        ContentBounds::of(&rects)
    }

    pub fn chat_box(&self, id: &str) -> Option<&ChatBoxPane> {
        self.chat_boxes.iter().find(|b| b.id == id)
    }

    pub fn text_box(&self, id: &str) -> Option<&TextBoxPane> {
        self.text_boxes.iter().find(|b| b.id == id)
    }

    pub fn rect_of(&self, key: &PaneKey) -> Option<GridRect> {
        match key.kind {
            PaneKind::Chat => self.chat_box(&key.id).map(ChatBoxPane::rect),
            PaneKind::Text => self.text_box(&key.id).map(TextBoxPane::rect),
        }
    }

    pub fn is_pane_locked(&self, key: &PaneKey) -> bool {
        match key.kind {
            PaneKind::Chat => self.chat_box(&key.id).is_some_and(|b| b.locked),
            PaneKind::Text => self.text_box(&key.id).is_some_and(|b| b.locked),
        }
    }

    /// Applies `update` unless its geometry would overlap another live pane.
    ///
    /// The pane named by `dragging` is exempt from the collision check and is
    /// snapped by [`Canvas::snap_to_free`] when the drag ends.
    pub fn apply_chat_update(
        &mut self,
        id: &str,
        update: &ChatBoxUpdate,
        dragging: Option<&PaneKey>,
    ) -> GeometryCommit {
        let key = PaneKey::chat(id);
        let Some(current) = self.chat_box(id).map(ChatBoxPane::rect) else {
            return GeometryCommit::NotFound;
        };

        if update.touches_geometry() && dragging != Some(&key) {
            let proposed = GridRect::new(
                update.x.unwrap_or(current.x),
                update.y.unwrap_or(current.y),
                update
                    .width
                    .unwrap_or(current.width)
                    .max(CHAT_MIN_SIZE.0),
                update
                    .height
                    .unwrap_or(current.height)
                    .max(CHAT_MIN_SIZE.1),
            );
            if check_collision(&self.placed_panes(), &proposed, Some(&key)) {
                return GeometryCommit::Rejected;
            }
        }

        let Some(pane) = self.chat_boxes.iter_mut().find(|b| b.id == id) else {
            return GeometryCommit::NotFound;
        };
        if let Some(x) = update.x {
            pane.x = x;
        }
        if let Some(y) = update.y {
            pane.y = y;
        }
        if let Some(width) = update.width {
            pane.width = width.max(CHAT_MIN_SIZE.0);
        }
        if let Some(height) = update.height {
            pane.height = height.max(CHAT_MIN_SIZE.1);
        }
        if let Some(name) = &update.name {
            pane.name = name.clone();
        }
        if let Some(prompt) = &update.prompt {
            pane.prompt = prompt.clone();
        }
        if let Some(model) = &update.model {
            pane.model = model.clone();
        }
        if let Some(locked) = update.locked {
            pane.locked = locked;
        }
        if let Some(streaming) = update.streaming {
            pane.streaming = streaming;
        }
        if let Some(tint) = &update.tint_color {
            pane.tint_color = tint.clone();
        }
        if let Some(pending) = &update.pending_input {
            pane.pending_input = pending.clone();
        }
        GeometryCommit::Committed
    }

    /// Text pane counterpart of [`Canvas::apply_chat_update`].
    pub fn apply_text_update(
        &mut self,
        id: &str,
        update: &TextBoxUpdate,
        dragging: Option<&PaneKey>,
    ) -> GeometryCommit {
        let key = PaneKey::text(id);
        let Some(current) = self.text_box(id).map(TextBoxPane::rect) else {
            return GeometryCommit::NotFound;
        };

        if update.touches_geometry() && dragging != Some(&key) {
            let proposed = GridRect::new(
                update.x.unwrap_or(current.x),
                update.y.unwrap_or(current.y),
                update
                    .width
                    .unwrap_or(current.width)
                    .max(TEXT_MIN_SIZE.0),
                update
                    .height
                    .unwrap_or(current.height)
                    .max(TEXT_MIN_SIZE.1),
            );
            if check_collision(&self.placed_panes(), &proposed, Some(&key)) {
                return GeometryCommit::Rejected;
            }
        }

        let Some(pane) = self.text_boxes.iter_mut().find(|b| b.id == id) else {
            return GeometryCommit::NotFound;
        };
        if let Some(x) = update.x {
            pane.x = x;
        }
        if let Some(y) = update.y {
            pane.y = y;
        }
        if let Some(width) = update.width {
            pane.width = width.max(TEXT_MIN_SIZE.0);
        }
        if let Some(height) = update.height {
            pane.height = height.max(TEXT_MIN_SIZE.1);
        }
        if let Some(text) = &update.text {
            pane.text = text.clone();
        }
        if let Some(v) = &update.font_family {
            pane.font_family = v.clone();
        }
        if let Some(v) = &update.font_size {
            pane.font_size = v.clone();
        }
        if let Some(v) = &update.font_weight {
            pane.font_weight = v.clone();
        }
        if let Some(v) = &update.font_style {
            pane.font_style = v.clone();
        }
        if let Some(v) = &update.text_color {
            pane.text_color = v.clone();
        }
        if let Some(v) = &update.drop_shadow {
            pane.drop_shadow = v.clone();
        }
        if let Some(locked) = update.locked {
            pane.locked = locked;
        }
        GeometryCommit::Committed
    }

    /// Moves the pane to the nearest free cell. Returns the final origin.
    pub fn snap_to_free(&mut self, key: &PaneKey) -> Option<GridPoint> {
        let rect = self.rect_of(key)?;
        let target = find_nearest_free_position(&self.placed_panes(), key, rect);
        match key.kind {
            PaneKind::Chat => {
                let pane = self.chat_boxes.iter_mut().find(|b| b.id == key.id)?;
                pane.x = target.x;
                pane.y = target.y;
            }
            PaneKind::Text => {
                let pane = self.text_boxes.iter_mut().find(|b| b.id == key.id)?;
                pane.x = target.x;
                pane.y = target.y;
            }
        }
        Some(target)
    }

    /// Flags the pane archived. Returns false for unknown or already archived panes.
    pub fn archive(&mut self, key: &PaneKey, now_ms: i64) -> bool {
        let flags = match key.kind {
            PaneKind::Chat => self
                .chat_boxes
                .iter_mut()
                .find(|b| b.id == key.id)
                .map(|b| (&mut b.archived, &mut b.archived_at)),
            PaneKind::Text => self
                .text_boxes
                .iter_mut()
                .find(|b| b.id == key.id)
                .map(|b| (&mut b.archived, &mut b.archived_at)),
        };
        match flags {
            Some((archived, archived_at)) if !*archived => {
                *archived = true;
                *archived_at = Some(now_ms);
                true
            }
            _ => false,
        }
    }

    /// Brings an archived pane back, snapped to the nearest free cell.
    pub fn unarchive(&mut self, key: &PaneKey) -> Option<GridPoint> {
        let flags = match key.kind {
            PaneKind::Chat => self
                .chat_boxes
                .iter_mut()
                .find(|b| b.id == key.id && b.archived)
                .map(|b| (&mut b.archived, &mut b.archived_at)),
            PaneKind::Text => self
                .text_boxes
                .iter_mut()
                .find(|b| b.id == key.id && b.archived)
                .map(|b| (&mut b.archived, &mut b.archived_at)),
        };
        let (archived, archived_at) = flags?;
        *archived = false;
        *archived_at = None;
        self.snap_to_free(key)
    }

    /// Drops panes archived before `cutoff_ms`. Returns how many were removed.
    pub fn purge_archived_before(&mut self, cutoff_ms: i64) -> usize {
        let expired =
            |archived: bool, at: Option<i64>| archived && at.is_some_and(|t| t < cutoff_ms);
        let before = self.chat_boxes.len() + self.text_boxes.len();
        self.chat_boxes.retain(|b| !expired(b.archived, b.archived_at));
        self.text_boxes.retain(|b| !expired(b.archived, b.archived_at));
        before - (self.chat_boxes.len() + self.text_boxes.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn canvas_with_two() -> Canvas {
        let mut canvas = Canvas::new("1", "Canvas 1");
        canvas
            .chat_boxes
            .push(ChatBoxPane::new("a", "Agent 1", GridPoint::new(2, 2), "#3b82f6"));
        canvas
            .chat_boxes
            .push(ChatBoxPane::new("b", "Agent 2", GridPoint::new(20, 2), "#22c55e"));
        canvas
    }

    #[test]
    fn test_overlapping_move_is_rejected() {
        let mut canvas = canvas_with_two();
        let update = ChatBoxUpdate::move_to(GridPoint::new(10, 2));
        let commit = canvas.apply_chat_update("b", &update, None);
        assert_eq!(commit, GeometryCommit::Rejected);
        assert_eq!(canvas.chat_box("b").unwrap().x, 20);
    }

    #[test]
    fn test_dragged_pane_may_overlap_then_snaps() {
        let mut canvas = canvas_with_two();
        let key = PaneKey::chat("b");
        let commit = canvas.apply_chat_update(
            "b",
            &ChatBoxUpdate::move_to(GridPoint::new(10, 2)),
            Some(&key),
        );
        assert_eq!(commit, GeometryCommit::Committed);

        let snapped = canvas.snap_to_free(&key).unwrap();
        let panes = canvas.placed_panes();
        assert!(!check_collision(
            &panes,
            &canvas.chat_box("b").unwrap().rect(),
            Some(&key)
        ));
        assert_eq!(snapped, canvas.chat_box("b").unwrap().rect().origin());
    }

    #[test]
    fn test_non_geometry_update_always_applies() {
        let mut canvas = canvas_with_two();
        let update = ChatBoxUpdate {
            tint_color: Some("#ef4444".into()),
            ..Default::default()
        };
        assert_eq!(canvas.apply_chat_update("a", &update, None), GeometryCommit::Committed);
        assert_eq!(canvas.chat_box("a").unwrap().tint_color, "#ef4444");
    }

    #[test]
    fn test_resize_respects_minimum() {
        let mut canvas = canvas_with_two();
        canvas.apply_chat_update("a", &ChatBoxUpdate::resize(5, 5), None);
        let pane = canvas.chat_box("a").unwrap();
        assert_eq!((pane.width, pane.height), CHAT_MIN_SIZE);
    }

    #[test]
    fn test_unknown_pane() {
        let mut canvas = canvas_with_two();
        assert_eq!(
            canvas.apply_chat_update("zzz", &ChatBoxUpdate::default(), None),
            GeometryCommit::NotFound
        );
    }

    #[test]
    fn test_archived_pane_frees_space() {
        let mut canvas = canvas_with_two();
        assert!(canvas.archive(&PaneKey::chat("a"), 1_000));
        assert!(!canvas.archive(&PaneKey::chat("a"), 2_000));
        assert_eq!(canvas.placed_panes().len(), 1);

        let update = ChatBoxUpdate::move_to(GridPoint::new(2, 2));
        let commit = canvas.apply_chat_update("b", &update, None);
        assert_eq!(commit, GeometryCommit::Committed);
    }

    #[test]
    fn test_unarchive_avoids_overlap() {
        let mut canvas = canvas_with_two();
        canvas.archive(&PaneKey::chat("a"), 1_000);
        canvas.apply_chat_update("b", &ChatBoxUpdate::move_to(GridPoint::new(2, 2)), None);

        let restored = canvas.unarchive(&PaneKey::chat("a")).unwrap();
        assert_ne!(restored, GridPoint::new(2, 2));
        assert!(canvas.chat_box("a").unwrap().archived_at.is_none());
        assert_eq!(canvas.placed_panes().len(), 2);
    }

    #[test]
    fn test_purge_archived_before_cutoff() {
        let mut canvas = canvas_with_two();
        canvas.text_boxes.push(TextBoxPane::new("t", GridPoint::new(2, 30)));
        canvas.archive(&PaneKey::chat("a"), 100);
        canvas.archive(&PaneKey::text("t"), 900);

        assert_eq!(canvas.purge_archived_before(500), 1);
        assert!(canvas.chat_box("a").is_none());
        assert!(canvas.text_box("t").is_some());
    }

    #[test]
    fn test_serialized_shape() {
        let canvas = canvas_with_two();
        let json = serde_json::to_value(&canvas).unwrap();
        assert_eq!(json["chatBoxes"][0]["tintColor"], "#3b82f6");
        assert_eq!(json["chatBoxes"][0]["streaming"], true);
        assert!(json["chatBoxes"][0].get("archivedAt").is_none());
    }
}
