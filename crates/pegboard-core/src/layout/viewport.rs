//! Canvas viewport: zoom, pan and wheel gesture arbitration.

use std::time::{Duration, Instant};

use super::geometry::GridRect;

pub const MIN_ZOOM: f64 = 0.25;
pub const MAX_ZOOM: f64 = 3.0;
const ZOOM_STEP: f64 = 0.1;
const WHEEL_ZOOM_SPEED: f64 = 0.01;
const FIT_PADDING: i32 = 4;
const FIT_MAX_ZOOM: f64 = 2.0;

/// A position in screen pixels, relative to the canvas container.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PixelPoint {
    pub x: f64,
    pub y: f64,
}

impl PixelPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Area available for the canvas, in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContainerSize {
    pub width: f64,
    pub height: f64,
}

impl ContainerSize {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Shrinks the height by a strip (such as the canvas tab bar) that
    /// overlays the bottom of the container.
    pub fn without_bottom_strip(self, strip_px: f64) -> Self {
        Self {
            width: self.width,
            height: (self.height - strip_px).max(0.0),
        }
    }
}

/// Bounding box of a set of panes in grid units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentBounds {
    pub min_x: i32,
    pub min_y: i32,
    pub max_x: i32,
    pub max_y: i32,
}

impl ContentBounds {
    /// Returns `None` when there are no rectangles.
    pub fn of<'a>(rects: impl IntoIterator<Item = &'a GridRect>) -> Option<Self> {
        rects.into_iter().fold(None, |acc, r| {
            Some(match acc {
                None => Self {
                    min_x: r.x,
                    min_y: r.y,
                    max_x: r.right(),
                    max_y: r.bottom(),
                },
                Some(b) => Self {
                    min_x: b.min_x.min(r.x),
                    min_y: b.min_y.min(r.y),
                    max_x: b.max_x.max(r.right()),
                    max_y: b.max_y.max(r.bottom()),
                },
            })
        })
    }

    fn padded(self, padding: i32) -> Self {
        Self {
            min_x: self.min_x - padding,
            min_y: self.min_y - padding,
            max_x: self.max_x + padding,
            max_y: self.max_y + padding,
        }
    }
}

/// One wheel / touchpad event over the canvas.
#[derive(Debug, Clone, PartialEq)]
pub struct WheelInput {
    pub delta_x: f64,
    pub delta_y: f64,
    /// Pinch gesture or ctrl held.
    pub zoom_modifier: bool,
    pub cursor: PixelPoint,
    /// Scrollable element with overflowing content under the pointer, if any.
    pub scroll_region: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WheelOutcome {
    Zoomed { zoom: f64 },
    Panned,
    /// The event belongs to the scrollable region, which is highlighted.
    NativeScroll { region: String },
}

#[derive(Debug, Clone)]
struct ScrollHighlight {
    region: String,
    until: Instant,
}

/// Zoom level and pan offset of the canvas, plus the short-lived wheel
/// gesture state that decides between panning and native scrolling.
#[derive(Debug, Clone)]
pub struct Viewport {
    zoom: f64,
    pan: PixelPoint,
    grid_size: f64,
    pan_gesture_idle: Duration,
    highlight_duration: Duration,
    panning_until: Option<Instant>,
    highlight: Option<ScrollHighlight>,
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(20.0, Duration::from_millis(150), Duration::from_millis(300))
    }
}

impl Viewport {
    pub fn new(grid_size: f64, pan_gesture_idle: Duration, highlight_duration: Duration) -> Self {
        Self {
            zoom: 1.0,
            pan: PixelPoint::default(),
            grid_size,
            pan_gesture_idle,
            highlight_duration,
            panning_until: None,
            highlight: None,
        }
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    pub fn pan(&self) -> PixelPoint {
        self.pan
    }

    pub fn zoom_in(&mut self) {
        self.zoom = clamp_zoom(self.zoom + ZOOM_STEP);
    }

    pub fn zoom_out(&mut self) {
        self.zoom = clamp_zoom(self.zoom - ZOOM_STEP);
    }

    /// Pans by a drag of `dx`, `dy` screen pixels.
    pub fn drag_by(&mut self, dx: f64, dy: f64) {
        self.pan.x += dx;
        self.pan.y += dy;
    }

    /// Scales and centers the padded content bounds into `container`.
    pub fn fit_to_screen(&mut self, bounds: Option<ContentBounds>, container: ContainerSize) {
        let Some(bounds) = bounds else {
            self.reset_origin();
            return;
        };
        let padded = bounds.padded(FIT_PADDING);
        let content_w = f64::from(padded.max_x - padded.min_x) * self.grid_size;
        let content_h = f64::from(padded.max_y - padded.min_y) * self.grid_size;

        let fit = (container.width / content_w)
            .min(container.height / content_h)
            .min(FIT_MAX_ZOOM);
        self.zoom = fit.max(MIN_ZOOM);
        self.pan = self.centered(padded, container, content_w, content_h);
    }

    /// Zoom 1.0 with the content bounds centered in `container`.
    pub fn reset_zoom(&mut self, bounds: Option<ContentBounds>, container: ContainerSize) {
        let Some(bounds) = bounds else {
            self.reset_origin();
            return;
        };
        let content_w = f64::from(bounds.max_x - bounds.min_x) * self.grid_size;
        let content_h = f64::from(bounds.max_y - bounds.min_y) * self.grid_size;

        self.zoom = 1.0;
        self.pan = self.centered(bounds, container, content_w, content_h);
    }

    /// Applies a wheel event.
    ///
    /// With the zoom modifier the canvas point under the cursor stays put.
    /// Without it the canvas pans, unless no pan gesture is in progress and
    /// the pointer is over an overflowing scroll region, which then keeps the
    /// event and is highlighted.
    pub fn wheel(&mut self, input: WheelInput, now: Instant) -> WheelOutcome {
        if input.zoom_modifier {
            let new_zoom = clamp_zoom(self.zoom - input.delta_y * WHEEL_ZOOM_SPEED);
            let canvas_x = (input.cursor.x - self.pan.x) / self.zoom;
            let canvas_y = (input.cursor.y - self.pan.y) / self.zoom;
            self.pan = PixelPoint::new(
                input.cursor.x - canvas_x * new_zoom,
                input.cursor.y - canvas_y * new_zoom,
            );
            self.zoom = new_zoom;
            return WheelOutcome::Zoomed { zoom: new_zoom };
        }

        if !self.is_panning(now) {
            if let Some(region) = input.scroll_region {
                self.highlight = Some(ScrollHighlight {
                    region: region.clone(),
                    until: now + self.highlight_duration,
                });
                return WheelOutcome::NativeScroll { region };
            }
        }

        self.highlight = None;
        self.panning_until = Some(now + self.pan_gesture_idle);
        self.pan.x -= input.delta_x / self.zoom;
        self.pan.y -= input.delta_y / self.zoom;
        WheelOutcome::Panned
    }

    /// True while wheel events keep arriving within the idle window.
    pub fn is_panning(&self, now: Instant) -> bool {
        self.panning_until.is_some_and(|until| now < until)
    }

    pub fn highlighted_region(&self, now: Instant) -> Option<&str> {
        self.highlight
            .as_ref()
            .filter(|h| now < h.until)
            .map(|h| h.region.as_str())
    }

    /// Converts a screen point into canvas pixel coordinates.
    pub fn to_canvas(&self, point: PixelPoint) -> PixelPoint {
        PixelPoint::new(
            (point.x - self.pan.x) / self.zoom,
            (point.y - self.pan.y) / self.zoom,
        )
    }

    fn reset_origin(&mut self) {
        self.zoom = 1.0;
        self.pan = PixelPoint::default();
    }

    fn centered(
        &self,
        bounds: ContentBounds,
        container: ContainerSize,
        content_w: f64,
        content_h: f64,
    ) -> PixelPoint {
        PixelPoint::new(
            (container.width - content_w * self.zoom) / 2.0
                - f64::from(bounds.min_x) * self.grid_size * self.zoom,
            (container.height - content_h * self.zoom) / 2.0
                - f64::from(bounds.min_y) * self.grid_size * self.zoom,
        )
    }
}

fn clamp_zoom(zoom: f64) -> f64 {
    zoom.clamp(MIN_ZOOM, MAX_ZOOM)
}
