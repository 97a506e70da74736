//! Collision detection and free-cell search.
//!
//! All searches are deterministic scans over integer grid cells so that the
//! same canvas always yields the same placement.

use super::geometry::{GridPoint, GridRect, PaneKey, PlacedPane};

const SCAN_ORIGIN: i32 = 2;
const SCAN_STEP: usize = 2;
const FREE_SCAN_LIMIT: i32 = 50;
const FALLBACK_SCAN_LIMIT: i32 = 60;
const MAX_SEARCH_RADIUS: i32 = 50;

/// Returns true when `candidate` overlaps any pane other than `exclude`.
///
/// A brand new pane passes `None` and is checked against everything.
pub fn check_collision(
    occupied: &[PlacedPane],
    candidate: &GridRect,
    exclude: Option<&PaneKey>,
) -> bool {
    occupied
        .iter()
        .filter(|pane| exclude != Some(&pane.key))
        .any(|pane| pane.rect.overlaps(candidate))
}

/// First collision-free cell for a new `width`×`height` pane, scanning rows
/// top to bottom and columns left to right on even cells.
///
/// Falls back to `(2, 2)` when the scanned area is full.
pub fn find_free_position(occupied: &[PlacedPane], width: i32, height: i32) -> GridPoint {
    scan(occupied, None, width, height, FREE_SCAN_LIMIT)
        .unwrap_or(GridPoint::new(SCAN_ORIGIN, SCAN_ORIGIN))
}

/// Closest collision-free cell to `rect`'s origin for the pane `key`.
///
/// The current cell wins when free. Otherwise square rings of increasing
/// Chebyshev radius are walked (column-major within a ring), then the whole
/// canvas is scanned from `(2, 2)`. If nothing is free the original origin
/// is returned and the pane stays overlapping.
pub fn find_nearest_free_position(
    occupied: &[PlacedPane],
    key: &PaneKey,
    rect: GridRect,
) -> GridPoint {
    let start = rect.origin();
    if !check_collision(occupied, &rect, Some(key)) {
        return start;
    }

    for radius in 1..MAX_SEARCH_RADIUS {
        for dx in -radius..=radius {
            for dy in -radius..=radius {
                if dx.abs() != radius && dy.abs() != radius {
                    continue;
                }
                let point = GridPoint::new(start.x + dx, start.y + dy);
                if !check_collision(occupied, &rect.at(point), Some(key)) {
                    return point;
                }
            }
        }
    }

    scan(occupied, Some(key), rect.width, rect.height, FALLBACK_SCAN_LIMIT).unwrap_or(start)
}

fn scan(
    occupied: &[PlacedPane],
    exclude: Option<&PaneKey>,
    width: i32,
    height: i32,
    limit: i32,
) -> Option<GridPoint> {
    for y in (SCAN_ORIGIN..limit).step_by(SCAN_STEP) {
        for x in (SCAN_ORIGIN..limit).step_by(SCAN_STEP) {
            if !check_collision(occupied, &GridRect::new(x, y, width, height), exclude) {
                return Some(GridPoint::new(x, y));
            }
        }
    }
    None
}
