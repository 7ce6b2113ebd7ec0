//! Rectangles and the zone → pixel projection.
//!
//! Zones are authored in screen-relative fractions ([`RelativeRect`]) so the
//! same layout can be laid over screens of any size.  A [`GeometryProjector`]
//! turns one of those fractions plus a screen's usable area into an absolute
//! [`Rect`] the compositor can apply.

use crate::screen::ScreenInfo;
use serde::{Deserialize, Serialize};

/// Zone edges closer than this to a screen edge count as touching it.
const EDGE_TOLERANCE: f64 = 0.005;

/// An absolute rectangle in compositor pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// A rectangle with non-positive width or height must never be applied.
    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    pub fn center(&self) -> (f64, f64) {
        (
            self.x as f64 + self.width as f64 / 2.0,
            self.y as f64 + self.height as f64 / 2.0,
        )
    }

    /// Smallest rectangle covering both `self` and `other`.
    pub fn union(&self, other: &Rect) -> Rect {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        Rect {
            x,
            y,
            width: self.right().max(other.right()) - x,
            height: self.bottom().max(other.bottom()) - y,
        }
    }
}

/// A rectangle expressed as fractions of a screen, each coordinate in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RelativeRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl RelativeRect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn left(&self) -> f64 {
        self.x
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn top(&self) -> f64 {
        self.y
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Whether every coordinate lies in `[0, 1]` and the area is non-empty.
    pub fn is_valid(&self) -> bool {
        let in_unit = |v: f64| (0.0..=1.0).contains(&v);
        in_unit(self.x)
            && in_unit(self.y)
            && self.width > 0.0
            && self.height > 0.0
            && self.right() <= 1.0 + EDGE_TOLERANCE
            && self.bottom() <= 1.0 + EDGE_TOLERANCE
    }
}

/// Projects relative zone geometry onto a physical screen.
///
/// This is one of the two seams of the engine; tests and alternative hosts
/// (for example one that applies per-zone padding) provide their own.
pub trait GeometryProjector {
    /// Project a single zone.  Returns `None` when the result would have a
    /// non-positive width or height.
    fn project(&self, zone: &RelativeRect, screen: &ScreenInfo) -> Option<Rect>;

    /// Project a window spanning several zones: the union of every
    /// projected zone.
    fn project_span(&self, zones: &[RelativeRect], screen: &ScreenInfo) -> Option<Rect> {
        let mut rects = zones.iter().map(|z| self.project(z, screen));
        let first = rects.next()??;
        rects.try_fold(first, |acc, r| r.map(|r| acc.union(&r)))
    }
}

/// Default projector: maps onto the screen's usable area (panels excluded)
/// and applies `outer` gaps along screen edges and half of `inner` on every
/// edge shared with another zone, so two neighbours end up `inner` apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GapProjector {
    pub outer: i32,
    pub inner: i32,
}

impl Default for GapProjector {
    fn default() -> Self {
        Self { outer: 8, inner: 8 }
    }
}

impl GapProjector {
    pub fn new(outer: i32, inner: i32) -> Self {
        Self { outer, inner }
    }
}

impl GeometryProjector for GapProjector {
    fn project(&self, zone: &RelativeRect, screen: &ScreenInfo) -> Option<Rect> {
        let area = screen.usable_area();
        let (ax, ay) = (area.x as f64, area.y as f64);
        let (aw, ah) = (area.width as f64, area.height as f64);

        let outer = self.outer.max(0) as f64;
        let half_inner = self.inner.max(0) as f64 / 2.0;
        let pad = |touches_edge: bool| if touches_edge { outer } else { half_inner };

        let left = ax + zone.left() * aw + pad(zone.left() <= EDGE_TOLERANCE);
        let right = ax + zone.right() * aw - pad(zone.right() >= 1.0 - EDGE_TOLERANCE);
        let top = ay + zone.top() * ah + pad(zone.top() <= EDGE_TOLERANCE);
        let bottom = ay + zone.bottom() * ah - pad(zone.bottom() >= 1.0 - EDGE_TOLERANCE);

        let x = left.round() as i32;
        let y = top.round() as i32;
        let rect = Rect::new(x, y, right.round() as i32 - x, bottom.round() as i32 - y);
        rect.is_valid().then_some(rect)
    }
}

//  Tests
