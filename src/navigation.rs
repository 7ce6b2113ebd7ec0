//! Geometric zone navigation.
//!
//! [`adjacent`] finds the neighbouring zone in a compass direction and
//! [`edge_zone`] the zone at a layout's boundary, used when a window that is
//! not snapped yet receives its first navigation command.
//!
//! Zones are compared by their centres.  A candidate qualifies only when its
//! centre lies strictly on the requested side; among those the lowest
//! `primary + 2 × perpendicular` distance wins, which prefers zones that are
//! in line over zones that are merely further over.  Exact ties keep the
//! first candidate in layout order.

use crate::command::Direction;
use crate::geometry::{GeometryProjector, Rect};
use crate::layout::{Layout, Zone, ZoneId};
use crate::screen::ScreenInfo;
use crate::traits::LayoutProvider;

/// Weight applied to the perpendicular-axis distance.
const PERPENDICULAR_WEIGHT: f64 = 2.0;

/// Score of moving from centre `from` to centre `to` in `direction`, or
/// `None` when `to` is not strictly on that side.
fn direction_score(from: (f64, f64), to: (f64, f64), direction: Direction) -> Option<f64> {
    let dx = to.0 - from.0;
    let dy = to.1 - from.1;
    let (primary, perpendicular) = match direction {
        Direction::Left => (-dx, dy.abs()),
        Direction::Right => (dx, dy.abs()),
        Direction::Up => (-dy, dx.abs()),
        Direction::Down => (dy, dx.abs()),
    };
    (primary > 0.0).then(|| primary + PERPENDICULAR_WEIGHT * perpendicular)
}

/// The best zone of `layout` in `direction` from zone `from`.
pub fn adjacent<'a>(layout: &'a Layout, from: &ZoneId, direction: Direction) -> Option<&'a Zone> {
    let origin = layout.zone(from)?.geometry.center();
    let mut best: Option<(&Zone, f64)> = None;
    for zone in layout.zones.iter().filter(|z| &z.id != from) {
        let Some(score) = direction_score(origin, zone.geometry.center(), direction) else {
            continue;
        };
        if best.map_or(true, |(_, s)| score < s) {
            best = Some((zone, score));
        }
    }
    best.map(|(zone, _)| zone)
}

/// The zone with the extreme edge of `layout` in `direction`: smallest left
/// edge for left, largest right edge for right, smallest top edge for up,
/// largest bottom edge for down.
pub fn edge_zone(layout: &Layout, direction: Direction) -> Option<&Zone> {
    let key = |z: &Zone| match direction {
        Direction::Left => -z.geometry.left(),
        Direction::Right => z.geometry.right(),
        Direction::Up => -z.geometry.top(),
        Direction::Down => z.geometry.bottom(),
    };
    let mut best: Option<(&Zone, f64)> = None;
    for zone in &layout.zones {
        let k = key(zone);
        if best.map_or(true, |(_, b)| k > b) {
            best = Some((zone, k));
        }
    }
    best.map(|(zone, _)| zone)
}

/// A zone found by navigation, with the screen it was resolved on when
/// that is known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationTarget {
    pub zone: ZoneId,
    pub screen: Option<String>,
}

/// Resolve the neighbour of `from` in `direction`.
///
/// The zone's owning layout is searched first, whichever screen it is
/// active on.  Only when no layout in use owns the zone is the window's
/// absolute geometry (`from_rect`) compared against every screen's projected
/// zones.
pub fn resolve_adjacent<L, P>(
    layouts: &L,
    screens: &[ScreenInfo],
    projector: &P,
    from: &ZoneId,
    from_rect: Option<Rect>,
    direction: Direction,
) -> Option<NavigationTarget>
where
    L: LayoutProvider + ?Sized,
    P: GeometryProjector + ?Sized,
{
    if let Some(owner) = layouts.owner_of(from) {
        return adjacent(owner, from, direction).map(|zone| NavigationTarget {
            zone: zone.id.clone(),
            screen: None,
        });
    }
    let origin = from_rect?.center();
    let mut best: Option<(NavigationTarget, f64)> = None;
    for screen in screens {
        let Some(layout) = layouts.layout_for_screen(&screen.name) else {
            continue;
        };
        for zone in layout.zones.iter().filter(|z| &z.id != from) {
            let Some(rect) = projector.project(&zone.geometry, screen) else {
                continue;
            };
            let Some(score) = direction_score(origin, rect.center(), direction) else {
                continue;
            };
            if best.as_ref().map_or(true, |(_, s)| score < *s) {
                best = Some((
                    NavigationTarget {
                        zone: zone.id.clone(),
                        screen: Some(screen.name.clone()),
                    },
                    score,
                ));
            }
        }
    }
    best.map(|(target, _)| target)
}

//  Tests
