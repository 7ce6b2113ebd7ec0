//! Rotation and resnap planning.
//!
//! Both operations walk a deterministic *ring* of zones (see [`zone_ring`])
//! and move every snapped window along it.  Planning is pure: a
//! [`RotationPlan`] lists the moves with geometry already projected onto
//! each window's own screen, and [`RotationPlan::apply`] commits it to the
//! store.

use crate::command::RotationEntry;
use crate::geometry::GeometryProjector;
use crate::layout::{Layout, Zone, ZoneId};
use crate::screen::ScreenInfo;
use crate::store::AssignmentStore;
use crate::traits::LayoutProvider;
use log::{debug, warn};
use std::collections::HashMap;

/// Zones of `layout` in ring order.
///
/// Ascending zone number when the numbers are exactly `1..=n`; declaration
/// order when they are duplicated or have gaps.
pub fn zone_ring(layout: &Layout) -> Vec<&Zone> {
    let mut by_number: Vec<&Zone> = layout.zones.iter().collect();
    by_number.sort_by_key(|z| z.number);
    let sequential = by_number
        .iter()
        .enumerate()
        .all(|(i, z)| z.number as usize == i + 1);
    if sequential {
        by_number
    } else {
        debug!(
            "layout {:?}: zone numbers not sequential, using declaration order",
            layout.name
        );
        layout.zones.iter().collect()
    }
}

/// Moves computed by [`plan_rotation`] or [`plan_resnap`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RotationPlan {
    pub entries: Vec<RotationEntry>,
    /// Per-screen old → new zone mapping; also applied to floating markers.
    pub remaps: Vec<(String, HashMap<ZoneId, ZoneId>)>,
    /// Screens that had an active layout.
    pub screens_considered: usize,
    /// Of those, screens whose layout has fewer than two zones.
    pub single_zone_screens: usize,
}

impl RotationPlan {
    /// Commit the planned moves to `store`.  Spanning windows collapse onto
    /// their new primary zone.
    pub fn apply(&self, store: &mut AssignmentStore) {
        for entry in &self.entries {
            let Some(current) = store.assignment(&entry.window).cloned() else {
                continue;
            };
            store.assign(
                &entry.window,
                vec![entry.to_zone.clone()],
                &current.screen,
                current.desktop,
                current.sticky,
            );
        }
        for (screen, mapping) in &self.remaps {
            store.remap_float_zones(screen, mapping);
        }
    }
}

/// Plan a one-step rotation of every snapped window on `screens` (all of
/// them unless `screen_filter` names one).
pub fn plan_rotation<L, P>(
    store: &AssignmentStore,
    layouts: &L,
    screens: &[ScreenInfo],
    projector: &P,
    clockwise: bool,
    screen_filter: Option<&str>,
) -> RotationPlan
where
    L: LayoutProvider + ?Sized,
    P: GeometryProjector + ?Sized,
{
    let mut plan = RotationPlan::default();
    for screen in screens
        .iter()
        .filter(|s| screen_filter.map_or(true, |f| f == s.name))
    {
        let Some(layout) = layouts.layout_for_screen(&screen.name) else {
            continue;
        };
        plan.screens_considered += 1;
        let ring = zone_ring(layout);
        let n = ring.len();
        if n < 2 {
            plan.single_zone_screens += 1;
            continue;
        }
        let step = |i: usize| if clockwise { (i + 1) % n } else { (i + n - 1) % n };
        let mapping: HashMap<ZoneId, ZoneId> = ring
            .iter()
            .enumerate()
            .map(|(i, z)| (z.id.clone(), ring[step(i)].id.clone()))
            .collect();

        for (window, assignment) in store.assignments().filter(|(_, a)| a.screen == screen.name) {
            let Some(pos) = ring.iter().position(|z| z.id == assignment.primary) else {
                continue;
            };
            let to = ring[step(pos)];
            match projector.project(&to.geometry, screen) {
                Some(geometry) => plan.entries.push(RotationEntry {
                    window: window.clone(),
                    from_zone: assignment.primary.clone(),
                    to_zone: to.id.clone(),
                    geometry,
                }),
                None => warn!("rotation: zone {} does not fit on {}", to.id, screen.name),
            }
        }
        plan.remaps.push((screen.name.clone(), mapping));
    }
    plan
}

/// Plan the move of every window on `screen` from `old` to `new` by ring
/// position, cycling when `new` has fewer zones.  Windows whose zone is not
/// part of `old` get no entry.
pub fn plan_resnap<P>(
    store: &AssignmentStore,
    old: &Layout,
    new: &Layout,
    screen: &ScreenInfo,
    projector: &P,
) -> RotationPlan
where
    P: GeometryProjector + ?Sized,
{
    let mut plan = RotationPlan {
        screens_considered: 1,
        ..RotationPlan::default()
    };
    let old_ring = zone_ring(old);
    let new_ring = zone_ring(new);
    if new_ring.is_empty() {
        return plan;
    }
    if new_ring.len() < 2 {
        plan.single_zone_screens = 1;
    }
    let mapping: HashMap<ZoneId, ZoneId> = old_ring
        .iter()
        .enumerate()
        .map(|(i, z)| (z.id.clone(), new_ring[i % new_ring.len()].id.clone()))
        .collect();

    for (window, assignment) in store.assignments().filter(|(_, a)| a.screen == screen.name) {
        let Some(to_id) = mapping.get(&assignment.primary) else {
            continue;
        };
        let Some(to) = new.zone(to_id) else {
            continue;
        };
        match projector.project(&to.geometry, screen) {
            Some(geometry) => plan.entries.push(RotationEntry {
                window: window.clone(),
                from_zone: assignment.primary.clone(),
                to_zone: to.id.clone(),
                geometry,
            }),
            None => warn!("resnap: zone {} does not fit on {}", to.id, screen.name),
        }
    }
    plan.remaps.push((screen.name.clone(), mapping));
    plan
}

//  Tests
