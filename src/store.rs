//! The authoritative window → zone mapping.
//!
//! Every mutation of snap state goes through [`AssignmentStore`], which
//! records a [`StoreChange`] for each mapping that actually changed.  The
//! engine drains those changes after every event to schedule persistence,
//! so a re-assignment to the same zone must not produce one.
//!
//! Besides live assignments the store keeps the restart-surviving
//! [`PendingAssignment`]s, pre-snap geometries, floating markers, the
//! single [`LastUsedZone`] and the set of classes the user has ever snapped
//! by hand.

use crate::command::WindowHandle;
use crate::geometry::Rect;
use crate::identity::{StableKey, TrackingKey, WindowIdentity};
use crate::layout::{Layout, ZoneId};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use uuid::Uuid;

/// A live window's place in a layout.
///
/// The primary zone is held separately so an assignment can never be
/// built without at least one zone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub primary: ZoneId,
    /// Further zones the window spans.
    pub extra: Vec<ZoneId>,
    pub screen: String,
    /// Virtual desktop, `0` = unknown / any.
    pub desktop: u32,
    pub sticky: bool,
}

impl Assignment {
    /// Build an assignment from a zone list (duplicates removed, order
    /// kept).  Returns `None` for an empty list.
    pub fn new(zones: Vec<ZoneId>, screen: &str, desktop: u32, sticky: bool) -> Option<Self> {
        let mut unique: Vec<ZoneId> = Vec::with_capacity(zones.len());
        for zone in zones {
            if !unique.contains(&zone) {
                unique.push(zone);
            }
        }
        let mut iter = unique.into_iter();
        let primary = iter.next()?;
        Some(Self {
            primary,
            extra: iter.collect(),
            screen: screen.to_string(),
            desktop,
            sticky,
        })
    }

    pub fn zones(&self) -> Vec<ZoneId> {
        std::iter::once(self.primary.clone())
            .chain(self.extra.iter().cloned())
            .collect()
    }

    pub fn contains(&self, zone: &ZoneId) -> bool {
        &self.primary == zone || self.extra.contains(zone)
    }

    pub fn is_spanning(&self) -> bool {
        !self.extra.is_empty()
    }

    /// Whether any zone is a transient selector marker.
    pub fn is_transient(&self) -> bool {
        self.primary.is_transient() || self.extra.iter().any(ZoneId::is_transient)
    }
}

/// The restart-surviving echo of an [`Assignment`], keyed by stable key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingAssignment {
    pub zones: Vec<ZoneId>,
    pub screen: String,
    pub desktop: u32,
    /// Layout the zones belonged to when the window closed.
    #[serde(default)]
    pub layout: Option<Uuid>,
    #[serde(default)]
    pub pre_snap: Option<Rect>,
}

/// A window explicitly excluded from snapping, remembering where it
/// floated from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FloatMarker {
    #[serde(default)]
    pub zones: Vec<ZoneId>,
    #[serde(default)]
    pub screen: Option<String>,
}

/// The most recent *user* snap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastUsedZone {
    pub zone: ZoneId,
    pub screen: String,
    /// Lower-cased application class of the snapped window.
    pub class: String,
    pub desktop: u32,
}

/// A change to persisted or observable snap state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreChange {
    Assigned {
        window: WindowHandle,
        zones: Vec<ZoneId>,
    },
    Unassigned {
        window: WindowHandle,
    },
    PendingAdded {
        key: StableKey,
    },
    PendingConsumed {
        key: StableKey,
    },
    /// A pending restore referenced a zone or layout that no longer exists.
    PendingDropped {
        key: StableKey,
    },
    FloatingChanged,
    PreSnapChanged {
        window: WindowHandle,
    },
    LastUsedChanged,
    LastUsedDropped,
    UserSnappedClass {
        class: String,
    },
}

/// See the module documentation.
#[derive(Debug, Default)]
pub struct AssignmentStore {
    assignments: BTreeMap<WindowHandle, Assignment>,
    /// Oldest first.
    pending: BTreeMap<StableKey, Vec<PendingAssignment>>,
    pre_snap: HashMap<WindowHandle, Rect>,
    floating: HashMap<TrackingKey, FloatMarker>,
    last_used: Option<LastUsedZone>,
    user_snapped_classes: BTreeSet<String>,
    auto_snapped: HashSet<WindowHandle>,
    changes: Vec<StoreChange>,
}

impl AssignmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    //  Live assignments

    /// Assign `window` to `zones`, overwriting any prior entry.
    ///
    /// An empty zone list removes the window instead.  Returns `true` when
    /// the stored mapping changed.
    pub fn assign(
        &mut self,
        window: &WindowHandle,
        zones: Vec<ZoneId>,
        screen: &str,
        desktop: u32,
        sticky: bool,
    ) -> bool {
        let Some(assignment) = Assignment::new(zones, screen, desktop, sticky) else {
            return self.unassign(window).is_some();
        };
        if self.assignments.get(window) == Some(&assignment) {
            return false;
        }
        debug!("assign {} -> {:?} on {}", window, assignment.zones(), screen);
        self.changes.push(StoreChange::Assigned {
            window: window.clone(),
            zones: assignment.zones(),
        });
        self.assignments.insert(window.clone(), assignment);
        true
    }

    pub fn unassign(&mut self, window: &WindowHandle) -> Option<Assignment> {
        let removed = self.assignments.remove(window)?;
        debug!("unassign {}", window);
        self.auto_snapped.remove(window);
        self.changes.push(StoreChange::Unassigned {
            window: window.clone(),
        });
        Some(removed)
    }

    pub fn assignment(&self, window: &WindowHandle) -> Option<&Assignment> {
        self.assignments.get(window)
    }

    /// Zones of `window`; empty when it is not snapped.
    pub fn zones_for(&self, window: &WindowHandle) -> Vec<ZoneId> {
        self.assignments
            .get(window)
            .map(Assignment::zones)
            .unwrap_or_default()
    }

    /// Windows occupying `zone`, on any screen.
    pub fn windows_in(&self, zone: &ZoneId) -> Vec<WindowHandle> {
        self.assignments
            .iter()
            .filter(|(_, a)| a.contains(zone))
            .map(|(w, _)| w.clone())
            .collect()
    }

    /// Windows occupying `zone` on `screen`.  Desktop `0` on either side
    /// matches any desktop.
    pub fn windows_in_on(&self, zone: &ZoneId, screen: &str, desktop: u32) -> Vec<WindowHandle> {
        self.assignments
            .iter()
            .filter(|(_, a)| {
                a.contains(zone) && a.screen == screen && desktops_match(a.desktop, desktop)
            })
            .map(|(w, _)| w.clone())
            .collect()
    }

    pub fn assignments(&self) -> impl Iterator<Item = (&WindowHandle, &Assignment)> {
        self.assignments.iter()
    }

    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    /// Every screen named by an assignment, a pending restore or the
    /// last-used zone.
    pub fn screens(&self) -> BTreeSet<String> {
        let live = self.assignments.values().map(|a| &a.screen);
        let pending = self.pending.values().flatten().map(|p| &p.screen);
        let last = self.last_used.iter().map(|lu| &lu.screen);
        live.chain(pending).chain(last).cloned().collect()
    }

    /// Drop every assignment, pending restore and the last-used zone on
    /// `screen` whose zones are not all part of `layout`.  Returns the
    /// windows whose live assignment was dropped.
    pub fn on_layout_invalidated(&mut self, screen: &str, layout: &Layout) -> Vec<WindowHandle> {
        let stale: Vec<WindowHandle> = self
            .assignments
            .iter()
            .filter(|(_, a)| a.screen == screen && !layout.contains_all(&a.zones()))
            .map(|(w, _)| w.clone())
            .collect();
        for window in &stale {
            self.unassign(window);
        }

        let mut dropped_keys = Vec::new();
        for (key, entries) in self.pending.iter_mut() {
            let before = entries.len();
            entries.retain(|p| p.screen != screen || layout.contains_all(&p.zones));
            dropped_keys.extend(std::iter::repeat(key.clone()).take(before - entries.len()));
        }
        self.pending.retain(|_, entries| !entries.is_empty());
        for key in dropped_keys {
            debug!("dropping stale pending restore for {}", key);
            self.changes.push(StoreChange::PendingDropped { key });
        }

        let last_used_stale = self
            .last_used
            .as_ref()
            .is_some_and(|lu| lu.screen == screen && !layout.contains(&lu.zone));
        if last_used_stale {
            self.last_used = None;
            self.changes.push(StoreChange::LastUsedDropped);
        }
        stale
    }

    //  Window lifecycle

    /// Demote a closing window's assignment to a pending restore keyed by
    /// its stable key, then forget every per-handle record.
    ///
    /// No pending entry is created for session-only windows or for
    /// assignments that point at a transient selector marker.
    pub fn close_window(
        &mut self,
        identity: &WindowIdentity,
        layout: Option<Uuid>,
    ) -> Option<Assignment> {
        let window = &identity.handle;
        let pre_snap = self.pre_snap.remove(window);
        self.auto_snapped.remove(window);
        self.floating
            .remove(&TrackingKey::Session(window.clone()));
        let assignment = self.unassign(window)?;
        match &identity.stable {
            Some(key) if !assignment.is_transient() => {
                self.push_pending(
                    key.clone(),
                    PendingAssignment {
                        zones: assignment.zones(),
                        screen: assignment.screen.clone(),
                        desktop: assignment.desktop,
                        layout,
                        pre_snap,
                    },
                );
            }
            _ => debug!("{} closed without a restorable assignment", window),
        }
        Some(assignment)
    }

    //  Pending restores

    pub fn push_pending(&mut self, key: StableKey, pending: PendingAssignment) {
        if pending.zones.is_empty() {
            return;
        }
        self.pending.entry(key.clone()).or_default().push(pending);
        self.changes.push(StoreChange::PendingAdded { key });
    }

    /// Pending restores for `key`, oldest first.
    pub fn pending(&self, key: &StableKey) -> &[PendingAssignment] {
        self.pending.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn pending_entries(&self) -> impl Iterator<Item = (&StableKey, &PendingAssignment)> {
        self.pending
            .iter()
            .flat_map(|(k, entries)| entries.iter().map(move |p| (k, p)))
    }

    pub fn pending_count(&self) -> usize {
        self.pending.values().map(Vec::len).sum()
    }

    /// Remove the `index`-th pending restore of `key` because a window
    /// restored from it.
    pub fn consume_pending(&mut self, key: &StableKey, index: usize) -> Option<PendingAssignment> {
        let taken = self.remove_pending(key, index)?;
        self.changes
            .push(StoreChange::PendingConsumed { key: key.clone() });
        Some(taken)
    }

    /// Remove the `index`-th pending restore of `key` because it went stale.
    pub fn drop_pending(&mut self, key: &StableKey, index: usize) -> Option<PendingAssignment> {
        let taken = self.remove_pending(key, index)?;
        self.changes
            .push(StoreChange::PendingDropped { key: key.clone() });
        Some(taken)
    }

    fn remove_pending(&mut self, key: &StableKey, index: usize) -> Option<PendingAssignment> {
        let entries = self.pending.get_mut(key)?;
        if index >= entries.len() {
            return None;
        }
        let taken = entries.remove(index);
        if entries.is_empty() {
            self.pending.remove(key);
        }
        Some(taken)
    }

    //  Pre-snap geometry

    /// Remember the free geometry of `window` unless one is already recorded
    /// (only the first snap of a chain counts).  Returns `true` if stored.
    pub fn record_pre_snap(&mut self, window: &WindowHandle, geometry: Rect) -> bool {
        if self.pre_snap.contains_key(window) || !geometry.is_valid() {
            return false;
        }
        self.pre_snap.insert(window.clone(), geometry);
        self.changes.push(StoreChange::PreSnapChanged {
            window: window.clone(),
        });
        true
    }

    pub fn pre_snap(&self, window: &WindowHandle) -> Option<Rect> {
        self.pre_snap.get(window).copied()
    }

    pub fn clear_pre_snap(&mut self, window: &WindowHandle) -> Option<Rect> {
        let removed = self.pre_snap.remove(window)?;
        self.changes.push(StoreChange::PreSnapChanged {
            window: window.clone(),
        });
        Some(removed)
    }

    //  Floating

    pub fn set_floating(&mut self, key: TrackingKey, marker: FloatMarker) {
        self.floating.insert(key, marker);
        self.changes.push(StoreChange::FloatingChanged);
    }

    pub fn unfloat(&mut self, key: &TrackingKey) -> Option<FloatMarker> {
        let marker = self.floating.remove(key)?;
        self.changes.push(StoreChange::FloatingChanged);
        Some(marker)
    }

    pub fn float_marker(&self, key: &TrackingKey) -> Option<&FloatMarker> {
        self.floating.get(key)
    }

    pub fn is_floating(&self, key: &TrackingKey) -> bool {
        self.floating.contains_key(key)
    }

    pub fn float_markers(&self) -> impl Iterator<Item = (&TrackingKey, &FloatMarker)> {
        self.floating.iter()
    }

    /// Rewrite the remembered zones of markers floating from `screen`
    /// through `mapping`.  Returns how many markers changed.
    pub fn remap_float_zones(&mut self, screen: &str, mapping: &HashMap<ZoneId, ZoneId>) -> usize {
        let mut changed = 0;
        for marker in self.floating.values_mut() {
            if marker.screen.as_deref() != Some(screen) {
                continue;
            }
            let mut touched = false;
            for zone in marker.zones.iter_mut() {
                if let Some(to) = mapping.get(zone) {
                    if to != zone {
                        *zone = to.clone();
                        touched = true;
                    }
                }
            }
            if touched {
                changed += 1;
            }
        }
        if changed > 0 {
            self.changes.push(StoreChange::FloatingChanged);
        }
        changed
    }

    //  Last-used zone and snap intent

    pub fn last_used(&self) -> Option<&LastUsedZone> {
        self.last_used.as_ref()
    }

    pub fn set_last_used(&mut self, last_used: LastUsedZone) {
        if self.last_used.as_ref() == Some(&last_used) {
            return;
        }
        self.last_used = Some(last_used);
        self.changes.push(StoreChange::LastUsedChanged);
    }

    /// Record that the user snapped a window of `class` by hand.
    pub fn record_user_snap(&mut self, class: &str) {
        if class.is_empty() || self.user_snapped_classes.contains(class) {
            return;
        }
        self.user_snapped_classes.insert(class.to_string());
        self.changes.push(StoreChange::UserSnappedClass {
            class: class.to_string(),
        });
    }

    pub fn was_user_snapped(&self, class: &str) -> bool {
        self.user_snapped_classes.contains(class)
    }

    pub fn user_snapped_classes(&self) -> &BTreeSet<String> {
        &self.user_snapped_classes
    }

    /// Auto-snap marks are session state and never persisted.
    pub fn mark_auto_snapped(&mut self, window: &WindowHandle) {
        self.auto_snapped.insert(window.clone());
    }

    pub fn clear_auto_snapped(&mut self, window: &WindowHandle) {
        self.auto_snapped.remove(window);
    }

    pub fn is_auto_snapped(&self, window: &WindowHandle) -> bool {
        self.auto_snapped.contains(window)
    }

    //  Change log and bulk restore

    /// Drain the changes recorded since the last call.
    pub fn take_changes(&mut self) -> Vec<StoreChange> {
        std::mem::take(&mut self.changes)
    }

    /// Re-establish state read back from storage.  Records no changes.
    pub fn import(
        &mut self,
        pending: Vec<(StableKey, PendingAssignment)>,
        floating: Vec<(StableKey, FloatMarker)>,
        last_used: Option<LastUsedZone>,
        classes: BTreeSet<String>,
    ) {
        for (key, entry) in pending {
            if !entry.zones.is_empty() {
                self.pending.entry(key).or_default().push(entry);
            }
        }
        for (key, marker) in floating {
            self.floating.insert(TrackingKey::Stable(key), marker);
        }
        self.last_used = last_used;
        self.user_snapped_classes.extend(classes);
    }
}

/// Desktop `0` means unknown / any and matches everything.
pub fn desktops_match(a: u32, b: u32) -> bool {
    a == 0 || b == 0 || a == b
}

//  Tests

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::WindowInfo;

    fn win(h: &str) -> WindowHandle {
        WindowHandle::from(h)
    }

    #[test]
    fn assignment_requires_a_zone() {
        assert!(Assignment::new(vec![], "DP-1", 1, false).is_none());
        let z = ZoneId::new();
        let a = Assignment::new(vec![z.clone(), z.clone()], "DP-1", 1, false).unwrap();
        assert_eq!(a.zones(), vec![z]);
        assert!(!a.is_spanning());
    }

    #[test]
    fn reassigning_same_zone_is_not_a_change() {
        let mut s = AssignmentStore::new();
        let z = ZoneId::new();
        assert!(s.assign(&win("0x1"), vec![z.clone()], "DP-1", 1, false));
        assert_eq!(s.take_changes().len(), 1);
        assert!(!s.assign(&win("0x1"), vec![z.clone()], "DP-1", 1, false));
        assert!(s.take_changes().is_empty());
    }

    #[test]
    fn reassigning_overwrites_prior_entry() {
        let mut s = AssignmentStore::new();
        let (a, b) = (ZoneId::new(), ZoneId::new());
        s.assign(&win("0x1"), vec![a.clone()], "DP-1", 1, false);
        s.assign(&win("0x1"), vec![b.clone()], "DP-1", 1, false);
        assert_eq!(s.zones_for(&win("0x1")), vec![b.clone()]);
        assert!(s.windows_in(&a).is_empty());
        assert_eq!(s.windows_in(&b), vec![win("0x1")]);
    }

    #[test]
    fn assigning_no_zones_removes_window() {
        let mut s = AssignmentStore::new();
        let z = ZoneId::new();
        s.assign(&win("0x1"), vec![z], "DP-1", 1, false);
        s.take_changes();
        assert!(s.assign(&win("0x1"), vec![], "DP-1", 1, false));
        assert!(s.zones_for(&win("0x1")).is_empty());
        assert_eq!(
            s.take_changes(),
            vec![StoreChange::Unassigned { window: win("0x1") }]
        );
    }

    #[test]
    fn spanning_window_is_found_in_every_zone() {
        let mut s = AssignmentStore::new();
        let (a, b) = (ZoneId::new(), ZoneId::new());
        s.assign(&win("0x1"), vec![a.clone(), b.clone()], "DP-1", 0, false);
        assert_eq!(s.windows_in(&a), vec![win("0x1")]);
        assert_eq!(s.windows_in(&b), vec![win("0x1")]);
        assert!(s.assignment(&win("0x1")).unwrap().is_spanning());
    }

    #[test]
    fn screens_cover_live_pending_and_last_used() {
        let mut s = AssignmentStore::new();
        s.assign(&win("0x1"), vec![ZoneId::new()], "DP-1", 0, false);
        s.push_pending(
            StableKey::derive("kate", "kate").unwrap(),
            PendingAssignment {
                zones: vec![ZoneId::new()],
                screen: "DP-2".into(),
                desktop: 0,
                layout: None,
                pre_snap: None,
            },
        );
        s.set_last_used(LastUsedZone {
            zone: ZoneId::new(),
            screen: "HDMI-A-1".into(),
            class: "kate".into(),
            desktop: 0,
        });
        let screens: Vec<String> = s.screens().into_iter().collect();
        assert_eq!(screens, vec!["DP-1", "DP-2", "HDMI-A-1"]);
    }

    #[test]
    fn windows_in_on_filters_screen_and_desktop() {
        let mut s = AssignmentStore::new();
        let z = ZoneId::new();
        s.assign(&win("0x1"), vec![z.clone()], "DP-1", 1, false);
        s.assign(&win("0x2"), vec![z.clone()], "DP-2", 1, false);
        s.assign(&win("0x3"), vec![z.clone()], "DP-1", 2, false);
        assert_eq!(s.windows_in_on(&z, "DP-1", 1), vec![win("0x1")]);
        assert_eq!(s.windows_in_on(&z, "DP-1", 0).len(), 2);
    }

    #[test]
    fn layout_invalidation_drops_stale_entries_with_one_change_each() {
        let mut s = AssignmentStore::new();
        let layout = Layout::columns("halves", 2);
        let kept = layout.zones[0].id.clone();
        let gone = ZoneId::new();
        s.assign(&win("0x1"), vec![kept.clone()], "DP-1", 1, false);
        s.assign(&win("0x2"), vec![gone.clone()], "DP-1", 1, false);
        s.assign(&win("0x3"), vec![kept.clone(), gone.clone()], "DP-1", 1, false);
        s.assign(&win("0x4"), vec![gone.clone()], "DP-2", 1, false);
        let key = StableKey::derive("kate", "kate").unwrap();
        s.push_pending(
            key.clone(),
            PendingAssignment {
                zones: vec![gone.clone()],
                screen: "DP-1".into(),
                desktop: 1,
                layout: None,
                pre_snap: None,
            },
        );
        s.set_last_used(LastUsedZone {
            zone: gone.clone(),
            screen: "DP-1".into(),
            class: "kate".into(),
            desktop: 1,
        });
        s.take_changes();

        let dropped = s.on_layout_invalidated("DP-1", &layout);
        assert_eq!(dropped, vec![win("0x2"), win("0x3")]);
        assert_eq!(s.zones_for(&win("0x1")), vec![kept]);
        // other screens are left alone
        assert_eq!(s.zones_for(&win("0x4")), vec![gone]);
        assert!(s.pending(&key).is_empty());
        assert!(s.last_used().is_none());

        let changes = s.take_changes();
        assert_eq!(
            changes,
            vec![
                StoreChange::Unassigned { window: win("0x2") },
                StoreChange::Unassigned { window: win("0x3") },
                StoreChange::PendingDropped { key },
                StoreChange::LastUsedDropped,
            ]
        );
    }

    #[test]
    fn closing_demotes_to_pending_with_pre_snap() {
        let mut s = AssignmentStore::new();
        let z = ZoneId::new();
        let identity = WindowIdentity::from_info(&WindowInfo::new("0x1", "kate", "kate"));
        s.assign(&identity.handle, vec![z.clone()], "DP-1", 2, false);
        s.record_pre_snap(&identity.handle, Rect::new(10, 10, 800, 600));
        s.close_window(&identity, None);

        assert!(s.is_empty());
        let key = identity.stable.clone().unwrap();
        let pending = s.pending(&key);
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].zones, vec![z]);
        assert_eq!(pending[0].desktop, 2);
        assert_eq!(pending[0].pre_snap, Some(Rect::new(10, 10, 800, 600)));
        assert!(s.pre_snap(&identity.handle).is_none());
    }

    #[test]
    fn closing_selector_snapped_window_leaves_no_pending() {
        let mut s = AssignmentStore::new();
        let identity = WindowIdentity::from_info(&WindowInfo::new("0x1", "kate", "kate"));
        let marker = ZoneId::parse("zoneselector-main-2").unwrap();
        s.assign(&identity.handle, vec![marker], "DP-1", 1, false);
        s.close_window(&identity, None);
        assert_eq!(s.pending_count(), 0);
    }

    #[test]
    fn closing_session_only_window_leaves_no_pending() {
        let mut s = AssignmentStore::new();
        let identity = WindowIdentity::from_info(&WindowInfo::new("0x1", "", ""));
        s.assign(&identity.handle, vec![ZoneId::new()], "DP-1", 1, false);
        s.close_window(&identity, None);
        assert_eq!(s.pending_count(), 0);
    }

    #[test]
    fn pre_snap_keeps_first_geometry_of_chain() {
        let mut s = AssignmentStore::new();
        let w = win("0x1");
        assert!(s.record_pre_snap(&w, Rect::new(0, 0, 640, 480)));
        assert!(!s.record_pre_snap(&w, Rect::new(5, 5, 100, 100)));
        assert_eq!(s.pre_snap(&w), Some(Rect::new(0, 0, 640, 480)));
        s.clear_pre_snap(&w);
        assert!(s.record_pre_snap(&w, Rect::new(5, 5, 100, 100)));
    }

    #[test]
    fn pending_is_consumed_oldest_first() {
        let mut s = AssignmentStore::new();
        let key = StableKey::derive("kate", "kate").unwrap();
        let (a, b) = (ZoneId::new(), ZoneId::new());
        for z in [&a, &b] {
            s.push_pending(
                key.clone(),
                PendingAssignment {
                    zones: vec![z.clone()],
                    screen: "DP-1".into(),
                    desktop: 1,
                    layout: None,
                    pre_snap: None,
                },
            );
        }
        assert_eq!(s.consume_pending(&key, 0).unwrap().zones, vec![a]);
        assert_eq!(s.pending(&key)[0].zones, vec![b]);
        s.consume_pending(&key, 0);
        assert_eq!(s.pending_count(), 0);
        assert!(s.consume_pending(&key, 0).is_none());
    }

    #[test]
    fn float_zones_follow_remap_on_same_screen_only() {
        let mut s = AssignmentStore::new();
        let (a, b) = (ZoneId::new(), ZoneId::new());
        let k1 = TrackingKey::Stable(StableKey::derive("kate", "kate").unwrap());
        let k2 = TrackingKey::Session(win("0x9"));
        s.set_floating(
            k1.clone(),
            FloatMarker {
                zones: vec![a.clone()],
                screen: Some("DP-1".into()),
            },
        );
        s.set_floating(
            k2.clone(),
            FloatMarker {
                zones: vec![a.clone()],
                screen: Some("DP-2".into()),
            },
        );
        let mapping: HashMap<ZoneId, ZoneId> = [(a.clone(), b.clone())].into_iter().collect();
        assert_eq!(s.remap_float_zones("DP-1", &mapping), 1);
        assert_eq!(s.float_marker(&k1).unwrap().zones, vec![b]);
        assert_eq!(s.float_marker(&k2).unwrap().zones, vec![a]);
    }

    #[test]
    fn user_snap_classes_and_last_used_suppress_duplicates() {
        let mut s = AssignmentStore::new();
        s.record_user_snap("kate");
        s.record_user_snap("kate");
        s.record_user_snap("");
        assert!(s.was_user_snapped("kate"));
        let lu = LastUsedZone {
            zone: ZoneId::new(),
            screen: "DP-1".into(),
            class: "kate".into(),
            desktop: 1,
        };
        s.set_last_used(lu.clone());
        s.set_last_used(lu);
        assert_eq!(s.take_changes().len(), 2);
    }

    #[test]
    fn desktop_zero_matches_any() {
        assert!(desktops_match(0, 3));
        assert!(desktops_match(3, 0));
        assert!(desktops_match(2, 2));
        assert!(!desktops_match(1, 2));
    }
}
