//! Auto-snap policy chain.
//!
//! When a window appears un-positioned the engine asks [`AutoSnapChain`]
//! where it should go.  Policies are evaluated in a fixed priority order and
//! the first one that claims the window wins:
//!
//! 1. [`PolicyKind::SessionRestore`]: a pending restore for the window's
//!    stable key.
//! 2. [`PolicyKind::AppRule`]: a configured class → zone rule.
//! 3. [`PolicyKind::LastUsedZone`]: the zone the user last snapped a window
//!    of the same class to, on the same screen and desktop.
//! 4. [`PolicyKind::EmptyZone`]: the first unoccupied zone, only when
//!    explicitly enabled.
//!
//! A successful claim is committed to the store immediately and the window is
//! marked auto-snapped, so later focus events do not mistake the placement
//! for a deliberate user snap.

use crate::geometry::{GeometryProjector, Rect};
use crate::identity::{StableKey, WindowIdentity};
use crate::layout::{Layout, Zone, ZoneId};
use crate::store::{desktops_match, AssignmentStore};
use crate::traits::{LayoutProvider, ScreenProvider};
use log::{debug, info};
use serde::{Deserialize, Serialize};

/// How windows present on all desktops take part in auto-snapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StickyHandling {
    /// Like any other window; restores ignore the desktop.
    #[default]
    TreatAsNormal,
    /// Session restore only, never a fresh last-used-zone snap.
    RestoreOnly,
    /// Never auto-snapped by restore or last-used-zone.
    IgnoreAll,
}

/// Map an application class straight to a zone number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppRule {
    /// Application class, matched case-insensitively.
    pub class: String,
    /// Zone number on the target screen's layout.
    pub zone: u8,
    /// Screen to place the window on; defaults to the one it opened on.
    #[serde(default)]
    pub screen: Option<String>,
}

impl AppRule {
    fn matches(&self, class: &str) -> bool {
        !class.is_empty() && self.class.trim().eq_ignore_ascii_case(class)
    }
}

/// Auto-snap settings.
///
/// # Example
///
/// ```json
/// {
///   "restore_on_open": true,
///   "snap_to_last_zone": true,
///   "auto_assign_empty_zone": false,
///   "sticky_windows": "restore_only",
///   "app_rules": [ { "class": "org.kde.konsole", "zone": 3 } ]
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapConfig {
    /// Restore windows to the zone they occupied when last closed.
    /// Default: `true`.
    pub restore_on_open: bool,
    /// Snap new windows to the last zone the user snapped their class to.
    /// Default: `false`.
    pub snap_to_last_zone: bool,
    /// Put new windows in the first empty zone.  Default: `false`.
    pub auto_assign_empty_zone: bool,
    /// Default: `treat_as_normal`.
    pub sticky_windows: StickyHandling,
    /// Move windows along when the layout of their screen changes.
    /// Default: `true`.
    pub resnap_on_layout_change: bool,
    pub app_rules: Vec<AppRule>,
}

impl Default for SnapConfig {
    fn default() -> Self {
        Self {
            restore_on_open: true,
            snap_to_last_zone: false,
            auto_assign_empty_zone: false,
            sticky_windows: StickyHandling::TreatAsNormal,
            resnap_on_layout_change: true,
            app_rules: Vec::new(),
        }
    }
}

/// The policies, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PolicyKind {
    SessionRestore,
    AppRule,
    LastUsedZone,
    EmptyZone,
}

impl PolicyKind {
    pub const PRIORITY: [PolicyKind; 4] = [
        PolicyKind::SessionRestore,
        PolicyKind::AppRule,
        PolicyKind::LastUsedZone,
        PolicyKind::EmptyZone,
    ];
}

/// A window asking to be placed.
#[derive(Debug, Clone, Copy)]
pub struct SnapRequest<'a> {
    pub identity: &'a WindowIdentity,
    pub screen: &'a str,
    pub desktop: u32,
    pub sticky: bool,
    /// Free geometry at open time, kept as pre-snap geometry.
    pub geometry: Option<Rect>,
}

/// Where a claimed window goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutoSnapDecision {
    pub policy: PolicyKind,
    pub zones: Vec<ZoneId>,
    pub screen: String,
    pub geometry: Rect,
}

/// A policy's offer before it is committed.
#[derive(Debug, Clone)]
struct Claim {
    decision: AutoSnapDecision,
    pending_index: Option<usize>,
    pre_snap: Option<Rect>,
}

/// The ordered policy chain, borrowing everything it consults.
pub struct AutoSnapChain<'a, L: ?Sized, S: ?Sized, P: ?Sized> {
    config: &'a SnapConfig,
    layouts: &'a L,
    screens: &'a S,
    projector: &'a P,
}

impl<'a, L, S, P> AutoSnapChain<'a, L, S, P>
where
    L: LayoutProvider + ?Sized,
    S: ScreenProvider + ?Sized,
    P: GeometryProjector + ?Sized,
{
    pub fn new(config: &'a SnapConfig, layouts: &'a L, screens: &'a S, projector: &'a P) -> Self {
        Self {
            config,
            layouts,
            screens,
            projector,
        }
    }

    /// Run the chain for one window.  At most one policy claims it; the
    /// claim is committed to `store` before returning.
    pub fn decide(
        &self,
        store: &mut AssignmentStore,
        req: &SnapRequest<'_>,
    ) -> Option<AutoSnapDecision> {
        if let Some(key) = &req.identity.stable {
            self.prune_stale_pending(store, key);
        }
        let claim = PolicyKind::PRIORITY
            .iter()
            .find_map(|policy| self.evaluate(*policy, store, req))?;
        Some(self.commit(store, req, claim))
    }

    /// Every policy that would claim the window if it ran alone, in
    /// priority order.  Does not modify anything.
    pub fn eligible(&self, store: &AssignmentStore, req: &SnapRequest<'_>) -> Vec<PolicyKind> {
        PolicyKind::PRIORITY
            .iter()
            .copied()
            .filter(|policy| self.evaluate(*policy, store, req).is_some())
            .collect()
    }

    fn evaluate(
        &self,
        policy: PolicyKind,
        store: &AssignmentStore,
        req: &SnapRequest<'_>,
    ) -> Option<Claim> {
        match policy {
            PolicyKind::SessionRestore => self.session_restore(store, req),
            PolicyKind::AppRule => self.app_rule(req),
            PolicyKind::LastUsedZone => self.last_used_zone(store, req),
            PolicyKind::EmptyZone => self.empty_zone(store, req),
        }
    }

    fn commit(
        &self,
        store: &mut AssignmentStore,
        req: &SnapRequest<'_>,
        claim: Claim,
    ) -> AutoSnapDecision {
        let window = &req.identity.handle;
        if let (Some(index), Some(key)) = (claim.pending_index, &req.identity.stable) {
            store.consume_pending(key, index);
        }
        let decision = claim.decision;
        store.assign(
            window,
            decision.zones.clone(),
            &decision.screen,
            req.desktop,
            req.sticky,
        );
        store.mark_auto_snapped(window);
        if let Some(geometry) = claim.pre_snap.or(req.geometry) {
            store.record_pre_snap(window, geometry);
        }
        info!(
            "auto-snap {} via {:?} -> {:?} on {}",
            window, decision.policy, decision.zones, decision.screen
        );
        decision
    }

    /// Drop pending restores for `key` that reference zones no layout in use
    /// has any more.
    fn prune_stale_pending(&self, store: &mut AssignmentStore, key: &StableKey) {
        let mut index = 0;
        while let Some(pending) = store.pending(key).get(index) {
            let stale = pending
                .zones
                .iter()
                .any(|z| self.layouts.owner_of(z).is_none());
            if stale {
                debug!("pending restore for {} references a removed zone", key);
                store.drop_pending(key, index);
            } else {
                index += 1;
            }
        }
    }

    fn project(&self, layout: &Layout, zones: &[ZoneId], screen: &str) -> Option<Rect> {
        let info = self.screens.screen(screen)?;
        let rects: Vec<_> = zones
            .iter()
            .map(|z| layout.zone(z).map(|zone| zone.geometry))
            .collect::<Option<_>>()?;
        self.projector.project_span(&rects, &info)
    }

    fn offer(
        &self,
        policy: PolicyKind,
        layout: &Layout,
        zones: Vec<ZoneId>,
        screen: &str,
    ) -> Option<Claim> {
        let geometry = self.project(layout, &zones, screen)?;
        Some(Claim {
            decision: AutoSnapDecision {
                policy,
                zones,
                screen: screen.to_string(),
                geometry,
            },
            pending_index: None,
            pre_snap: None,
        })
    }

    //  Policies

    fn session_restore(&self, store: &AssignmentStore, req: &SnapRequest<'_>) -> Option<Claim> {
        if !self.config.restore_on_open {
            return None;
        }
        let handling = self.config.sticky_windows;
        if req.sticky && handling == StickyHandling::IgnoreAll {
            return None;
        }
        let key = req.identity.stable.as_ref()?;
        store.pending(key).iter().enumerate().find_map(|(index, pending)| {
            let desktop_ok = req.sticky || desktops_match(pending.desktop, req.desktop);
            if !desktop_ok {
                return None;
            }
            // Prefer the screen the window was on; fall back to where it
            // opened when that screen is gone.
            let screen = if self.screens.screen(&pending.screen).is_some() {
                pending.screen.as_str()
            } else {
                req.screen
            };
            let layout = self.layouts.layout_for_screen(screen)?;
            if !layout.contains_all(&pending.zones) {
                return None;
            }
            let zones = pending.zones.clone();
            let mut claim = self.offer(PolicyKind::SessionRestore, layout, zones, screen)?;
            claim.pending_index = Some(index);
            claim.pre_snap = pending.pre_snap;
            Some(claim)
        })
    }

    fn app_rule(&self, req: &SnapRequest<'_>) -> Option<Claim> {
        let rule = self
            .config
            .app_rules
            .iter()
            .find(|r| r.matches(&req.identity.class))?;
        let screen = match &rule.screen {
            Some(s) if self.screens.screen(s).is_some() => s.as_str(),
            _ => req.screen,
        };
        let layout = self.layouts.layout_for_screen(screen)?;
        let zone = layout.zone_by_number(rule.zone)?;
        self.offer(PolicyKind::AppRule, layout, vec![zone.id.clone()], screen)
    }

    fn last_used_zone(&self, store: &AssignmentStore, req: &SnapRequest<'_>) -> Option<Claim> {
        if !self.config.snap_to_last_zone {
            return None;
        }
        if req.sticky && self.config.sticky_windows != StickyHandling::TreatAsNormal {
            return None;
        }
        let last = store.last_used()?;
        let class = req.identity.class.as_str();
        let eligible = last.screen == req.screen
            && desktops_match(last.desktop, req.desktop)
            && !class.is_empty()
            && last.class == class
            && store.was_user_snapped(class);
        if !eligible {
            return None;
        }
        let layout = self.layouts.layout_for_screen(req.screen)?;
        layout.zone(&last.zone)?;
        self.offer(PolicyKind::LastUsedZone, layout, vec![last.zone.clone()], req.screen)
    }

    fn empty_zone(&self, store: &AssignmentStore, req: &SnapRequest<'_>) -> Option<Claim> {
        if !self.config.auto_assign_empty_zone {
            return None;
        }
        let layout = self.layouts.layout_for_screen(req.screen)?;
        let zone = first_empty_zone(layout, store, req.screen, req.desktop)?;
        self.offer(PolicyKind::EmptyZone, layout, vec![zone.id.clone()], req.screen)
    }
}

/// First zone of `layout`, in declaration order, with no occupant on
/// `screen` and `desktop`.
pub fn first_empty_zone<'a>(
    layout: &'a Layout,
    store: &AssignmentStore,
    screen: &str,
    desktop: u32,
) -> Option<&'a Zone> {
    layout
        .zones
        .iter()
        .find(|z| store.windows_in_on(&z.id, screen, desktop).is_empty())
}

//  Tests

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{WindowHandle, WindowInfo};
    use crate::geometry::GapProjector;
    use crate::layout::LayoutRegistry;
    use crate::screen::{ScreenInfo, ScreenRegistry};
    use crate::store::{LastUsedZone, PendingAssignment};
    use std::collections::HashMap;

    struct Fixture {
        layout: Layout,
        layouts: LayoutRegistry,
        screens: ScreenRegistry,
        projector: GapProjector,
        store: AssignmentStore,
        config: SnapConfig,
    }

    impl Fixture {
        fn new() -> Self {
            let layout = Layout::columns("thirds", 3);
            Self {
                layouts: LayoutRegistry::new(vec![layout.clone()], None, &HashMap::new()),
                layout,
                screens: ScreenRegistry::new(vec![
                    ScreenInfo::new("DP-1", Rect::new(0, 0, 1920, 1080)),
                    ScreenInfo::new("DP-2", Rect::new(1920, 0, 1920, 1080)),
                ]),
                projector: GapProjector::new(0, 0),
                store: AssignmentStore::new(),
                config: SnapConfig::default(),
            }
        }

        fn zone(&self, number: u8) -> ZoneId {
            self.layout.zone_by_number(number).unwrap().id.clone()
        }

        fn decide(
            &mut self,
            identity: &WindowIdentity,
            screen: &str,
            desktop: u32,
            sticky: bool,
        ) -> Option<AutoSnapDecision> {
            let chain =
                AutoSnapChain::new(&self.config, &self.layouts, &self.screens, &self.projector);
            let req = SnapRequest {
                identity,
                screen,
                desktop,
                sticky,
                geometry: Some(Rect::new(100, 100, 640, 480)),
            };
            chain.decide(&mut self.store, &req)
        }

        fn eligible(
            &self,
            identity: &WindowIdentity,
            screen: &str,
            desktop: u32,
        ) -> Vec<PolicyKind> {
            let chain =
                AutoSnapChain::new(&self.config, &self.layouts, &self.screens, &self.projector);
            let req = SnapRequest {
                identity,
                screen,
                desktop,
                sticky: false,
                geometry: None,
            };
            chain.eligible(&self.store, &req)
        }

        fn pend(&mut self, class: &str, zone: ZoneId, screen: &str, desktop: u32) {
            let key = StableKey::derive(class, class).unwrap();
            self.store.push_pending(
                key,
                PendingAssignment {
                    zones: vec![zone],
                    screen: screen.into(),
                    desktop,
                    layout: Some(self.layout.id),
                    pre_snap: Some(Rect::new(1, 2, 300, 200)),
                },
            );
        }

        fn user_snapped(&mut self, class: &str, zone: ZoneId, screen: &str, desktop: u32) {
            self.store.record_user_snap(class);
            self.store.set_last_used(LastUsedZone {
                zone,
                screen: screen.into(),
                class: class.into(),
                desktop,
            });
        }
    }

    fn ident(handle: &str, class: &str) -> WindowIdentity {
        WindowIdentity::from_info(&WindowInfo::new(handle, class, class))
    }

    #[test]
    fn nothing_claims_by_default() {
        let mut f = Fixture::new();
        assert!(f.decide(&ident("0x1", "kate"), "DP-1", 1, false).is_none());
        assert!(f.store.is_empty());
    }

    #[test]
    fn session_restore_consumes_pending_and_promotes() {
        let mut f = Fixture::new();
        let z2 = f.zone(2);
        f.pend("kate", z2.clone(), "DP-1", 1);
        let w = ident("0x1", "kate");
        let d = f.decide(&w, "DP-1", 1, false).unwrap();
        assert_eq!(d.policy, PolicyKind::SessionRestore);
        assert_eq!(d.zones, vec![z2.clone()]);
        assert_eq!(d.geometry, Rect::new(640, 0, 640, 1080));
        assert_eq!(f.store.zones_for(&w.handle), vec![z2]);
        assert_eq!(f.store.pending_count(), 0);
        assert!(f.store.is_auto_snapped(&w.handle));
        // pre-snap geometry comes from the pending record
        assert_eq!(f.store.pre_snap(&w.handle), Some(Rect::new(1, 2, 300, 200)));
    }

    #[test]
    fn sibling_window_does_not_claim_consumed_restore() {
        let mut f = Fixture::new();
        f.pend("kate", f.zone(2), "DP-1", 1);
        assert!(f.decide(&ident("0x1", "kate"), "DP-1", 1, false).is_some());
        assert!(f.decide(&ident("0x2", "kate"), "DP-1", 1, false).is_none());
    }

    #[test]
    fn session_restore_requires_desktop_match() {
        let mut f = Fixture::new();
        f.pend("kate", f.zone(2), "DP-1", 1);
        assert!(f.decide(&ident("0x1", "kate"), "DP-1", 2, false).is_none());
        assert_eq!(f.store.pending_count(), 1);
        // desktop 0 is unknown and matches
        assert!(f.decide(&ident("0x1", "kate"), "DP-1", 0, false).is_some());
    }

    #[test]
    fn sticky_window_restores_across_desktops_unless_ignored() {
        let mut f = Fixture::new();
        f.pend("kate", f.zone(2), "DP-1", 1);
        f.config.sticky_windows = StickyHandling::IgnoreAll;
        assert!(f.decide(&ident("0x1", "kate"), "DP-1", 3, true).is_none());
        f.config.sticky_windows = StickyHandling::RestoreOnly;
        assert!(f.decide(&ident("0x1", "kate"), "DP-1", 3, true).is_some());
    }

    #[test]
    fn stale_pending_is_dropped() {
        let mut f = Fixture::new();
        f.pend("kate", ZoneId::new(), "DP-1", 1);
        assert!(f.decide(&ident("0x1", "kate"), "DP-1", 1, false).is_none());
        assert_eq!(f.store.pending_count(), 0);
    }

    #[test]
    fn restore_falls_back_to_opening_screen_when_screen_is_gone() {
        let mut f = Fixture::new();
        f.pend("kate", f.zone(1), "HDMI-A-1", 1);
        let d = f.decide(&ident("0x1", "kate"), "DP-2", 1, false).unwrap();
        assert_eq!(d.screen, "DP-2");
        assert_eq!(d.geometry.x, 1920);
    }

    #[test]
    fn app_rule_places_by_zone_number() {
        let mut f = Fixture::new();
        f.config.app_rules.push(AppRule {
            class: "Org.KDE.Konsole".into(),
            zone: 3,
            screen: None,
        });
        let d = f.decide(&ident("0x1", "org.kde.konsole"), "DP-1", 1, false).unwrap();
        assert_eq!(d.policy, PolicyKind::AppRule);
        assert_eq!(d.zones, vec![f.zone(3)]);
    }

    #[test]
    fn app_rule_with_unknown_zone_declines() {
        let mut f = Fixture::new();
        f.config.app_rules.push(AppRule {
            class: "kate".into(),
            zone: 7,
            screen: None,
        });
        assert!(f.decide(&ident("0x1", "kate"), "DP-1", 1, false).is_none());
    }

    #[test]
    fn last_used_zone_claims_same_class_same_screen() {
        let mut f = Fixture::new();
        f.config.snap_to_last_zone = true;
        f.user_snapped("kate", f.zone(3), "DP-1", 1);
        let d = f.decide(&ident("0x1", "kate"), "DP-1", 1, false).unwrap();
        assert_eq!(d.policy, PolicyKind::LastUsedZone);
        assert_eq!(d.zones, vec![f.zone(3)]);
    }

    #[test]
    fn last_used_zone_never_crosses_monitors() {
        let mut f = Fixture::new();
        f.config.snap_to_last_zone = true;
        f.user_snapped("kate", f.zone(3), "DP-1", 1);
        assert!(f.decide(&ident("0x1", "kate"), "DP-2", 1, false).is_none());
    }

    #[test]
    fn last_used_zone_requires_matching_class() {
        let mut f = Fixture::new();
        f.config.snap_to_last_zone = true;
        f.user_snapped("kate", f.zone(3), "DP-1", 1);
        assert!(f.decide(&ident("0x1", "dolphin"), "DP-1", 1, false).is_none());
    }

    #[test]
    fn last_used_zone_requires_user_snap_history() {
        let mut f = Fixture::new();
        f.config.snap_to_last_zone = true;
        f.store.set_last_used(LastUsedZone {
            zone: f.zone(3),
            screen: "DP-1".into(),
            class: "kate".into(),
            desktop: 1,
        });
        assert!(f.decide(&ident("0x1", "kate"), "DP-1", 1, false).is_none());
    }

    #[test]
    fn last_used_zone_requires_same_desktop() {
        let mut f = Fixture::new();
        f.config.snap_to_last_zone = true;
        f.user_snapped("kate", f.zone(3), "DP-1", 1);
        assert!(f.decide(&ident("0x1", "kate"), "DP-1", 2, false).is_none());
    }

    #[test]
    fn sticky_restore_only_excludes_last_used_zone() {
        let mut f = Fixture::new();
        f.config.snap_to_last_zone = true;
        f.config.sticky_windows = StickyHandling::RestoreOnly;
        f.user_snapped("kate", f.zone(3), "DP-1", 1);
        assert!(f.decide(&ident("0x1", "kate"), "DP-1", 1, true).is_none());
    }

    #[test]
    fn empty_zone_picks_first_unoccupied_in_layout_order() {
        let mut f = Fixture::new();
        f.config.auto_assign_empty_zone = true;
        f.store
            .assign(&WindowHandle::from("0x9"), vec![f.zone(1)], "DP-1", 1, false);
        let d = f.decide(&ident("0x1", "kate"), "DP-1", 1, false).unwrap();
        assert_eq!(d.policy, PolicyKind::EmptyZone);
        assert_eq!(d.zones, vec![f.zone(2)]);
    }

    #[test]
    fn empty_zone_declines_when_layout_is_full() {
        let mut f = Fixture::new();
        f.config.auto_assign_empty_zone = true;
        for (i, n) in [1u8, 2, 3].iter().enumerate() {
            let zone = f.zone(*n);
            f.store
                .assign(&WindowHandle(format!("0x{}", i)), vec![zone], "DP-1", 1, false);
        }
        assert!(f.decide(&ident("0xa", "kate"), "DP-1", 1, false).is_none());
    }

    #[test]
    fn exactly_one_policy_claims_when_all_are_eligible() {
        let mut f = Fixture::new();
        f.config.snap_to_last_zone = true;
        f.config.auto_assign_empty_zone = true;
        f.config.app_rules.push(AppRule {
            class: "kate".into(),
            zone: 1,
            screen: None,
        });
        f.pend("kate", f.zone(2), "DP-1", 1);
        f.user_snapped("kate", f.zone(3), "DP-1", 1);

        let w = ident("0x1", "kate");
        assert_eq!(
            f.eligible(&w, "DP-1", 1),
            vec![
                PolicyKind::SessionRestore,
                PolicyKind::AppRule,
                PolicyKind::LastUsedZone,
                PolicyKind::EmptyZone
            ]
        );
        let d = f.decide(&w, "DP-1", 1, false).unwrap();
        assert_eq!(d.policy, PolicyKind::SessionRestore);
        assert_eq!(f.store.len(), 1);
        assert_eq!(f.store.zones_for(&w.handle), vec![f.zone(2)]);
    }

    #[test]
    fn disabled_restore_falls_through_to_next_policy() {
        let mut f = Fixture::new();
        f.config.restore_on_open = false;
        f.config.auto_assign_empty_zone = true;
        f.pend("kate", f.zone(2), "DP-1", 1);
        let d = f.decide(&ident("0x1", "kate"), "DP-1", 1, false).unwrap();
        assert_eq!(d.policy, PolicyKind::EmptyZone);
        assert_eq!(f.store.pending_count(), 1);
    }

    #[test]
    fn claim_records_open_geometry_as_pre_snap() {
        let mut f = Fixture::new();
        f.config.auto_assign_empty_zone = true;
        let w = ident("0x1", "kate");
        f.decide(&w, "DP-1", 1, false).unwrap();
        assert_eq!(f.store.pre_snap(&w.handle), Some(Rect::new(100, 100, 640, 480)));
    }

    #[test]
    fn sticky_handling_parses_snake_case() {
        let h: StickyHandling = serde_json::from_str(r#""restore_only""#).unwrap();
        assert_eq!(h, StickyHandling::RestoreOnly);
    }
}
