//! The orchestrator that ties the assignment store, the policy chain,
//! navigation, rotation and persistence together.
//!
//! [`SnapEngine`] reacts to inbound [`Event`]s by updating the
//! [`AssignmentStore`] and sending [`Request`]s to the compositor side over
//! an [`mpsc`] channel.  It never blocks: rotations and layout-change
//! resnaps are queued and run by [`SnapEngine::run_deferred`], and state is
//! written by [`SnapEngine::poll_persistence`] once a quiet period has
//! passed.

use crate::command::{
    Direction, Event, FeedbackReason, NavigationCommand, NavigationFeedback, Request,
    RotationEntry, WindowHandle, WindowInfo,
};
use crate::geometry::{GeometryProjector, Rect};
use crate::identity::{IdentityReconciler, WindowIdentity};
use crate::layout::{Layout, ZoneId};
use crate::navigation::{edge_zone, resolve_adjacent, NavigationTarget};
use crate::persistence::{PersistedState, PersistenceError, PersistenceGateway};
use crate::policy::{first_empty_zone, AutoSnapChain, SnapConfig, SnapRequest};
use crate::rotation::{plan_resnap, plan_rotation};
use crate::screen::ScreenInfo;
use crate::store::{AssignmentStore, FloatMarker, LastUsedZone};
use crate::traits::{LayoutProvider, ScreenProvider};
use log::{debug, info, warn};
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::mpsc;
use std::time::Instant;

/// A window being dragged by the user.
#[derive(Debug, Clone)]
struct DragState {
    window: WindowHandle,
    geometry: Rect,
}

/// Work postponed to the next event-loop turn.
#[derive(Debug, Clone)]
enum Deferred {
    Rotate { clockwise: bool, screen: String },
    LayoutChange { screen: Option<String>, layout: Layout },
}

/// Result of one navigation command, before it becomes feedback.
struct Outcome {
    success: bool,
    reason: Option<FeedbackReason>,
    source: Option<ZoneId>,
    target: Option<ZoneId>,
}

impl Outcome {
    fn ok(source: Option<ZoneId>, target: Option<ZoneId>) -> Self {
        Self {
            success: true,
            reason: None,
            source,
            target,
        }
    }

    fn fail(reason: FeedbackReason, source: Option<ZoneId>) -> Self {
        Self {
            success: false,
            reason: Some(reason),
            source,
            target: None,
        }
    }
}

/// Orchestrates snapping for every window.
///
/// The engine is generic over its layout source, screen source and
/// geometry projector so tests can hand it fixed data.
///
/// # Typical usage
///
/// ```ignore
/// let projector = GapProjector::default();
/// let mut engine = SnapEngine::new(layouts, screens, projector, SnapConfig::default());
/// engine.set_request_sink(tx);
/// engine.handle(event);
/// engine.run_deferred();
/// ```
pub struct SnapEngine<L: LayoutProvider, S: ScreenProvider, P: GeometryProjector> {
    layouts: L,
    screens: S,
    projector: P,
    config: SnapConfig,
    store: AssignmentStore,
    identities: IdentityReconciler,
    windows: HashMap<WindowHandle, WindowInfo>,
    active: Option<WindowHandle>,
    drag: Option<DragState>,
    deferred: VecDeque<Deferred>,
    persistence: Option<PersistenceGateway>,
    request_tx: Option<mpsc::Sender<Request>>,
}

impl<L: LayoutProvider, S: ScreenProvider, P: GeometryProjector> SnapEngine<L, S, P> {
    pub fn new(layouts: L, screens: S, projector: P, config: SnapConfig) -> Self {
        Self {
            layouts,
            screens,
            projector,
            config,
            store: AssignmentStore::new(),
            identities: IdentityReconciler::new(),
            windows: HashMap::new(),
            active: None,
            drag: None,
            deferred: VecDeque::new(),
            persistence: None,
            request_tx: None,
        }
    }

    /// Attach the channel outbound [`Request`]s are sent on.
    pub fn set_request_sink(&mut self, tx: mpsc::Sender<Request>) {
        self.request_tx = Some(tx);
    }

    /// Attach durable storage.  Without it nothing is persisted.
    pub fn set_persistence(&mut self, gateway: PersistenceGateway) {
        self.persistence = Some(gateway);
    }

    pub fn store(&self) -> &AssignmentStore {
        &self.store
    }

    pub fn layouts(&self) -> &L {
        &self.layouts
    }

    pub fn active_window(&self) -> Option<&WindowHandle> {
        self.active.as_ref()
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    pub fn has_deferred(&self) -> bool {
        !self.deferred.is_empty()
    }

    /// Process a single [`Event`].
    ///
    /// Never fails: malformed or stale input is logged and ignored, and
    /// declined navigation is reported through a feedback request.
    pub fn handle(&mut self, event: Event) {
        match event {
            Event::WindowOpened { window, screen } => self.window_opened(window, &screen),
            Event::WindowActivated { window, screen } => self.window_activated(window, &screen),
            Event::WindowClosed { window } => self.window_closed(&window),
            Event::WindowSnapped {
                window,
                zones,
                screen,
                geometry,
            } => self.window_snapped(&window, zones.0, &screen, geometry),
            Event::WindowUnsnapped { window } => {
                debug!("unsnap {}", window);
                self.store.unassign(&window);
            }
            Event::LayoutChanged { screen, layout } => {
                debug!("layout {:?} queued for {:?}", layout.name, screen);
                self.deferred
                    .push_back(Deferred::LayoutChange { screen, layout });
            }
            Event::ScreensChanged(screens) => self.screens_changed(screens),
            Event::Navigate { command, screen } => match command {
                NavigationCommand::Rotate { clockwise } => {
                    self.deferred.push_back(Deferred::Rotate { clockwise, screen });
                }
                _ => self.navigate(command, &screen),
            },
            Event::DragStarted { window, geometry } => {
                debug!("drag {} from {:?}", window, geometry);
                self.drag = Some(DragState { window, geometry });
            }
            Event::DragCancelled => self.cancel_drag(),
            Event::Shutdown => debug!("shutdown requested"),
        }
        self.commit_changes();
    }

    /// Run everything queued by earlier events.  Call once per event-loop
    /// turn after draining inbound events.
    pub fn run_deferred(&mut self) {
        while let Some(task) = self.deferred.pop_front() {
            match task {
                Deferred::Rotate { clockwise, screen } => self.rotate(clockwise, &screen),
                Deferred::LayoutChange { screen, layout } => {
                    self.apply_layout_change(screen.as_deref(), layout)
                }
            }
        }
        self.commit_changes();
    }

    /// Forget any drag in progress.  Safe to call at any time.
    pub fn cancel_drag(&mut self) {
        if let Some(drag) = self.drag.take() {
            debug!("drag of {} cancelled", drag.window);
        }
    }

    //  Persistence

    /// When the next debounced write falls due.
    pub fn persistence_deadline(&self) -> Option<Instant> {
        self.persistence.as_ref().and_then(PersistenceGateway::deadline)
    }

    /// Write state if the quiet period has passed.
    pub fn poll_persistence(&mut self, now: Instant) {
        let Some(gateway) = self.persistence.as_mut() else {
            return;
        };
        if gateway.is_due(now) {
            let state = PersistedState::capture(&self.store, &self.identities, &self.layouts);
            gateway.write_due(&state, now);
        }
    }

    /// Write any unsaved state now.
    pub fn flush(&mut self) -> Result<(), PersistenceError> {
        let Some(gateway) = self.persistence.as_mut() else {
            return Ok(());
        };
        let state = PersistedState::capture(&self.store, &self.identities, &self.layouts);
        gateway.flush(&state)
    }

    /// Reinstate state saved by an earlier session.  Returns the number of
    /// pending restores now waiting for their windows.
    pub fn restore_persisted(&mut self) -> Result<usize, PersistenceError> {
        let Some(gateway) = self.persistence.as_ref() else {
            return Ok(0);
        };
        let state = gateway.load()?;
        state.restore_into(&mut self.store);
        Ok(self.store.pending_count())
    }

    fn commit_changes(&mut self) {
        let changes = self.store.take_changes();
        if changes.is_empty() {
            return;
        }
        debug!("{} store change(s)", changes.len());
        if let Some(gateway) = self.persistence.as_mut() {
            gateway.schedule(Instant::now());
        }
    }

    //  Window lifecycle

    fn window_opened(&mut self, info: WindowInfo, screen: &str) {
        let identity = self.identities.register(&info);
        let handle = identity.handle.clone();
        self.windows.insert(handle.clone(), info.clone());
        if self.store.assignment(&handle).is_some() {
            debug!("{} already snapped", handle);
            return;
        }
        if self.store.is_floating(&identity.tracking_key()) {
            debug!("{} is floating, not auto-snapping", handle);
            return;
        }
        let chain = AutoSnapChain::new(&self.config, &self.layouts, &self.screens, &self.projector);
        let request = SnapRequest {
            identity: &identity,
            screen,
            desktop: info.desktop,
            sticky: info.sticky,
            geometry: info.geometry,
        };
        if let Some(decision) = chain.decide(&mut self.store, &request) {
            self.send(Request::MoveWindowToZone {
                window: handle,
                zones: decision.zones,
                geometry: decision.geometry,
            });
        }
    }

    fn window_activated(&mut self, window: WindowHandle, screen: &str) {
        debug!("activated {} on {}", window, screen);
        if !self.store.is_auto_snapped(&window) {
            if let Some(assignment) = self.store.assignment(&window).cloned() {
                self.note_last_used(
                    &window,
                    &assignment.primary,
                    &assignment.screen,
                    assignment.desktop,
                );
            }
        }
        self.active = Some(window);
    }

    fn window_closed(&mut self, window: &WindowHandle) {
        let identity = self
            .identities
            .identity(window)
            .cloned()
            .unwrap_or_else(|| WindowIdentity {
                handle: window.clone(),
                stable: None,
                class: String::new(),
            });
        let layout = self
            .store
            .assignment(window)
            .and_then(|a| self.layouts.owner_of(&a.primary))
            .map(|l| l.id);
        if self.store.close_window(&identity, layout).is_some() {
            info!("{} closed while snapped", window);
        }
        self.identities.forget(window);
        self.windows.remove(window);
        if self.active.as_ref() == Some(window) {
            self.active = None;
        }
        if self.drag.as_ref().is_some_and(|d| &d.window == window) {
            self.drag = None;
        }
    }

    fn window_snapped(
        &mut self,
        window: &WindowHandle,
        zones: Vec<ZoneId>,
        screen: &str,
        geometry: Option<Rect>,
    ) {
        if zones.is_empty() {
            debug!("empty snap for {}, treating as unsnap", window);
            self.store.unassign(window);
            return;
        }
        if let Some(first) = zones.iter().find(|z| !z.is_transient()) {
            let Some(owner) = self.layouts.owner_of(first) else {
                warn!("{} snapped to unknown zone {}, ignoring", window, first);
                return;
            };
            let foreign = zones.iter().find(|z| !z.is_transient() && !owner.contains(z));
            if let Some(foreign) = foreign {
                warn!(
                    "{} spans zones of more than one layout ({} is not in {:?}), ignoring",
                    window, foreign, owner.name
                );
                return;
            }
        }
        let dragging = self.drag.as_ref().is_some_and(|d| &d.window == window);
        let dragged = if dragging {
            self.drag.take().map(|d| d.geometry)
        } else {
            None
        };
        let free = geometry
            .or(dragged)
            .or_else(|| self.windows.get(window).and_then(|w| w.geometry));
        if let Some(free) = free {
            self.store.record_pre_snap(window, free);
        }
        let (desktop, sticky) = self.placement(window);
        let changed = self.store.assign(window, zones.clone(), screen, desktop, sticky);
        if !changed && self.store.is_auto_snapped(window) {
            debug!("echo of auto-snap for {}", window);
            return;
        }
        if let Some(identity) = self.identities.identity(window) {
            let key = identity.tracking_key();
            if self.store.is_floating(&key) {
                self.store.unfloat(&key);
            }
        }
        self.note_user_snap(window, &zones[0], screen, desktop);
    }

    fn screens_changed(&mut self, screens: Vec<ScreenInfo>) {
        let changed = self.screens.replace(screens);
        if changed.is_empty() {
            return;
        }
        info!("screens changed: {:?}", changed);
        let mut entries = Vec::new();
        for (window, assignment) in self.store.assignments() {
            if !changed.contains(&assignment.screen) {
                continue;
            }
            let zones = assignment.zones();
            match self.project_zones(&zones, &assignment.screen) {
                Some(geometry) => entries.push(RotationEntry {
                    window: window.clone(),
                    from_zone: assignment.primary.clone(),
                    to_zone: assignment.primary.clone(),
                    geometry,
                }),
                None => debug!("{}: cannot re-project on {}", window, assignment.screen),
            }
        }
        if !entries.is_empty() {
            self.send(Request::ApplyRotation(entries));
        }
    }

    //  Navigation

    fn navigate(&mut self, command: NavigationCommand, screen: &str) {
        debug!("navigate {:?} on {}", command, screen);
        let outcome = match command {
            NavigationCommand::MoveToAdjacent(dir) => self.move_adjacent(dir, screen),
            NavigationCommand::FocusAdjacent(dir) => self.focus_adjacent(dir),
            NavigationCommand::SwapAdjacent(dir) => self.swap_adjacent(dir),
            NavigationCommand::SnapToZone(number) => self.snap_to_number(number, screen),
            NavigationCommand::PushToEmptyZone => self.push_to_empty(screen),
            NavigationCommand::Rotate { clockwise } => {
                self.rotate(clockwise, screen);
                return;
            }
            NavigationCommand::Restore => self.restore_active(),
            NavigationCommand::ToggleFloat => self.toggle_float(screen),
        };
        self.feedback(command, screen, outcome);
    }

    fn feedback(&self, command: NavigationCommand, screen: &str, outcome: Outcome) {
        if let Some(reason) = outcome.reason {
            info!("{} declined: {}", command.action(), reason);
        }
        self.send(Request::Feedback(NavigationFeedback {
            success: outcome.success,
            action: command.action().to_string(),
            reason: outcome.reason,
            source_zone: outcome.source,
            target_zone: outcome.target,
            screen: screen.to_string(),
        }));
    }

    /// The active window, unless it is floating.
    fn active_for_snap(&self) -> Result<WindowHandle, FeedbackReason> {
        let window = self.active.clone().ok_or(FeedbackReason::NoActiveWindow)?;
        let floating = self
            .identities
            .identity(&window)
            .is_some_and(|id| self.store.is_floating(&id.tracking_key()));
        if floating {
            return Err(FeedbackReason::WindowFloating);
        }
        Ok(window)
    }

    fn layout_on(&self, screen: &str) -> Result<&Layout, FeedbackReason> {
        if self.screens.screen(screen).is_none() {
            return Err(FeedbackReason::UnknownScreen);
        }
        self.layouts
            .layout_for_screen(screen)
            .ok_or(FeedbackReason::NoActiveLayout)
    }

    fn move_adjacent(&mut self, dir: Direction, screen: &str) -> Outcome {
        let window = match self.active_for_snap() {
            Ok(w) => w,
            Err(reason) => return Outcome::fail(reason, None),
        };
        let Some(assignment) = self.store.assignment(&window).cloned() else {
            // Not snapped yet: enter the layout from the edge.
            let target = match self.layout_on(screen) {
                Ok(layout) => edge_zone(layout, dir).map(|z| z.id.clone()),
                Err(reason) => return Outcome::fail(reason, None),
            };
            let Some(target) = target else {
                return Outcome::fail(FeedbackReason::NoAdjacentZone, None);
            };
            return self.snap_user(&window, target, screen, None);
        };
        let from = assignment.primary.clone();
        let from_rect = self.windows.get(&window).and_then(|w| w.geometry);
        let screens = self.screens.screens();
        let target = resolve_adjacent(
            &self.layouts,
            &screens,
            &self.projector,
            &from,
            from_rect,
            dir,
        );
        let Some(target) = target else {
            return Outcome::fail(FeedbackReason::NoAdjacentZone, Some(from));
        };
        let target_screen = target.screen.unwrap_or(assignment.screen);
        self.snap_user(&window, target.zone, &target_screen, Some(from))
    }

    fn focus_adjacent(&mut self, dir: Direction) -> Outcome {
        let Some(window) = self.active.clone() else {
            return Outcome::fail(FeedbackReason::NoActiveWindow, None);
        };
        let Some(assignment) = self.store.assignment(&window).cloned() else {
            return Outcome::fail(FeedbackReason::NotSnapped, None);
        };
        let from = assignment.primary.clone();
        let Some(target) = self.adjacent_of(&window, &from, dir) else {
            return Outcome::fail(FeedbackReason::NoAdjacentZone, Some(from));
        };
        let target_screen = target.screen.unwrap_or(assignment.screen);
        let occupant = self
            .store
            .windows_in_on(&target.zone, &target_screen, assignment.desktop)
            .into_iter()
            .find(|w| w != &window);
        let Some(occupant) = occupant else {
            let mut outcome = Outcome::fail(FeedbackReason::NoWindowInZone, Some(from));
            outcome.target = Some(target.zone);
            return outcome;
        };
        self.send(Request::FocusWindow { window: occupant });
        Outcome::ok(Some(from), Some(target.zone))
    }

    fn swap_adjacent(&mut self, dir: Direction) -> Outcome {
        let window = match self.active_for_snap() {
            Ok(w) => w,
            Err(reason) => return Outcome::fail(reason, None),
        };
        let Some(assignment) = self.store.assignment(&window).cloned() else {
            return Outcome::fail(FeedbackReason::NotSnapped, None);
        };
        let from = assignment.primary.clone();
        let Some(target) = self.adjacent_of(&window, &from, dir) else {
            return Outcome::fail(FeedbackReason::NoAdjacentZone, Some(from));
        };
        let target_screen = target.screen.unwrap_or_else(|| assignment.screen.clone());
        let occupant = self
            .store
            .windows_in_on(&target.zone, &target_screen, assignment.desktop)
            .into_iter()
            .find(|w| w != &window);
        let Some(occupant) = occupant else {
            return self.snap_user(&window, target.zone, &target_screen, Some(from));
        };
        let (Some(first_geometry), Some(second_geometry)) = (
            self.project_zones(std::slice::from_ref(&target.zone), &target_screen),
            self.project_zones(std::slice::from_ref(&from), &assignment.screen),
        ) else {
            return Outcome::fail(FeedbackReason::GeometryError, Some(from));
        };
        let (od, os) = self.placement(&occupant);
        self.store.assign(
            &window,
            vec![target.zone.clone()],
            &target_screen,
            assignment.desktop,
            assignment.sticky,
        );
        self.store
            .assign(&occupant, vec![from.clone()], &assignment.screen, od, os);
        self.note_user_snap(&window, &target.zone, &target_screen, assignment.desktop);
        self.store.clear_auto_snapped(&occupant);
        self.send(Request::SwapWindows {
            first: window,
            first_geometry,
            second: occupant,
            second_geometry,
        });
        Outcome::ok(Some(from), Some(target.zone))
    }

    fn snap_to_number(&mut self, number: u8, screen: &str) -> Outcome {
        let window = match self.active_for_snap() {
            Ok(w) => w,
            Err(reason) => return Outcome::fail(reason, None),
        };
        let source = self.store.assignment(&window).map(|a| a.primary.clone());
        let target = match self.layout_on(screen) {
            Ok(layout) => layout.zone_by_number(number).map(|z| z.id.clone()),
            Err(reason) => return Outcome::fail(reason, source),
        };
        let Some(target) = target else {
            return Outcome::fail(FeedbackReason::ZoneNotFound, source);
        };
        self.snap_user(&window, target, screen, source)
    }

    fn push_to_empty(&mut self, screen: &str) -> Outcome {
        let window = match self.active_for_snap() {
            Ok(w) => w,
            Err(reason) => return Outcome::fail(reason, None),
        };
        let source = self.store.assignment(&window).map(|a| a.primary.clone());
        let (desktop, _) = self.placement(&window);
        let target = match self.layout_on(screen) {
            Ok(layout) => {
                first_empty_zone(layout, &self.store, screen, desktop).map(|z| z.id.clone())
            }
            Err(reason) => return Outcome::fail(reason, source),
        };
        let Some(target) = target else {
            return Outcome::fail(FeedbackReason::NoEmptyZone, source);
        };
        self.snap_user(&window, target, screen, source)
    }

    fn restore_active(&mut self) -> Outcome {
        let Some(window) = self.active.clone() else {
            return Outcome::fail(FeedbackReason::NoActiveWindow, None);
        };
        let source = self.store.assignment(&window).map(|a| a.primary.clone());
        let Some(geometry) = self.store.pre_snap(&window) else {
            return Outcome::fail(FeedbackReason::NoPreSnapGeometry, source);
        };
        self.store.unassign(&window);
        self.store.clear_pre_snap(&window);
        self.send(Request::RestoreWindow {
            window,
            geometry: Some(geometry),
        });
        Outcome::ok(source, None)
    }

    fn toggle_float(&mut self, screen: &str) -> Outcome {
        let Some(window) = self.active.clone() else {
            return Outcome::fail(FeedbackReason::NoActiveWindow, None);
        };
        let Some(key) = self.identities.identity(&window).map(WindowIdentity::tracking_key) else {
            return Outcome::fail(FeedbackReason::NoActiveWindow, None);
        };

        if let Some(marker) = self.store.unfloat(&key) {
            info!("{} no longer floating", window);
            let Some(zone) = marker.zones.first().cloned() else {
                return Outcome::ok(None, None);
            };
            let target_screen = marker.screen.unwrap_or_else(|| screen.to_string());
            let Some(geometry) = self.project_zones(&marker.zones, &target_screen) else {
                // Its zone is gone; it simply stays free.
                return Outcome::ok(None, None);
            };
            let (desktop, sticky) = self.placement(&window);
            self.store
                .assign(&window, marker.zones.clone(), &target_screen, desktop, sticky);
            self.note_user_snap(&window, &zone, &target_screen, desktop);
            self.send(Request::MoveWindowToZone {
                window,
                zones: marker.zones,
                geometry,
            });
            return Outcome::ok(None, Some(zone));
        }

        let assignment = self.store.assignment(&window).cloned();
        let source = assignment.as_ref().map(|a| a.primary.clone());
        self.store.set_floating(
            key,
            FloatMarker {
                zones: assignment.as_ref().map(|a| a.zones()).unwrap_or_default(),
                screen: assignment.map(|a| a.screen),
            },
        );
        self.store.unassign(&window);
        let geometry = self.store.clear_pre_snap(&window);
        info!("{} floating", window);
        self.send(Request::RestoreWindow { window, geometry });
        Outcome::ok(source, None)
    }

    //  Deferred work

    fn rotate(&mut self, clockwise: bool, screen: &str) {
        let command = NavigationCommand::Rotate { clockwise };
        let screens = self.screens.screens();
        let plan = plan_rotation(
            &self.store,
            &self.layouts,
            &screens,
            &self.projector,
            clockwise,
            Some(screen),
        );
        let outcome = if !screens.iter().any(|s| s.name == screen) {
            Outcome::fail(FeedbackReason::UnknownScreen, None)
        } else if plan.screens_considered == 0 {
            Outcome::fail(FeedbackReason::NoActiveLayout, None)
        } else if plan.single_zone_screens == plan.screens_considered {
            Outcome::fail(FeedbackReason::SingleZone, None)
        } else if plan.entries.is_empty() {
            Outcome::fail(FeedbackReason::NoSnappedWindows, None)
        } else {
            info!(
                "rotating {} window(s) on {} {}",
                plan.entries.len(),
                screen,
                if clockwise { "clockwise" } else { "counter-clockwise" }
            );
            plan.apply(&mut self.store);
            self.send(Request::ApplyRotation(plan.entries));
            Outcome::ok(None, None)
        };
        self.feedback(command, screen, outcome);
    }

    fn apply_layout_change(&mut self, screen: Option<&str>, layout: Layout) {
        let affected: Vec<_> = match screen {
            Some(name) => self.screens.screen(name).into_iter().collect(),
            None => self.screens.screens(),
        };
        // Screens that are unplugged right now still carry assignments and
        // pending restores; they cannot be resnapped, only invalidated.
        let mut disconnected: BTreeSet<String> = match screen {
            Some(name) => std::iter::once(name.to_string()).collect(),
            None => self.store.screens(),
        };
        for info in &affected {
            disconnected.remove(&info.name);
        }
        let previous: Vec<_> = affected
            .into_iter()
            .map(|s| {
                let old = self.layouts.layout_for_screen(&s.name).cloned();
                (s, old)
            })
            .collect();
        info!("layout {:?} active on {}", layout.name, screen.unwrap_or("all screens"));
        self.layouts.activate(screen, layout.clone());

        let mut entries = Vec::new();
        for (info, old) in previous {
            match old {
                Some(old) if self.config.resnap_on_layout_change && old.id != layout.id => {
                    let plan = plan_resnap(&self.store, &old, &layout, &info, &self.projector);
                    plan.apply(&mut self.store);
                    entries.extend(plan.entries);
                }
                _ => {}
            }
            let dropped = self.store.on_layout_invalidated(&info.name, &layout);
            if !dropped.is_empty() {
                info!("{} window(s) on {} lost their zone", dropped.len(), info.name);
            }
        }
        for name in &disconnected {
            let dropped = self.store.on_layout_invalidated(name, &layout);
            if !dropped.is_empty() {
                info!("{} window(s) on disconnected {} lost their zone", dropped.len(), name);
            }
        }
        if !entries.is_empty() {
            self.send(Request::ApplyRotation(entries));
        }
    }

    //  Helpers

    fn send(&self, request: Request) {
        if let Some(tx) = &self.request_tx {
            if tx.send(request).is_err() {
                debug!("request sink closed");
            }
        }
    }

    /// Desktop and stickiness of a live window (`0`, `false` when unknown).
    fn placement(&self, window: &WindowHandle) -> (u32, bool) {
        self.windows
            .get(window)
            .map_or((0, false), |w| (w.desktop, w.sticky))
    }

    fn adjacent_of(
        &self,
        window: &WindowHandle,
        from: &ZoneId,
        dir: Direction,
    ) -> Option<NavigationTarget> {
        let from_rect = self.windows.get(window).and_then(|w| w.geometry);
        let screens = self.screens.screens();
        resolve_adjacent(&self.layouts, &screens, &self.projector, from, from_rect, dir)
    }

    /// Absolute geometry of `zones` on `screen`, looked up in whichever
    /// layout owns them.
    fn project_zones(&self, zones: &[ZoneId], screen: &str) -> Option<Rect> {
        let info = self.screens.screen(screen)?;
        let rects = zones
            .iter()
            .map(|z| self.layouts.owner_of(z)?.zone(z).map(|zone| zone.geometry))
            .collect::<Option<Vec<_>>>()?;
        self.projector.project_span(&rects, &info)
    }

    /// Snap `window` to `zone` on the user's behalf and tell the compositor.
    fn snap_user(
        &mut self,
        window: &WindowHandle,
        zone: ZoneId,
        screen: &str,
        source: Option<ZoneId>,
    ) -> Outcome {
        let Some(geometry) = self.project_zones(std::slice::from_ref(&zone), screen) else {
            return Outcome::fail(FeedbackReason::GeometryError, source);
        };
        if self.store.assignment(window).is_none() {
            if let Some(free) = self.windows.get(window).and_then(|w| w.geometry) {
                self.store.record_pre_snap(window, free);
            }
        }
        let (desktop, sticky) = self.placement(window);
        self.store
            .assign(window, vec![zone.clone()], screen, desktop, sticky);
        self.note_user_snap(window, &zone, screen, desktop);
        self.send(Request::MoveWindowToZone {
            window: window.clone(),
            zones: vec![zone.clone()],
            geometry,
        });
        Outcome::ok(source, Some(zone))
    }

    /// Record a deliberate placement: clears the auto-snap mark and feeds
    /// the last-used-zone policy.
    fn note_user_snap(&mut self, window: &WindowHandle, zone: &ZoneId, screen: &str, desktop: u32) {
        self.store.clear_auto_snapped(window);
        let class = self
            .identities
            .identity(window)
            .map(|id| id.class.clone())
            .unwrap_or_default();
        self.store.record_user_snap(&class);
        self.note_last_used(window, zone, screen, desktop);
    }

    fn note_last_used(&mut self, window: &WindowHandle, zone: &ZoneId, screen: &str, desktop: u32) {
        if zone.is_transient() {
            return;
        }
        let Some(class) = self.identities.identity(window).map(|id| id.class.clone()) else {
            return;
        };
        if class.is_empty() || !self.store.was_user_snapped(&class) {
            return;
        }
        self.store.set_last_used(LastUsedZone {
            zone: zone.clone(),
            screen: screen.to_string(),
            class,
            desktop,
        });
    }
}

//  Tests
