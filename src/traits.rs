//! Core traits that decouple the engine from the compositor, the layout
//! store and the event transport.
//!
//! The [`SnapEngine`](crate::engine::SnapEngine) receives its layouts and
//! screens through these capabilities at construction time instead of
//! reaching for process-wide singletons, so tests can hand it fixed data.

use crate::command::Event;
use crate::layout::{Layout, ZoneId};
use crate::screen::ScreenInfo;
use std::sync::mpsc;

/// Source of the layouts active on each screen.
pub trait LayoutProvider {
    /// The layout currently active on `screen`, if any.
    fn layout_for_screen(&self, screen: &str) -> Option<&Layout>;

    /// Every layout in use on at least one screen, the default included.
    /// Superseded and unused layouts are not listed.
    fn layouts(&self) -> Vec<&Layout>;

    /// Make `layout` active on `screen`, or on every screen when `screen` is
    /// `None`.  A layout whose id is already known replaces that revision.
    fn activate(&mut self, screen: Option<&str>, layout: Layout);

    /// The layout that owns `zone`.
    ///
    /// Multi-monitor setups may run different layouts per screen, so this
    /// searches every layout in use rather than the one on a single screen.
    /// Zones of layouts no screen uses have no owner.
    fn owner_of(&self, zone: &ZoneId) -> Option<&Layout> {
        self.layouts().into_iter().find(|l| l.contains(zone))
    }
}

/// Source of the physical screens and their usable areas.
pub trait ScreenProvider {
    fn screens(&self) -> Vec<ScreenInfo>;

    fn screen(&self, name: &str) -> Option<ScreenInfo>;

    /// Replace the known screens (hot-plug, resolution or panel change).
    /// Returns the names of screens that are new or whose usable area
    /// changed.
    fn replace(&mut self, screens: Vec<ScreenInfo>) -> Vec<String>;
}

//  Event Source

/// A source of inbound [`Event`]s.
///
/// Implementations listen on some transport (a Unix socket, a compositor
/// script bridge, a test harness) and forward parsed events into the
/// provided [`mpsc::Sender`].
///
/// # Contract
///
/// * [`run`](CommandSource::run) **blocks** until the source is exhausted or
///   an unrecoverable error occurs.
/// * Each received event must be sent through `sink` exactly once, in the
///   order it was received.
pub trait CommandSource: Send {
    /// The error type produced by this source.
    type Error: std::error::Error + Send + 'static;

    /// Start listening and forward every incoming [`Event`] into `sink`.
    fn run(&mut self, sink: mpsc::Sender<Event>) -> Result<(), Self::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::WindowHandle;
    use crate::geometry::Rect;
    use crate::layout::LayoutRegistry;
    use crate::screen::ScreenRegistry;
    use std::collections::HashMap;

    #[derive(Debug, thiserror::Error)]
    #[error("mock error")]
    struct MockError;

    /// A test double that emits a fixed sequence of events.
    struct MockSource {
        events: Vec<Event>,
    }

    impl CommandSource for MockSource {
        type Error = MockError;

        fn run(&mut self, sink: mpsc::Sender<Event>) -> Result<(), MockError> {
            for ev in self.events.drain(..) {
                let _ = sink.send(ev);
            }
            Ok(())
        }
    }

    #[test]
    fn mock_source_emits_events_in_order() {
        let mut src = MockSource {
            events: vec![
                Event::WindowClosed {
                    window: WindowHandle::from("0x1"),
                },
                Event::DragCancelled,
            ],
        };
        let (tx, rx) = mpsc::channel();
        src.run(tx).unwrap();
        let events: Vec<Event> = rx.try_iter().collect();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1], Event::DragCancelled);
    }

    #[test]
    fn providers_are_usable_as_trait_objects() {
        let layouts: Box<dyn LayoutProvider> = Box::new(LayoutRegistry::new(
            vec![Layout::columns("halves", 2)],
            None,
            &HashMap::new(),
        ));
        let screens: Box<dyn ScreenProvider> = Box::new(ScreenRegistry::new(vec![
            ScreenInfo::new("DP-1", Rect::new(0, 0, 1920, 1080)),
        ]));
        let screen = screens.screen("DP-1").unwrap();
        assert_eq!(layouts.layout_for_screen(&screen.name).unwrap().zones.len(), 2);
    }
}
