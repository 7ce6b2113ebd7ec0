//! Messages and types shared by every component.
//!
//! [`Event`] is everything the compositor side can tell the engine,
//! [`Request`] is everything the engine asks of it, and
//! [`NavigationFeedback`] reports the outcome of each user-triggered
//! navigation attempt.
//!
//! The wire form is JSON.  A few fields accept more than one shape because
//! compositor scripts are not consistent: directions are case-insensitive
//! (`"left"`, `"Left"`), and a snap may carry one zone id as a plain string
//! or several as an array.

use crate::geometry::Rect;
use crate::layout::{Layout, ZoneId};
use crate::screen::ScreenInfo;
use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Compass direction for zone navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Direction {
    Left,
    Right,
    Up,
    Down,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Left => write!(f, "left"),
            Direction::Right => write!(f, "right"),
            Direction::Up => write!(f, "up"),
            Direction::Down => write!(f, "down"),
        }
    }
}

/// Parse a direction string (case-insensitive, surrounding whitespace ignored).
fn parse_direction(s: &str) -> Option<Direction> {
    match s.trim().to_lowercase().as_str() {
        "left" => Some(Direction::Left),
        "right" => Some(Direction::Right),
        "up" => Some(Direction::Up),
        "down" => Some(Direction::Down),
        _ => None,
    }
}

impl<'de> Deserialize<'de> for Direction {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse_direction(&s).ok_or_else(|| DeError::custom(format!("invalid direction: {:?}", s)))
    }
}

/// Volatile, process-lifetime window handle assigned by the compositor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WindowHandle(pub String);

impl WindowHandle {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for WindowHandle {
    fn from(s: &str) -> Self {
        WindowHandle(s.to_string())
    }
}

impl fmt::Display for WindowHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What the compositor knows about a window when it first appears.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowInfo {
    pub handle: WindowHandle,
    /// Application class (e.g. `"org.kde.konsole"`).
    #[serde(default)]
    pub class: String,
    /// Window resource name (e.g. `"konsole"`).
    #[serde(default)]
    pub resource: String,
    /// Virtual desktop, `0` = unknown / any.
    #[serde(default)]
    pub desktop: u32,
    /// Present on all desktops.
    #[serde(default)]
    pub sticky: bool,
    /// Current free-floating geometry, if known.
    #[serde(default)]
    pub geometry: Option<Rect>,
}

impl WindowInfo {
    pub fn new(handle: &str, class: &str, resource: &str) -> Self {
        Self {
            handle: WindowHandle::from(handle),
            class: class.to_string(),
            resource: resource.to_string(),
            desktop: 0,
            sticky: false,
            geometry: None,
        }
    }
}

/// One or more zone ids.  Accepts `"id"` or `["id", …]` on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ZoneSet(pub Vec<ZoneId>);

impl From<ZoneId> for ZoneSet {
    fn from(id: ZoneId) -> Self {
        ZoneSet(vec![id])
    }
}

impl From<Vec<ZoneId>> for ZoneSet {
    fn from(ids: Vec<ZoneId>) -> Self {
        ZoneSet(ids)
    }
}

impl<'de> Deserialize<'de> for ZoneSet {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        use serde::de::Visitor;
        struct V;
        impl<'de> Visitor<'de> for V {
            type Value = ZoneSet;
            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "zone id string or array of zone id strings")
            }
            fn visit_str<E>(self, s: &str) -> Result<ZoneSet, E>
            where
                E: DeError,
            {
                ZoneId::parse(s)
                    .map(|id| ZoneSet(vec![id]))
                    .ok_or_else(|| DeError::custom(format!("invalid zone id: {:?}", s)))
            }
            fn visit_seq<A>(self, mut seq: A) -> Result<ZoneSet, A::Error>
            where
                A: serde::de::SeqAccess<'de>,
            {
                let mut ids = Vec::new();
                while let Some(id) = seq.next_element::<ZoneId>()? {
                    ids.push(id);
                }
                Ok(ZoneSet(ids))
            }
        }
        deserializer.deserialize_any(V)
    }
}

/// A user-triggered navigation command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NavigationCommand {
    /// Move the active window to the adjacent zone (or, when it is not
    /// snapped yet, to the layout's edge zone in that direction).
    MoveToAdjacent(Direction),
    /// Focus the window occupying the adjacent zone.
    FocusAdjacent(Direction),
    /// Swap the active window with the occupant of the adjacent zone.
    SwapAdjacent(Direction),
    /// Snap the active window to the zone with this number.
    SnapToZone(u8),
    /// Snap the active window to the first empty zone.
    PushToEmptyZone,
    /// Rotate every snapped window on the screen one zone along the ring.
    Rotate { clockwise: bool },
    /// Return the active window to its pre-snap geometry.
    Restore,
    /// Float the active window, or un-float it back into its zone.
    ToggleFloat,
}

impl NavigationCommand {
    /// Machine-readable action name used in feedback.
    pub fn action(&self) -> &'static str {
        match self {
            NavigationCommand::MoveToAdjacent(_) => "move",
            NavigationCommand::FocusAdjacent(_) => "focus",
            NavigationCommand::SwapAdjacent(_) => "swap",
            NavigationCommand::SnapToZone(_) => "snap",
            NavigationCommand::PushToEmptyZone => "push",
            NavigationCommand::Rotate { .. } => "rotate",
            NavigationCommand::Restore => "restore",
            NavigationCommand::ToggleFloat => "float",
        }
    }
}

/// Every notification the engine accepts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    WindowOpened {
        window: WindowInfo,
        screen: String,
    },
    WindowActivated {
        window: WindowHandle,
        screen: String,
    },
    WindowClosed {
        window: WindowHandle,
    },
    /// The compositor applied a snap (user drag, or the echo of a
    /// [`Request::MoveWindowToZone`]).
    WindowSnapped {
        window: WindowHandle,
        zones: ZoneSet,
        screen: String,
        /// Free-floating geometry right before the snap, if known.
        #[serde(default)]
        geometry: Option<Rect>,
    },
    WindowUnsnapped {
        window: WindowHandle,
    },
    /// A new layout became active on `screen`, or on every screen.
    LayoutChanged {
        #[serde(default)]
        screen: Option<String>,
        layout: Layout,
    },
    /// The set of screens or their usable areas changed.
    ScreensChanged(Vec<ScreenInfo>),
    Navigate {
        command: NavigationCommand,
        screen: String,
    },
    /// The user started dragging a window.
    DragStarted {
        window: WindowHandle,
        geometry: Rect,
    },
    /// The user aborted a drag (e.g. pressed Escape).
    DragCancelled,
    /// Flush state and stop the daemon.
    Shutdown,
}

/// Machine-readable reason attached to negative (and some positive)
/// navigation feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackReason {
    NoAdjacentZone,
    NotSnapped,
    GeometryError,
    SingleZone,
    NoSnappedWindows,
    NoActiveWindow,
    NoActiveLayout,
    UnknownScreen,
    ZoneNotFound,
    NoWindowInZone,
    NoEmptyZone,
    WindowFloating,
    NoPreSnapGeometry,
}

impl FeedbackReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedbackReason::NoAdjacentZone => "no_adjacent_zone",
            FeedbackReason::NotSnapped => "not_snapped",
            FeedbackReason::GeometryError => "geometry_error",
            FeedbackReason::SingleZone => "single_zone",
            FeedbackReason::NoSnappedWindows => "no_snapped_windows",
            FeedbackReason::NoActiveWindow => "no_active_window",
            FeedbackReason::NoActiveLayout => "no_active_layout",
            FeedbackReason::UnknownScreen => "unknown_screen",
            FeedbackReason::ZoneNotFound => "zone_not_found",
            FeedbackReason::NoWindowInZone => "no_window_in_zone",
            FeedbackReason::NoEmptyZone => "no_empty_zone",
            FeedbackReason::WindowFloating => "window_floating",
            FeedbackReason::NoPreSnapGeometry => "no_pre_snap_geometry",
        }
    }
}

impl fmt::Display for FeedbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one navigation attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationFeedback {
    pub success: bool,
    pub action: String,
    pub reason: Option<FeedbackReason>,
    pub source_zone: Option<ZoneId>,
    pub target_zone: Option<ZoneId>,
    pub screen: String,
}

/// One window moved by a rotation, resnap or re-projection batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotationEntry {
    pub window: WindowHandle,
    pub from_zone: ZoneId,
    pub to_zone: ZoneId,
    pub geometry: Rect,
}

/// Every request the engine sends to the compositor side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Request {
    MoveWindowToZone {
        window: WindowHandle,
        zones: Vec<ZoneId>,
        geometry: Rect,
    },
    FocusWindow {
        window: WindowHandle,
    },
    SwapWindows {
        first: WindowHandle,
        first_geometry: Rect,
        second: WindowHandle,
        second_geometry: Rect,
    },
    /// Return a window to free-floating geometry (`None`: leave size as is).
    RestoreWindow {
        window: WindowHandle,
        geometry: Option<Rect>,
    },
    ApplyRotation(Vec<RotationEntry>),
    Feedback(NavigationFeedback),
}
