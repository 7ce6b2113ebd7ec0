//! Physical screens as reported by the compositor.

use crate::geometry::Rect;
use crate::traits::ScreenProvider;
use serde::{Deserialize, Serialize};

/// Static information about a screen known to the compositor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenInfo {
    /// Unique name the compositor uses for this screen (e.g. `"DP-1"`).
    pub name: String,
    /// Full screen geometry on the virtual desktop (pixels).
    pub geometry: Rect,
    /// Area left over once panels and docks are excluded.  `None` means the
    /// whole screen is usable.
    #[serde(default)]
    pub available: Option<Rect>,
}

impl ScreenInfo {
    pub fn new(name: impl Into<String>, geometry: Rect) -> Self {
        Self {
            name: name.into(),
            geometry,
            available: None,
        }
    }

    /// The rectangle zones are projected onto.
    pub fn usable_area(&self) -> Rect {
        self.available.unwrap_or(self.geometry)
    }
}

/// In-memory [`ScreenProvider`] fed by `ScreensChanged` notifications.
#[derive(Debug, Clone, Default)]
pub struct ScreenRegistry {
    screens: Vec<ScreenInfo>,
}

impl ScreenRegistry {
    pub fn new(screens: Vec<ScreenInfo>) -> Self {
        Self { screens }
    }
}

impl ScreenProvider for ScreenRegistry {
    fn screens(&self) -> Vec<ScreenInfo> {
        self.screens.clone()
    }

    fn screen(&self, name: &str) -> Option<ScreenInfo> {
        self.screens.iter().find(|s| s.name == name).cloned()
    }

    fn replace(&mut self, screens: Vec<ScreenInfo>) -> Vec<String> {
        let changed = screens
            .iter()
            .filter(|new| {
                self.screens
                    .iter()
                    .find(|old| old.name == new.name)
                    .map_or(true, |old| old.usable_area() != new.usable_area())
            })
            .map(|s| s.name.clone())
            .collect();
        self.screens = screens;
        changed
    }
}
