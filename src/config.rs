//! Application configuration.
//!
//! The configuration is loaded from `$XDG_CONFIG_HOME/zonesnap/config.json`.
//! Every section is optional; a minimal `{}` file is valid and all sections
//! fall back to their compiled-in defaults.
//!
//! # Example
//!
//! ```json
//! {
//!   "snapping": {
//!     "restore_on_open": true,
//!     "snap_to_last_zone": true,
//!     "app_rules": [ { "class": "org.kde.konsole", "zone": 2 } ]
//!   },
//!   "gaps": { "outer": 10, "inner": 6 },
//!   "persistence": { "debounce_ms": 300 },
//!   "layouts": [
//!     {
//!       "name": "halves",
//!       "zones": [
//!         { "id": "1f0c1f7e-5b2a-4d0e-9f44-7a1c3b9d2e01", "number": 1,
//!           "geometry": { "x": 0.0, "y": 0.0, "width": 0.5, "height": 1.0 } },
//!         { "id": "6a3e2d10-8c4b-4f6a-b1d2-0e9f8a7c6b52", "number": 2,
//!           "geometry": { "x": 0.5, "y": 0.0, "width": 0.5, "height": 1.0 } }
//!       ]
//!     }
//!   ],
//!   "default_layout": "halves",
//!   "screen_layouts": { "HDMI-A-1": "halves" }
//! }
//! ```

use crate::geometry::GapProjector;
use crate::layout::{Layout, LayoutRegistry};
use crate::policy::SnapConfig;
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Auto-snap and resnap behaviour.
    #[serde(default)]
    pub snapping: SnapConfig,

    #[serde(default)]
    pub gaps: GapConfig,

    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// Known layouts.  Zone ids must be fixed here so persisted
    /// assignments still resolve after a restart.
    #[serde(default)]
    pub layouts: Vec<Layout>,

    /// Layout active on screens without an override, by name or id.
    /// Defaults to the first layout.
    #[serde(default)]
    pub default_layout: Option<String>,

    /// Screen name → layout name or id.
    #[serde(default)]
    pub screen_layouts: HashMap<String, String>,
}

/// Pixel gaps between zones and around the screen edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GapConfig {
    /// Gap along screen edges.  Default: `8`.
    pub outer: i32,
    /// Gap between neighbouring zones.  Default: `8`.
    pub inner: i32,
}

impl Default for GapConfig {
    fn default() -> Self {
        Self { outer: 8, inner: 8 }
    }
}

impl GapConfig {
    pub fn projector(&self) -> GapProjector {
        GapProjector::new(self.outer, self.inner)
    }
}

/// Where and how often state is written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    /// Quiet period before a burst of changes is written (ms).
    /// Default: `500`.
    pub debounce_ms: u64,
    /// State file.  Default: `$XDG_STATE_HOME/zonesnap/state.json`.
    pub path: Option<PathBuf>,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 500,
            path: None,
        }
    }
}

impl PersistenceConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl Config {
    /// Load configuration from a JSON file at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError(format!("failed to read {}: {}", path.display(), e)))?;
        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| ConfigError(format!("failed to parse {}: {}", path.display(), e)))?;
        Ok(config)
    }

    /// Registry of the configured layouts.  Without any, a single
    /// full-screen zone is used so windows can still be tracked.
    pub fn layout_registry(&self) -> LayoutRegistry {
        let layouts = if self.layouts.is_empty() {
            info!("no layouts configured, using a single full-screen zone");
            vec![Layout::columns("fullscreen", 1)]
        } else {
            self.layouts.clone()
        };
        LayoutRegistry::new(layouts, self.default_layout.as_deref(), &self.screen_layouts)
    }
}

/// Error from loading or parsing a configuration file.
#[derive(Debug, thiserror::Error)]
#[error("config error: {0}")]
pub struct ConfigError(String);
