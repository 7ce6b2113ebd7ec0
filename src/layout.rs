//! Zones, layouts and the in-memory layout registry.
//!
//! A [`Layout`] is an ordered list of [`Zone`]s.  Declaration order is the
//! rotation fallback order; the zone *number* is what numeric shortcuts and
//! rotation rings use when it is well formed.
//!
//! Zone identifiers are UUIDs.  Hosts are not consistent about how they
//! print them (`{…}` braced vs. bare hyphenated), so [`ZoneId::parse`]
//! accepts both and two encodings of the same UUID compare equal.

use crate::geometry::RelativeRect;
use crate::traits::LayoutProvider;
use log::{debug, warn};
use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Prefix of the transient markers the zone selector reports while the
/// user hovers a layout thumbnail.  They are never persisted.
const SELECTOR_PREFIX: &str = "zoneselector-";

/// Identifier of a zone.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ZoneId {
    /// A real zone of some layout revision.
    Zone(Uuid),
    /// An ephemeral zone-selector marker.
    Selector(String),
}

impl ZoneId {
    /// A fresh random zone id.
    pub fn new() -> Self {
        ZoneId::Zone(Uuid::new_v4())
    }

    /// Parse any of the accepted textual encodings.  Returns `None` for
    /// empty or malformed input.
    pub fn parse(s: &str) -> Option<Self> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return None;
        }
        if trimmed.starts_with(SELECTOR_PREFIX) {
            return Some(ZoneId::Selector(trimmed.to_string()));
        }
        let bare = trimmed.trim_start_matches('{').trim_end_matches('}');
        Uuid::parse_str(bare).ok().map(ZoneId::Zone)
    }

    /// Transient ids must not outlive the current session.
    pub fn is_transient(&self) -> bool {
        matches!(self, ZoneId::Selector(_))
    }
}

impl Default for ZoneId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ZoneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ZoneId::Zone(uuid) => write!(f, "{}", uuid.hyphenated()),
            ZoneId::Selector(marker) => f.write_str(marker),
        }
    }
}

impl FromStr for ZoneId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ZoneId::parse(s).ok_or_else(|| format!("invalid zone id: {:?}", s))
    }
}

impl Serialize for ZoneId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ZoneId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        ZoneId::parse(&s).ok_or_else(|| DeError::custom(format!("invalid zone id: {:?}", s)))
    }
}

/// One named region of a layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    pub id: ZoneId,
    /// Human-assigned number (1..9) used by numeric shortcuts.
    pub number: u8,
    pub geometry: RelativeRect,
}

impl Zone {
    pub fn new(number: u8, geometry: RelativeRect) -> Self {
        Self {
            id: ZoneId::new(),
            number,
            geometry,
        }
    }
}

/// An ordered collection of zones usable on a screen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layout {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub name: String,
    pub zones: Vec<Zone>,
}

impl Layout {
    pub fn new(name: impl Into<String>, zones: Vec<Zone>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            zones,
        }
    }

    /// Equal-width columns, numbered 1..=n left to right.
    pub fn columns(name: impl Into<String>, n: u8) -> Self {
        let width = 1.0 / n.max(1) as f64;
        let zones = (0..n.max(1))
            .map(|i| Zone::new(i + 1, RelativeRect::new(i as f64 * width, 0.0, width, 1.0)))
            .collect();
        Self::new(name, zones)
    }

    pub fn zone(&self, id: &ZoneId) -> Option<&Zone> {
        self.zones.iter().find(|z| &z.id == id)
    }

    /// First zone carrying `number`, in declaration order.
    pub fn zone_by_number(&self, number: u8) -> Option<&Zone> {
        self.zones.iter().find(|z| z.number == number)
    }

    pub fn contains(&self, id: &ZoneId) -> bool {
        self.zone(id).is_some()
    }

    /// Whether every id of a (non-empty) set belongs to this layout.
    pub fn contains_all(&self, ids: &[ZoneId]) -> bool {
        !ids.is_empty() && ids.iter().all(|id| self.contains(id))
    }

    /// Log configuration errors that the engine tolerates: duplicate or
    /// out-of-range zone numbers and degenerate geometry.  Returns `true` when
    /// the layout is clean.
    pub fn check(&self) -> bool {
        let mut clean = true;
        let mut seen = HashSet::new();
        for zone in &self.zones {
            if !seen.insert(zone.number) {
                warn!(
                    "layout {:?}: duplicate zone number {}",
                    self.name, zone.number
                );
                clean = false;
            }
            if !(1..=9).contains(&zone.number) {
                warn!(
                    "layout {:?}: zone number {} outside 1..9",
                    self.name, zone.number
                );
                clean = false;
            }
            if !zone.geometry.is_valid() {
                warn!("layout {:?}: zone {} has invalid geometry", self.name, zone.id);
                clean = false;
            }
        }
        clean
    }
}

/// In-memory [`LayoutProvider`]: a set of known layouts, a default one and
/// optional per-screen overrides.
///
/// Layouts handed to [`new`](LayoutRegistry::new) stay known for the life of
/// the registry.  Layouts that only arrived through
/// [`activate`](LayoutProvider::activate) are evicted once no screen uses
/// them.
#[derive(Debug, Clone, Default)]
pub struct LayoutRegistry {
    layouts: Vec<Layout>,
    declared: HashSet<Uuid>,
    default: Option<Uuid>,
    per_screen: HashMap<String, Uuid>,
}

impl LayoutRegistry {
    /// Build a registry.  `default` and the values of `screen_layouts` may
    /// name a layout either by its name or by its id; unknown references are
    /// logged and ignored.
    pub fn new(
        layouts: Vec<Layout>,
        default: Option<&str>,
        screen_layouts: &HashMap<String, String>,
    ) -> Self {
        for layout in &layouts {
            layout.check();
        }
        let mut reg = Self {
            declared: layouts.iter().map(|l| l.id).collect(),
            layouts,
            default: None,
            per_screen: HashMap::new(),
        };
        reg.default = match default {
            Some(name) => reg.resolve(name),
            None => reg.layouts.first().map(|l| l.id),
        };
        for (screen, name) in screen_layouts {
            match reg.resolve(name) {
                Some(id) => {
                    reg.per_screen.insert(screen.clone(), id);
                }
                None => warn!("screen {}: unknown layout {:?}", screen, name),
            }
        }
        reg
    }

    fn resolve(&self, reference: &str) -> Option<Uuid> {
        let by_name = self.layouts.iter().find(|l| l.name == reference);
        let by_id = || {
            let id = Uuid::parse_str(reference.trim_matches(|c| c == '{' || c == '}')).ok()?;
            self.layouts.iter().find(|l| l.id == id)
        };
        let found = by_name.or_else(by_id).map(|l| l.id);
        if found.is_none() {
            warn!("unknown layout {:?}", reference);
        }
        found
    }

    fn in_use(&self, id: Uuid) -> bool {
        self.default == Some(id) || self.per_screen.values().any(|&used| used == id)
    }

    fn evict_unused(&mut self) {
        let before = self.layouts.len();
        let keep: HashSet<Uuid> = self
            .layouts
            .iter()
            .map(|l| l.id)
            .filter(|&id| self.declared.contains(&id) || self.in_use(id))
            .collect();
        self.layouts.retain(|l| keep.contains(&l.id));
        if self.layouts.len() < before {
            debug!("evicted {} superseded layout(s)", before - self.layouts.len());
        }
    }

    fn insert_revision(&mut self, layout: Layout) -> Uuid {
        let id = layout.id;
        match self.layouts.iter_mut().find(|l| l.id == id) {
            Some(existing) => *existing = layout,
            None => self.layouts.push(layout),
        }
        id
    }
}

impl LayoutProvider for LayoutRegistry {
    fn layout_for_screen(&self, screen: &str) -> Option<&Layout> {
        let id = self.per_screen.get(screen).copied().or(self.default)?;
        self.layouts.iter().find(|l| l.id == id)
    }

    fn layouts(&self) -> Vec<&Layout> {
        self.layouts.iter().filter(|l| self.in_use(l.id)).collect()
    }

    fn activate(&mut self, screen: Option<&str>, layout: Layout) {
        layout.check();
        let id = self.insert_revision(layout);
        match screen {
            Some(screen) => {
                self.per_screen.insert(screen.to_string(), id);
            }
            None => {
                self.default = Some(id);
                self.per_screen.clear();
            }
        }
        self.evict_unused();
    }
}

//  Tests
