//! Durable snap state.
//!
//! The [`AssignmentStore`] is serialized into two records of a
//! [`KeyValueStore`]:
//!
//! * `"windows"`: stable key → list of [`WindowRecord`]s (one per tracked
//!   window carrying that key).
//! * `"session"`: the [`SessionRecord`] holding the last-used zone and the
//!   classes the user has ever snapped by hand.
//!
//! [`PersistenceGateway`] coalesces bursts of mutations into one write after
//! a quiet period and offers a synchronous [`flush`](PersistenceGateway::flush)
//! for clean shutdown.  Nothing here runs on its own thread; the host polls
//! [`PersistenceGateway::is_due`] from its event loop.
//!
//! # Example state file
//!
//! ```json
//! {
//!   "windows": {
//!     "org.kde.kate:kate": [
//!       { "zones": ["0b6e3c1a-0f3e-4f43-9a4e-7f0d8a6c2b11"], "screen": "DP-1",
//!         "desktop": 2, "pre_snap": { "x": 10, "y": 10, "width": 800, "height": 600 } }
//!     ]
//!   },
//!   "session": { "last_used": null, "user_snapped_classes": ["org.kde.kate"] }
//! }
//! ```

use crate::geometry::Rect;
use crate::identity::{IdentityReconciler, StableKey, TrackingKey};
use crate::layout::ZoneId;
use crate::store::{AssignmentStore, FloatMarker, LastUsedZone, PendingAssignment};
use crate::traits::LayoutProvider;
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::{Duration, Instant};
use uuid::Uuid;

const WINDOWS_KEY: &str = "windows";
const SESSION_KEY: &str = "session";

/// Errors produced while reading or writing persisted state.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("io error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

//  Storage backends

/// Minimal durable key-value store.  `set` may buffer; `sync` makes every
/// buffered value durable.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<Value>, PersistenceError>;

    fn set(&mut self, key: &str, value: Value) -> Result<(), PersistenceError>;

    fn sync(&mut self) -> Result<(), PersistenceError>;
}

/// All keys in a single JSON object on disk, replaced atomically on
/// [`sync`](KeyValueStore::sync).
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    entries: BTreeMap<String, Value>,
}

impl JsonFileStore {
    /// Open the store at `path`.  A missing file is an empty store.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        let path = path.as_ref().to_path_buf();
        let entries = match std::fs::read_to_string(&path) {
            Ok(text) if text.trim().is_empty() => BTreeMap::new(),
            Ok(text) => serde_json::from_str(&text)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("no state file at {}", path.display());
                BTreeMap::new()
            }
            Err(source) => return Err(PersistenceError::Io { path, source }),
        };
        Ok(Self { path, entries })
    }

    /// A store at `path` that ignores whatever the file holds now.
    pub fn empty(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            entries: BTreeMap::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io(&self, source: std::io::Error) -> PersistenceError {
        PersistenceError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<Value>, PersistenceError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: Value) -> Result<(), PersistenceError> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    fn sync(&mut self) -> Result<(), PersistenceError> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir).map_err(|e| self.io(e))?;
        }
        let text = serde_json::to_string_pretty(&self.entries)?;
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, text).map_err(|e| self.io(e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| self.io(e))?;
        Ok(())
    }
}

/// In-memory store.  Clones share the same contents, so a test can keep a
/// handle to what the engine wrote.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Rc<RefCell<BTreeMap<String, Value>>>,
    syncs: Rc<RefCell<usize>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// How many times [`sync`](KeyValueStore::sync) ran.
    pub fn sync_count(&self) -> usize {
        *self.syncs.borrow()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Value>, PersistenceError> {
        Ok(self.entries.borrow().get(key).cloned())
    }

    fn set(&mut self, key: &str, value: Value) -> Result<(), PersistenceError> {
        self.entries.borrow_mut().insert(key.to_string(), value);
        Ok(())
    }

    fn sync(&mut self) -> Result<(), PersistenceError> {
        *self.syncs.borrow_mut() += 1;
        Ok(())
    }
}

//  Records

/// One tracked window as persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowRecord {
    #[serde(default)]
    pub zones: Vec<ZoneId>,
    #[serde(default)]
    pub screen: String,
    #[serde(default)]
    pub desktop: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_snap: Option<Rect>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub floating: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pre_float_zones: Vec<ZoneId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_float_screen: Option<String>,
}

impl WindowRecord {
    fn from_pending(p: &PendingAssignment) -> Self {
        Self {
            zones: p.zones.clone(),
            screen: p.screen.clone(),
            desktop: p.desktop,
            layout: p.layout,
            pre_snap: p.pre_snap,
            ..Self::default()
        }
    }

    fn from_marker(marker: &FloatMarker) -> Self {
        Self {
            floating: true,
            pre_float_zones: marker.zones.clone(),
            pre_float_screen: marker.screen.clone(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    #[serde(default)]
    pub last_used: Option<LastUsedZone>,
    #[serde(default)]
    pub user_snapped_classes: BTreeSet<String>,
}

/// Everything that survives a restart.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersistedState {
    pub windows: BTreeMap<StableKey, Vec<WindowRecord>>,
    pub session: SessionRecord,
}

impl PersistedState {
    /// Snapshot `store`.  Live assignments are keyed through `identities`;
    /// session-only windows and transient selector assignments are left
    /// out.
    pub fn capture<L>(store: &AssignmentStore, identities: &IdentityReconciler, layouts: &L) -> Self
    where
        L: LayoutProvider + ?Sized,
    {
        let mut windows: BTreeMap<StableKey, Vec<WindowRecord>> = BTreeMap::new();
        for (handle, assignment) in store.assignments() {
            if assignment.is_transient() {
                continue;
            }
            let Some(key) = identities.stable_key(handle) else {
                continue;
            };
            windows.entry(key.clone()).or_default().push(WindowRecord {
                zones: assignment.zones(),
                screen: assignment.screen.clone(),
                desktop: assignment.desktop,
                layout: layouts.owner_of(&assignment.primary).map(|l| l.id),
                pre_snap: store.pre_snap(handle),
                ..WindowRecord::default()
            });
        }
        for (key, pending) in store.pending_entries() {
            windows
                .entry(key.clone())
                .or_default()
                .push(WindowRecord::from_pending(pending));
        }
        for (key, marker) in store.float_markers() {
            if let TrackingKey::Stable(key) = key {
                windows
                    .entry(key.clone())
                    .or_default()
                    .push(WindowRecord::from_marker(marker));
            }
        }
        Self {
            windows,
            session: SessionRecord {
                last_used: store.last_used().cloned(),
                user_snapped_classes: store.user_snapped_classes().clone(),
            },
        }
    }

    /// Reinstate into a fresh store: window records become pending
    /// restores, floating records become floating markers.
    pub fn restore_into(self, store: &mut AssignmentStore) {
        let mut pending = Vec::new();
        let mut floating = Vec::new();
        for (key, records) in self.windows {
            for record in records {
                if record.floating {
                    floating.push((
                        key.clone(),
                        FloatMarker {
                            zones: record.pre_float_zones,
                            screen: record.pre_float_screen,
                        },
                    ));
                } else if !record.zones.is_empty() {
                    pending.push((
                        key.clone(),
                        PendingAssignment {
                            zones: record.zones,
                            screen: record.screen,
                            desktop: record.desktop,
                            layout: record.layout,
                            pre_snap: record.pre_snap,
                        },
                    ));
                }
            }
        }
        info!(
            "restored {} pending window(s), {} floating marker(s)",
            pending.len(),
            floating.len()
        );
        store.import(
            pending,
            floating,
            self.session.last_used,
            self.session.user_snapped_classes,
        );
    }
}

//  Gateway

/// Debounced writer in front of a [`KeyValueStore`].
pub struct PersistenceGateway {
    backend: Box<dyn KeyValueStore>,
    debounce: Duration,
    due: Option<Instant>,
}

impl PersistenceGateway {
    pub fn new(backend: Box<dyn KeyValueStore>, debounce: Duration) -> Self {
        Self {
            backend,
            debounce,
            due: None,
        }
    }

    /// Note a mutation at `now`.  Each call restarts the quiet period, so a
    /// burst results in a single write.
    pub fn schedule(&mut self, now: Instant) {
        self.due = Some(now + self.debounce);
    }

    /// When the pending write falls due, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.due
    }

    pub fn is_due(&self, now: Instant) -> bool {
        self.due.is_some_and(|due| now >= due)
    }

    /// Background write.  Failures are logged and the state stays dirty
    /// for another attempt after the quiet period.
    pub fn write_due(&mut self, state: &PersistedState, now: Instant) {
        if !self.is_due(now) {
            return;
        }
        if let Err(e) = self.write(state) {
            error!("failed to persist state: {}", e);
            self.due = Some(now + self.debounce);
        }
    }

    /// Synchronous write of any unsaved mutation.
    pub fn flush(&mut self, state: &PersistedState) -> Result<(), PersistenceError> {
        if self.due.is_none() {
            debug!("flush: nothing to write");
            return Ok(());
        }
        self.write(state)
    }

    fn write(&mut self, state: &PersistedState) -> Result<(), PersistenceError> {
        let windows: BTreeMap<&str, &Vec<WindowRecord>> = state
            .windows
            .iter()
            .map(|(k, v)| (k.as_str(), v))
            .collect();
        self.backend.set(WINDOWS_KEY, serde_json::to_value(windows)?)?;
        self.backend
            .set(SESSION_KEY, serde_json::to_value(&state.session)?)?;
        self.backend.sync()?;
        self.due = None;
        debug!("persisted {} stable key(s)", state.windows.len());
        Ok(())
    }

    /// Read back persisted state.  Malformed stable keys are skipped.
    pub fn load(&self) -> Result<PersistedState, PersistenceError> {
        let mut state = PersistedState::default();
        if let Some(value) = self.backend.get(WINDOWS_KEY)? {
            let raw: BTreeMap<String, Vec<WindowRecord>> = serde_json::from_value(value)?;
            for (raw_key, records) in raw {
                match StableKey::from_persisted(&raw_key) {
                    Some(key) => {
                        state.windows.entry(key).or_default().extend(records);
                    }
                    None => warn!("ignoring persisted record with bad key {:?}", raw_key),
                }
            }
        }
        if let Some(value) = self.backend.get(SESSION_KEY)? {
            state.session = serde_json::from_value(value)?;
        }
        Ok(state)
    }
}

//  Tests

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{WindowHandle, WindowInfo};
    use crate::layout::{Layout, LayoutRegistry};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering};

    static TEST_ID: AtomicU32 = AtomicU32::new(0);

    fn tmp_state_path() -> PathBuf {
        let id = TEST_ID.fetch_add(1, Ordering::SeqCst);
        std::env::temp_dir()
            .join(format!("zonesnap-test-{}-{}", std::process::id(), id))
            .join("state.json")
    }

    fn kate() -> StableKey {
        StableKey::derive("kate", "kate").unwrap()
    }

    /// One live snapped window, one pending restore, one floating marker.
    fn populated() -> (AssignmentStore, IdentityReconciler, LayoutRegistry, ZoneId) {
        let layout = Layout::columns("halves", 2);
        let zone = layout.zones[0].id.clone();
        let layouts = LayoutRegistry::new(vec![layout], None, &HashMap::new());
        let mut ids = IdentityReconciler::new();
        ids.register(&WindowInfo::new("0x1", "kate", "kate"));
        ids.register(&WindowInfo::new("0x2", "", ""));

        let mut store = AssignmentStore::new();
        store.assign(&WindowHandle::from("0x1"), vec![zone.clone()], "DP-1", 1, false);
        store.record_pre_snap(&WindowHandle::from("0x1"), Rect::new(5, 5, 400, 300));
        store.assign(&WindowHandle::from("0x2"), vec![zone.clone()], "DP-1", 1, false);
        store.push_pending(
            StableKey::derive("dolphin", "dolphin").unwrap(),
            PendingAssignment {
                zones: vec![zone.clone()],
                screen: "DP-2".into(),
                desktop: 0,
                layout: None,
                pre_snap: None,
            },
        );
        store.set_floating(
            TrackingKey::Stable(StableKey::derive("vlc", "vlc").unwrap()),
            FloatMarker {
                zones: vec![zone.clone()],
                screen: Some("DP-1".into()),
            },
        );
        store.record_user_snap("kate");
        (store, ids, layouts, zone)
    }

    #[test]
    fn capture_skips_session_only_windows() {
        let (store, ids, layouts, zone) = populated();
        let state = PersistedState::capture(&store, &ids, &layouts);
        assert_eq!(state.windows.len(), 3);
        let rec = &state.windows[&kate()][0];
        assert_eq!(rec.zones, vec![zone]);
        assert_eq!(rec.pre_snap, Some(Rect::new(5, 5, 400, 300)));
        assert!(rec.layout.is_some());
        assert!(state.session.user_snapped_classes.contains("kate"));
    }

    #[test]
    fn restore_turns_records_into_pending_and_markers() {
        let (store, ids, layouts, zone) = populated();
        let state = PersistedState::capture(&store, &ids, &layouts);

        let mut fresh = AssignmentStore::new();
        state.restore_into(&mut fresh);
        assert!(fresh.is_empty());
        assert_eq!(fresh.pending_count(), 2);
        assert_eq!(fresh.pending(&kate())[0].zones, vec![zone.clone()]);
        let vlc = TrackingKey::Stable(StableKey::derive("vlc", "vlc").unwrap());
        assert_eq!(fresh.float_marker(&vlc).unwrap().zones, vec![zone]);
        assert!(fresh.was_user_snapped("kate"));
        assert!(fresh.take_changes().is_empty());
    }

    #[test]
    fn burst_of_schedules_coalesces_into_one_write() {
        let mem = MemoryStore::new();
        let mut gw = PersistenceGateway::new(Box::new(mem.clone()), Duration::from_millis(500));
        let t0 = Instant::now();
        for i in 0..10 {
            gw.schedule(t0 + Duration::from_millis(i * 50));
        }
        let state = PersistedState::default();
        gw.write_due(&state, t0 + Duration::from_millis(600));
        assert_eq!(mem.sync_count(), 0, "quiet period restarted by later mutations");
        gw.write_due(&state, t0 + Duration::from_millis(950));
        assert_eq!(mem.sync_count(), 1);
        assert!(gw.deadline().is_none());
        gw.write_due(&state, t0 + Duration::from_secs(5));
        assert_eq!(mem.sync_count(), 1);
    }

    #[test]
    fn flush_writes_immediately_and_only_when_dirty() {
        let mem = MemoryStore::new();
        let mut gw = PersistenceGateway::new(Box::new(mem.clone()), Duration::from_secs(60));
        let state = PersistedState::default();
        gw.flush(&state).unwrap();
        assert_eq!(mem.sync_count(), 0);
        gw.schedule(Instant::now());
        gw.flush(&state).unwrap();
        assert_eq!(mem.sync_count(), 1);
        assert!(gw.deadline().is_none());
    }

    #[test]
    fn gateway_round_trip_through_memory() {
        let (store, ids, layouts, _) = populated();
        let state = PersistedState::capture(&store, &ids, &layouts);
        let mem = MemoryStore::new();
        let mut gw = PersistenceGateway::new(Box::new(mem.clone()), Duration::ZERO);
        gw.schedule(Instant::now());
        gw.flush(&state).unwrap();
        assert_eq!(gw.load().unwrap(), state);
    }

    #[test]
    fn file_store_round_trip() {
        let path = tmp_state_path();
        let (store, ids, layouts, _) = populated();
        let state = PersistedState::capture(&store, &ids, &layouts);
        {
            let backend = JsonFileStore::open(&path).unwrap();
            let mut gw = PersistenceGateway::new(Box::new(backend), Duration::ZERO);
            gw.schedule(Instant::now());
            gw.flush(&state).unwrap();
        }
        let reopened = JsonFileStore::open(&path).unwrap();
        let gw = PersistenceGateway::new(Box::new(reopened), Duration::ZERO);
        assert_eq!(gw.load().unwrap(), state);
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn missing_file_is_empty_state() {
        let path = tmp_state_path();
        let backend = JsonFileStore::open(&path).unwrap();
        let gw = PersistenceGateway::new(Box::new(backend), Duration::ZERO);
        assert_eq!(gw.load().unwrap(), PersistedState::default());
    }

    #[test]
    fn corrupt_file_is_reported() {
        let path = tmp_state_path();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            JsonFileStore::open(&path),
            Err(PersistenceError::Json(_))
        ));
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn bad_keys_are_skipped_on_load() {
        let mut mem = MemoryStore::new();
        mem.set(
            WINDOWS_KEY,
            serde_json::json!({
                "": [ { "zones": [], "screen": "DP-1" } ],
                "kate:kate": [ { "zones": ["{0b6e3c1a-0f3e-4f43-9a4e-7f0d8a6c2b11}"], "screen": "DP-1" } ]
            }),
        )
        .unwrap();
        let gw = PersistenceGateway::new(Box::new(mem), Duration::ZERO);
        let state = gw.load().unwrap();
        assert_eq!(state.windows.len(), 1);
        assert_eq!(state.windows[&kate()][0].desktop, 0);
    }

    #[test]
    fn record_omits_unset_fields() {
        let rec = WindowRecord {
            zones: vec![ZoneId::new()],
            screen: "DP-1".into(),
            ..WindowRecord::default()
        };
        let json = serde_json::to_value(&rec).unwrap();
        assert!(json.get("floating").is_none());
        assert!(json.get("pre_snap").is_none());
    }
}
