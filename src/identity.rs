//! Mapping between volatile window handles and restart-surviving identities.
//!
//! Handles are re-created by the compositor on every session, so anything
//! that has to survive a restart is keyed by a [`StableKey`] derived from the
//! application class and resource name.  The derivation never looks at
//! addresses, process ids or creation order.

use crate::command::{WindowHandle, WindowInfo};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Restart-surviving window identity: `class:resource`, lower-cased.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StableKey(String);

impl StableKey {
    /// Derive the key for a window.  Returns `None` when the class is empty;
    /// such windows are tracked for the current session only.  An empty
    /// resource name falls back to the class.
    pub fn derive(class: &str, resource: &str) -> Option<Self> {
        let class = class.trim().to_lowercase();
        if class.is_empty() {
            return None;
        }
        let resource = resource.trim().to_lowercase();
        let resource = if resource.is_empty() {
            class.as_str()
        } else {
            resource.as_str()
        };
        Some(StableKey(format!("{}:{}", class, resource)))
    }

    /// Rebuild a key read back from storage.  Returns `None` for blank or
    /// malformed keys.
    pub fn from_persisted(raw: &str) -> Option<Self> {
        let (class, resource) = raw.split_once(':')?;
        Self::derive(class, resource)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StableKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Key under which per-window markers (floating) are kept.  Windows without
/// a stable key are tracked by handle and never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TrackingKey {
    Stable(StableKey),
    Session(WindowHandle),
}

/// A live window: its volatile handle plus whatever stable identity could be
/// derived for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowIdentity {
    pub handle: WindowHandle,
    pub stable: Option<StableKey>,
    /// Lower-cased application class (may be empty).
    pub class: String,
}

impl WindowIdentity {
    pub fn from_info(info: &WindowInfo) -> Self {
        Self {
            handle: info.handle.clone(),
            stable: StableKey::derive(&info.class, &info.resource),
            class: info.class.trim().to_lowercase(),
        }
    }

    pub fn tracking_key(&self) -> TrackingKey {
        match &self.stable {
            Some(key) => TrackingKey::Stable(key.clone()),
            None => TrackingKey::Session(self.handle.clone()),
        }
    }
}

/// Live handle ↔ stable key index.
#[derive(Debug, Default)]
pub struct IdentityReconciler {
    by_handle: HashMap<WindowHandle, WindowIdentity>,
    /// Live handles per key, oldest first.
    by_key: HashMap<StableKey, Vec<WindowHandle>>,
}

impl IdentityReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking a window.  Re-registering a handle refreshes its
    /// identity.
    pub fn register(&mut self, info: &WindowInfo) -> WindowIdentity {
        self.forget(&info.handle);
        let identity = WindowIdentity::from_info(info);
        if let Some(key) = &identity.stable {
            self.by_key
                .entry(key.clone())
                .or_default()
                .push(identity.handle.clone());
        }
        self.by_handle
            .insert(identity.handle.clone(), identity.clone());
        identity
    }

    pub fn identity(&self, handle: &WindowHandle) -> Option<&WindowIdentity> {
        self.by_handle.get(handle)
    }

    pub fn stable_key(&self, handle: &WindowHandle) -> Option<&StableKey> {
        self.by_handle.get(handle)?.stable.as_ref()
    }

    /// The most recently registered live handle carrying `key`.
    pub fn volatile_handle(&self, key: &StableKey) -> Option<&WindowHandle> {
        self.by_key.get(key)?.last()
    }

    /// Stop tracking a window, returning its last identity.
    pub fn forget(&mut self, handle: &WindowHandle) -> Option<WindowIdentity> {
        let identity = self.by_handle.remove(handle)?;
        if let Some(key) = &identity.stable {
            if let Some(handles) = self.by_key.get_mut(key) {
                handles.retain(|h| h != handle);
                if handles.is_empty() {
                    self.by_key.remove(key);
                }
            }
        }
        Some(identity)
    }

    pub fn len(&self) -> usize {
        self.by_handle.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_handle.is_empty()
    }
}
