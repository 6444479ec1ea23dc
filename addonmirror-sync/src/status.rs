//! Per-mirror sync status, shared between the reconciliation task and readers.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use addonmirror_core::ProfileName;

/// Where a mirror profile stands in the current reconciliation round.
///
/// `Unchecked → Checking → { Synced | Syncing → { AutoSynced | SyncFailed } }`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncStatus {
    Unchecked,
    Checking,
    Synced,
    Syncing,
    AutoSynced,
    SyncFailed,
}

impl SyncStatus {
    /// Whether this round is finished for the profile.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Synced | Self::AutoSynced | Self::SyncFailed)
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unchecked => "UNCHECKED",
            Self::Checking => "CHECKING",
            Self::Synced => "SYNCED",
            Self::Syncing => "SYNCING",
            Self::AutoSynced => "AUTO_SYNCED",
            Self::SyncFailed => "SYNC_FAILED",
        };
        f.write_str(s)
    }
}

/// The status map. Writers replace one entry at a time; readers clone.
#[derive(Debug, Default)]
pub struct StatusBoard {
    inner: RwLock<BTreeMap<ProfileName, SyncStatus>>,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &ProfileName) -> Option<SyncStatus> {
        match self.inner.read() {
            Ok(map) => map.get(name).copied(),
            Err(poisoned) => poisoned.into_inner().get(name).copied(),
        }
    }

    pub fn set(&self, name: &ProfileName, status: SyncStatus) {
        tracing::debug!("status {name} -> {status}");
        let mut map = match self.inner.write() {
            Ok(map) => map,
            Err(poisoned) => poisoned.into_inner(),
        };
        map.insert(name.clone(), status);
    }

    /// Insert `Unchecked` for `name` unless it already has a status.
    pub fn ensure(&self, name: &ProfileName) {
        let mut map = match self.inner.write() {
            Ok(map) => map,
            Err(poisoned) => poisoned.into_inner(),
        };
        map.entry(name.clone()).or_insert(SyncStatus::Unchecked);
    }

    /// Drop `name`'s entry, e.g. when it stops mirroring.
    pub fn remove(&self, name: &ProfileName) {
        let mut map = match self.inner.write() {
            Ok(map) => map,
            Err(poisoned) => poisoned.into_inner(),
        };
        map.remove(name);
    }

    pub fn snapshot(&self) -> BTreeMap<ProfileName, SyncStatus> {
        match self.inner.read() {
            Ok(map) => map.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}
