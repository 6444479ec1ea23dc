//! The sync engine: reconciliation, save cascade, mirror setup, backups.
//!
//! Every entry point that talks to the remote service re-reads the profile
//! store first. Credentials are written by an external login process, so a
//! profile loaded a minute ago may already be stale.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use addonmirror_core::store::{mirror_groups, mirrors_of, validate_mirror};
use addonmirror_core::{
    AddonCollection, BackupManager, Profile, ProfileName, ProfileStore, SnapshotInfo,
};

use crate::canonical::collections_equal;
use crate::error::SyncError;
use crate::remote::AddonRemote;
use crate::status::{StatusBoard, SyncStatus};

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// What happened to one mirror during a scan or a cascade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorOutcome {
    pub mirror: ProfileName,
    pub master: ProfileName,
    pub status: SyncStatus,
    /// Whether a push to the mirror was issued (successful or not).
    pub pushed: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub outcomes: Vec<MirrorOutcome>,
    pub finished_at: DateTime<Utc>,
}

impl SyncReport {
    fn new(outcomes: Vec<MirrorOutcome>) -> Self {
        Self {
            outcomes,
            finished_at: Utc::now(),
        }
    }

    pub fn pushed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.pushed).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.status == SyncStatus::SyncFailed)
            .count()
    }

    pub fn outcome(&self, mirror: &ProfileName) -> Option<&MirrorOutcome> {
        self.outcomes.iter().find(|o| &o.mirror == mirror)
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Composes the profile store, backups and a remote into sync operations.
#[derive(Clone)]
pub struct SyncEngine {
    store: ProfileStore,
    backups: BackupManager,
    remote: Arc<dyn AddonRemote>,
    status: Arc<StatusBoard>,
}

impl SyncEngine {
    pub fn new(store: ProfileStore, remote: Arc<dyn AddonRemote>) -> Self {
        let backups = BackupManager::new(store.layout());
        Self {
            store,
            backups,
            remote,
            status: Arc::new(StatusBoard::new()),
        }
    }

    /// Share an existing status board instead of a private one.
    pub fn with_status(mut self, status: Arc<StatusBoard>) -> Self {
        self.status = status;
        self
    }

    pub fn store(&self) -> &ProfileStore {
        &self.store
    }

    pub fn backups(&self) -> &BackupManager {
        &self.backups
    }

    pub fn remote(&self) -> &dyn AddonRemote {
        self.remote.as_ref()
    }

    pub fn status(&self) -> &Arc<StatusBoard> {
        &self.status
    }

    /// Fresh read of one profile from disk.
    pub fn profile(&self, name: &ProfileName) -> Result<Profile, SyncError> {
        Ok(self.store.get(name)?)
    }

    pub fn fetch_collection(&self, name: &ProfileName) -> Result<AddonCollection, SyncError> {
        let profile = self.profile(name)?;
        Ok(self.remote.fetch_collection(&profile)?)
    }

    /// Direct push with no status bookkeeping and no cascade.
    pub fn push_once(
        &self,
        name: &ProfileName,
        collection: &AddonCollection,
    ) -> Result<(), SyncError> {
        let profile = self.profile(name)?;
        self.remote.push_collection(&profile, collection)?;
        tracing::info!("pushed {} addons to '{name}'", collection.len());
        Ok(())
    }

    /// Save an edited collection, then push it to every mirror of `name`.
    ///
    /// A failed save pushes nothing to the mirrors. Once the save succeeds,
    /// each mirror is pushed independently and its status recorded.
    pub fn save_collection(
        &self,
        name: &ProfileName,
        collection: &AddonCollection,
    ) -> Result<SyncReport, SyncError> {
        self.push_once(name, collection)?;

        let profiles = self.store.load();
        let outcomes = mirrors_of(&profiles, name)
            .into_iter()
            .map(|mirror| {
                let result = self.push_once(&mirror, collection);
                let (status, error) = match result {
                    Ok(()) => (SyncStatus::Synced, None),
                    Err(err) => {
                        tracing::error!("cascade to '{mirror}' failed: {err}");
                        (SyncStatus::SyncFailed, Some(err.to_string()))
                    }
                };
                self.status.set(&mirror, status);
                MirrorOutcome {
                    mirror,
                    master: name.clone(),
                    status,
                    pushed: true,
                    error,
                }
            })
            .collect();
        Ok(SyncReport::new(outcomes))
    }

    // -----------------------------------------------------------------------
    // Reconciliation
    // -----------------------------------------------------------------------

    /// One pass over every (master, mirror) pair, pushing the master's
    /// collection wherever the mirror has drifted.
    pub fn reconcile_all(&self) -> SyncReport {
        let groups = mirror_groups(&self.store.load());
        for mirror in groups.values().flatten() {
            self.status.ensure(mirror);
        }

        let mut outcomes = Vec::new();
        for (master, mirrors) in &groups {
            for mirror in mirrors {
                self.status.set(mirror, SyncStatus::Checking);
            }

            let master_collection = match self.fetch_collection(master) {
                Ok(collection) => collection,
                Err(err) => {
                    tracing::error!("cannot reconcile mirrors of '{master}': {err}");
                    for mirror in mirrors {
                        self.status.set(mirror, SyncStatus::SyncFailed);
                        outcomes.push(MirrorOutcome {
                            mirror: mirror.clone(),
                            master: master.clone(),
                            status: SyncStatus::SyncFailed,
                            pushed: false,
                            error: Some(err.to_string()),
                        });
                    }
                    continue;
                }
            };

            for mirror in mirrors {
                outcomes.push(self.reconcile_mirror(master, &master_collection, mirror));
            }
        }

        let report = SyncReport::new(outcomes);
        tracing::info!(
            "reconciliation finished: {} mirrors, {} pushed, {} failed",
            report.outcomes.len(),
            report.pushed(),
            report.failed()
        );
        report
    }

    fn reconcile_mirror(
        &self,
        master: &ProfileName,
        master_collection: &AddonCollection,
        mirror: &ProfileName,
    ) -> MirrorOutcome {
        let mut outcome = MirrorOutcome {
            mirror: mirror.clone(),
            master: master.clone(),
            status: SyncStatus::Checking,
            pushed: false,
            error: None,
        };
        self.status.set(mirror, SyncStatus::Checking);

        let current = match self.fetch_collection(mirror) {
            Ok(collection) => collection,
            Err(err) => {
                tracing::error!("cannot fetch mirror '{mirror}': {err}");
                outcome.status = SyncStatus::SyncFailed;
                outcome.error = Some(err.to_string());
                self.status.set(mirror, outcome.status);
                return outcome;
            }
        };

        if collections_equal(master_collection, &current) {
            tracing::debug!("'{mirror}' matches '{master}'");
            outcome.status = SyncStatus::Synced;
            self.status.set(mirror, outcome.status);
            return outcome;
        }

        tracing::info!("'{mirror}' has drifted from '{master}', pushing");
        self.status.set(mirror, SyncStatus::Syncing);
        outcome.pushed = true;
        outcome.status = match self.push_once(mirror, master_collection) {
            Ok(()) => SyncStatus::AutoSynced,
            Err(err) => {
                tracing::error!("push to mirror '{mirror}' failed: {err}");
                outcome.error = Some(err.to_string());
                SyncStatus::SyncFailed
            }
        };
        self.status.set(mirror, outcome.status);
        outcome
    }

    // -----------------------------------------------------------------------
    // Mirror setup
    // -----------------------------------------------------------------------

    /// Make `name` mirror `master`, or stop mirroring with `None`.
    ///
    /// A new master is validated, its collection is pushed to `name`, and
    /// only then is the relation recorded. Nothing is recorded on failure.
    pub fn configure_mirror(
        &self,
        name: &ProfileName,
        master: Option<&ProfileName>,
    ) -> Result<(), SyncError> {
        let Some(master) = master else {
            self.store.set_mirror(name, None)?;
            self.status.remove(name);
            tracing::info!("mirroring disabled for '{name}'");
            return Ok(());
        };

        validate_mirror(&self.store.load(), name, Some(master))?;
        let collection = self.fetch_collection(master)?;
        self.push_once(name, &collection)?;
        self.store.set_mirror(name, Some(master))?;
        self.status.set(name, SyncStatus::Synced);
        tracing::info!("'{name}' now mirrors '{master}'");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Backups
    // -----------------------------------------------------------------------

    /// Fetch `name`'s current collection and snapshot it.
    pub fn create_backup(
        &self,
        name: &ProfileName,
        label: Option<&str>,
    ) -> Result<SnapshotInfo, SyncError> {
        let collection = self.fetch_collection(name)?;
        Ok(self.backups.create(name, &collection, label)?)
    }

    /// Push a snapshot back as `name`'s collection.
    pub fn restore_backup(
        &self,
        name: &ProfileName,
        snapshot: &SnapshotInfo,
    ) -> Result<AddonCollection, SyncError> {
        let collection = self.backups.load(snapshot)?;
        self.push_once(name, &collection)?;
        tracing::info!("restored {} to '{name}'", snapshot.file_name);
        Ok(collection)
    }
}
