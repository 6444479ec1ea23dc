pub mod addons;
pub mod backup;
pub mod config;
pub mod diff;
pub mod profile;
pub mod reconcile;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use colored::Colorize;

use addonmirror_core::{
    config as app_config, BackupManager, Config, DataLayout, ProfileName, ProfileStore,
};
use addonmirror_sync::{HttpRemote, Session, SyncEngine, SyncReport, SyncStatus};

/// Resolved home, configuration and data root for one invocation.
pub struct App {
    pub home: PathBuf,
    pub config: Config,
    pub layout: DataLayout,
    pub store: ProfileStore,
}

impl App {
    pub fn load() -> Result<Self> {
        let home = dirs::home_dir().context("could not determine home directory")?;
        let config = app_config::load_at(&home);
        let layout = config.layout_at(&home);
        layout
            .ensure()
            .with_context(|| format!("failed to prepare {}", layout.root().display()))?;
        let store = ProfileStore::new(layout.clone());
        Ok(Self {
            home,
            config,
            layout,
            store,
        })
    }

    pub fn engine(&self) -> SyncEngine {
        let remote = Arc::new(HttpRemote::from_config(&self.config));
        SyncEngine::new(self.store.clone(), remote)
    }

    pub fn backups(&self) -> BackupManager {
        BackupManager::new(&self.layout)
    }

    pub fn session(&self) -> Result<Session> {
        Session::new(self.engine()).context("failed to start session")
    }

    /// Reject names that are not in the store, before any remote call.
    pub fn profile_name(&self, name: &str) -> Result<ProfileName> {
        let name = ProfileName::from(name);
        self.store
            .get(&name)
            .with_context(|| format!("run `addonmirror profile add {name}` first"))?;
        Ok(name)
    }
}

pub fn status_label(status: SyncStatus) -> String {
    let label = status.to_string();
    match status {
        SyncStatus::Synced | SyncStatus::AutoSynced => label.green().bold().to_string(),
        SyncStatus::SyncFailed => label.red().bold().to_string(),
        SyncStatus::Checking | SyncStatus::Syncing => label.yellow().to_string(),
        SyncStatus::Unchecked => label.bright_black().to_string(),
    }
}

/// One line per mirror touched by a save cascade.
pub fn print_cascade(report: &SyncReport) {
    for outcome in &report.outcomes {
        match &outcome.error {
            None => println!("  ↳ mirror '{}' {}", outcome.mirror, status_label(outcome.status)),
            Some(err) => println!(
                "  ↳ mirror '{}' {}: {err}",
                outcome.mirror,
                status_label(outcome.status)
            ),
        }
    }
}
