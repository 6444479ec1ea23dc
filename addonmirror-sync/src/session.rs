//! Runtime for one interactive session.
//!
//! The startup reconciliation scan runs as a single background blocking
//! task for as long as it needs. User actions run one at a time on a
//! blocking worker that the caller joins before continuing.

use std::collections::BTreeMap;

use tokio::runtime::Runtime;
use tokio::task::JoinHandle;

use addonmirror_core::ProfileName;

use crate::engine::{SyncEngine, SyncReport};
use crate::error::SyncError;
use crate::status::SyncStatus;

pub struct Session {
    runtime: Runtime,
    engine: SyncEngine,
    reconciliation: Option<JoinHandle<SyncReport>>,
}

impl Session {
    pub fn new(engine: SyncEngine) -> Result<Self, SyncError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(|e| SyncError::Worker(format!("cannot start runtime: {e}")))?;
        Ok(Self {
            runtime,
            engine,
            reconciliation: None,
        })
    }

    pub fn engine(&self) -> &SyncEngine {
        &self.engine
    }

    /// Current per-mirror statuses. May trail the scan by one update.
    pub fn statuses(&self) -> BTreeMap<ProfileName, SyncStatus> {
        self.engine.status().snapshot()
    }

    /// Kick off the one-shot reconciliation scan. Later calls are no-ops.
    pub fn start_reconciliation(&mut self) {
        if self.reconciliation.is_some() {
            tracing::debug!("reconciliation already started");
            return;
        }
        let engine = self.engine.clone();
        self.reconciliation = Some(self.runtime.spawn_blocking(move || engine.reconcile_all()));
    }

    pub fn reconciliation_finished(&self) -> bool {
        self.reconciliation
            .as_ref()
            .map_or(true, JoinHandle::is_finished)
    }

    /// Block until the scan is done. `None` if it was never started.
    pub fn wait_for_reconciliation(&mut self) -> Result<Option<SyncReport>, SyncError> {
        let Some(handle) = self.reconciliation.take() else {
            return Ok(None);
        };
        self.runtime
            .block_on(handle)
            .map(Some)
            .map_err(|e| SyncError::Worker(format!("reconciliation task failed: {e}")))
    }

    /// Run one user action on a worker and wait for its result.
    pub fn run<T, F>(&self, label: &str, action: F) -> Result<T, SyncError>
    where
        F: FnOnce(&SyncEngine) -> Result<T, SyncError> + Send + 'static,
        T: Send + 'static,
    {
        let engine = self.engine.clone();
        tracing::info!("{label}...");
        let handle = self.runtime.spawn_blocking(move || action(&engine));
        match self.runtime.block_on(handle) {
            Ok(result) => result,
            Err(err) => Err(SyncError::Worker(format!("{label}: {err}"))),
        }
    }
}
