use std::path::{Path, PathBuf};

use crate::error::{io_err, StoreError};

pub const APP_DIR: &str = ".addonmirror";
pub const CONFIG_FILE: &str = "config.yaml";
pub const STORE_FILE: &str = "profiles.json";
pub const PROFILES_DIR: &str = "profiles";
pub const SNAPSHOTS_DIR: &str = "snapshots";
pub const LOG_FILE: &str = "addonmirror.log";

/// `<home>/.addonmirror`: holds the config file, and is the default data root.
pub fn app_root(home: &Path) -> PathBuf {
    home.join(APP_DIR)
}

pub fn config_path(home: &Path) -> PathBuf {
    app_root(home).join(CONFIG_FILE)
}

/// Directory layout under a resolved data root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataLayout {
    root: PathBuf,
}

impl DataLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn store_path(&self) -> PathBuf {
        self.root.join(STORE_FILE)
    }

    pub fn profiles_dir(&self) -> PathBuf {
        self.root.join(PROFILES_DIR)
    }

    pub fn snapshots_dir(&self) -> PathBuf {
        self.root.join(SNAPSHOTS_DIR)
    }

    pub fn log_path(&self) -> PathBuf {
        self.root.join(LOG_FILE)
    }

    /// Create the root, profiles and snapshots directories if missing.
    pub fn ensure(&self) -> Result<(), StoreError> {
        for dir in [self.root.clone(), self.profiles_dir(), self.snapshots_dir()] {
            std::fs::create_dir_all(&dir).map_err(|e| io_err(&dir, e))?;
        }
        Ok(())
    }
}
