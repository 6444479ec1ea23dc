//! User configuration at `<home>/.addonmirror/config.yaml`.
//!
//! Every function comes in an `_at(home, …)` form taking an explicit home
//! directory and a convenience form that derives it from `dirs::home_dir()`.
//! Tests always use the `_at` form.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{io_err, CoreError, StoreError, ValidationError};
use crate::paths::{self, DataLayout};

pub const DEFAULT_API_BASE_URL: &str = "https://api.strem.io/api/";
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

const WRITE_PROBE: &str = ".addonmirror_write_test";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Overrides the data root. Ignored when it does not name a directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_owned()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: None,
            api_base_url: default_api_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Config {
    /// The effective data root: `data_dir` when it exists, else `<home>/.addonmirror`.
    pub fn data_root_at(&self, home: &Path) -> PathBuf {
        match &self.data_dir {
            Some(dir) if dir.is_dir() => dir.clone(),
            Some(dir) => {
                tracing::warn!(
                    "configured data_dir {} is not a directory; using default",
                    dir.display()
                );
                paths::app_root(home)
            }
            None => paths::app_root(home),
        }
    }

    pub fn layout_at(&self, home: &Path) -> DataLayout {
        DataLayout::new(self.data_root_at(home))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

/// Load the config. A missing or unreadable file yields the defaults.
pub fn load_at(home: &Path) -> Config {
    let path = paths::config_path(home);
    let contents = match std::fs::read_to_string(&path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Config::default(),
        Err(err) => {
            tracing::error!("failed to read config {}: {err}", path.display());
            return Config::default();
        }
    };
    match serde_yaml::from_str(&contents) {
        Ok(config) => config,
        Err(err) => {
            tracing::error!("failed to parse config {}: {err}", path.display());
            Config::default()
        }
    }
}

/// `load_at` convenience wrapper.
pub fn load() -> Result<(PathBuf, Config), StoreError> {
    let home = home()?;
    let config = load_at(&home);
    Ok((home, config))
}

/// Atomically write the config file.
pub fn save_at(home: &Path, config: &Config) -> Result<(), StoreError> {
    let path = paths::config_path(home);
    let dir = paths::app_root(home);
    std::fs::create_dir_all(&dir).map_err(|e| io_err(&dir, e))?;

    let yaml = serde_yaml::to_string(config).map_err(|e| StoreError::Yaml {
        path: path.clone(),
        source: e,
    })?;
    let tmp = path.with_extension("yaml.tmp");
    std::fs::write(&tmp, yaml).map_err(|e| io_err(&tmp, e))?;
    std::fs::rename(&tmp, &path).map_err(|e| io_err(&path, e))?;
    Ok(())
}

/// Point the data root at `new_dir`, after checking that it can be written.
///
/// Existing profiles and snapshots are not moved.
pub fn set_data_dir_at(home: &Path, new_dir: &Path) -> Result<Config, CoreError> {
    probe_writable(new_dir)?;
    let mut config = load_at(home);
    config.data_dir = Some(new_dir.to_path_buf());
    save_at(home, &config)?;
    tracing::info!("data directory changed to {}", new_dir.display());
    Ok(config)
}

fn probe_writable(dir: &Path) -> Result<(), ValidationError> {
    let unwritable = |reason: std::io::Error| ValidationError::UnwritableDirectory {
        path: dir.to_path_buf(),
        reason: reason.to_string(),
    };
    std::fs::create_dir_all(dir).map_err(unwritable)?;
    let probe = dir.join(WRITE_PROBE);
    std::fs::write(&probe, b"test").map_err(unwritable)?;
    std::fs::remove_file(&probe).map_err(unwritable)?;
    Ok(())
}

pub fn home() -> Result<PathBuf, StoreError> {
    dirs::home_dir().ok_or(StoreError::HomeNotFound)
}
