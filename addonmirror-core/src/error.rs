//! Error types for addonmirror-core.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::ProfileName;

/// Local storage failures: profile store, snapshot files, configuration.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying I/O failure, with the path that was being touched.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization error (write/save path).
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// JSON parse error on load, with the file that failed.
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// YAML error reading or writing the configuration file.
    #[error("failed to read or write config at {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// `dirs::home_dir()` returned `None`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,

    /// A snapshot with the same file name already exists.
    #[error("snapshot already exists: {path}")]
    SnapshotExists { path: PathBuf },
}

/// Rejected input. Raised before any mutation takes place.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("profile name cannot be empty")]
    EmptyName,

    #[error("profile name '{0}' cannot contain path separators or control characters")]
    UnsafeName(String),

    #[error("profile '{0}' already exists")]
    DuplicateProfile(ProfileName),

    #[error("profile '{0}' not found")]
    UnknownProfile(ProfileName),

    #[error("profile '{0}' cannot mirror itself")]
    SelfMirror(ProfileName),

    #[error("'{profile}' cannot mirror '{master}': '{master}' already follows '{profile}'")]
    MirrorCycle {
        profile: ProfileName,
        master: ProfileName,
    },

    #[error("backup label is empty after removing unsupported characters")]
    EmptyLabel,

    #[error("invalid snapshot name '{0}'")]
    InvalidSnapshotName(String),

    #[error("directory {path} is not writable: {reason}")]
    UnwritableDirectory { path: PathBuf, reason: String },
}

/// Either the input was rejected or local storage failed.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.into(),
        source,
    }
}
