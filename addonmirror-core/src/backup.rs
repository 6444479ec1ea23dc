//! Point-in-time snapshots of a profile's addon collection.
//!
//! One pretty-printed JSON file per snapshot under `<data_root>/snapshots/`,
//! named `<profile>_<YYYY-MM-DD_HH-MM-SS>[_<label>].json`. The file name is
//! the snapshot's identity; the body is the collection exactly as fetched.

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime};

use crate::error::{io_err, CoreError, StoreError, ValidationError};
use crate::paths::DataLayout;
use crate::types::{AddonCollection, ProfileName};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";
const TIMESTAMP_LEN: usize = 19;
const EXTENSION: &str = ".json";

/// Descriptor of one snapshot file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotInfo {
    pub file_name: String,
    pub profile: ProfileName,
    /// `None` for files whose name carries no timestamp.
    pub taken_at: Option<NaiveDateTime>,
    pub label: Option<String>,
}

impl SnapshotInfo {
    /// Human-readable name for listings: `2024-05-01 09:30 PM [label]`.
    pub fn display_name(&self) -> String {
        match (&self.taken_at, &self.label) {
            (Some(ts), Some(label)) => format!("{} {label}", ts.format("%Y-%m-%d %I:%M %p")),
            (Some(ts), None) => ts.format("%Y-%m-%d %I:%M %p").to_string(),
            (None, Some(label)) => label.clone(),
            (None, None) => self.file_name.clone(),
        }
    }

    fn parse(profile: &ProfileName, file_name: &str) -> Option<Self> {
        let rest = file_name
            .strip_prefix(profile.as_str())?
            .strip_prefix('_')?
            .strip_suffix(EXTENSION)?;

        let stamp = rest
            .get(..TIMESTAMP_LEN)
            .and_then(|s| NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT).ok());
        let label = match stamp {
            Some(_) => rest[TIMESTAMP_LEN..].strip_prefix('_').unwrap_or_default(),
            // `alice_bob_<timestamp>.json` belongs to `alice_bob`, not to `alice`.
            None if has_embedded_timestamp(rest) => return None,
            None => rest,
        };

        Some(Self {
            file_name: file_name.to_owned(),
            profile: profile.clone(),
            taken_at: stamp,
            label: (!label.is_empty()).then(|| label.to_owned()),
        })
    }
}

fn has_embedded_timestamp(rest: &str) -> bool {
    rest.match_indices('_').any(|(i, _)| {
        rest.get(i + 1..i + 1 + TIMESTAMP_LEN)
            .is_some_and(|s| NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT).is_ok())
    })
}

/// Keep alphanumerics, space, `_` and `-`; trim trailing whitespace.
pub fn sanitize_label(label: &str) -> String {
    let kept: String = label
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '_' | '-'))
        .collect();
    kept.trim_end().to_owned()
}

fn snapshot_file_name(profile: &ProfileName, taken_at: NaiveDateTime, label: &str) -> String {
    let stamp = taken_at.format(TIMESTAMP_FORMAT);
    if label.is_empty() {
        format!("{profile}_{stamp}{EXTENSION}")
    } else {
        format!("{profile}_{stamp}_{label}{EXTENSION}")
    }
}

/// Snapshot files in the shared snapshots area.
#[derive(Debug, Clone)]
pub struct BackupManager {
    dir: PathBuf,
}

impl BackupManager {
    pub fn new(layout: &DataLayout) -> Self {
        Self {
            dir: layout.snapshots_dir(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write a snapshot of `collection`, stamped with the current local time.
    pub fn create(
        &self,
        profile: &ProfileName,
        collection: &AddonCollection,
        label: Option<&str>,
    ) -> Result<SnapshotInfo, CoreError> {
        self.create_at(profile, collection, label, Local::now().naive_local())
    }

    /// [`create`](Self::create) with an explicit timestamp.
    ///
    /// Never overwrites an existing snapshot.
    pub fn create_at(
        &self,
        profile: &ProfileName,
        collection: &AddonCollection,
        label: Option<&str>,
        taken_at: NaiveDateTime,
    ) -> Result<SnapshotInfo, CoreError> {
        let label = label.map(sanitize_label).unwrap_or_default();
        let file_name = snapshot_file_name(profile, taken_at, &label);
        check_file_name(&file_name)?;
        std::fs::create_dir_all(&self.dir).map_err(|e| io_err(&self.dir, e))?;
        let path = self.dir.join(&file_name);

        let json = serde_json::to_string_pretty(collection).map_err(StoreError::from)?;
        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::AlreadyExists => StoreError::SnapshotExists { path: path.clone() },
                _ => io_err(&path, e),
            })?;
        file.write_all(json.as_bytes()).map_err(|e| io_err(&path, e))?;

        tracing::info!("created snapshot {file_name} ({} addons)", collection.len());
        Ok(SnapshotInfo {
            file_name,
            profile: profile.clone(),
            taken_at: Some(taken_at),
            label: (!label.is_empty()).then_some(label),
        })
    }

    /// Snapshots belonging to `profile`, most recent first.
    pub fn list(&self, profile: &ProfileName) -> Result<Vec<SnapshotInfo>, StoreError> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(vec![]),
            Err(err) => return Err(io_err(&self.dir, err)),
        };

        let mut snapshots: Vec<SnapshotInfo> = entries
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
            .filter_map(|e| SnapshotInfo::parse(profile, &e.file_name().to_string_lossy()))
            .collect();
        snapshots.sort_by(|a, b| {
            b.taken_at
                .cmp(&a.taken_at)
                .then_with(|| b.file_name.cmp(&a.file_name))
        });
        Ok(snapshots)
    }

    /// Look up one of `profile`'s snapshots by file name.
    pub fn find(&self, profile: &ProfileName, file_name: &str) -> Result<SnapshotInfo, CoreError> {
        check_file_name(file_name)?;
        self.list(profile)?
            .into_iter()
            .find(|s| s.file_name == file_name)
            .ok_or_else(|| ValidationError::InvalidSnapshotName(file_name.to_owned()).into())
    }

    /// Read a snapshot back into a collection.
    pub fn load(&self, snapshot: &SnapshotInfo) -> Result<AddonCollection, CoreError> {
        let path = self.path_of(&snapshot.file_name)?;
        let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
        let collection = serde_json::from_str(&contents)
            .map_err(|e| StoreError::Parse { path, source: e })?;
        Ok(collection)
    }

    /// Replace a snapshot's label, keeping its profile and timestamp.
    pub fn rename(&self, snapshot: &SnapshotInfo, new_label: &str) -> Result<SnapshotInfo, CoreError> {
        let label = sanitize_label(new_label);
        if label.is_empty() {
            return Err(ValidationError::EmptyLabel.into());
        }
        let from = self.path_of(&snapshot.file_name)?;
        let file_name = match snapshot.taken_at {
            Some(ts) => snapshot_file_name(&snapshot.profile, ts, &label),
            None => format!("{}_{label}{EXTENSION}", snapshot.profile),
        };
        let to = self.dir.join(&file_name);
        if to.exists() && to != from {
            return Err(StoreError::SnapshotExists { path: to }.into());
        }
        std::fs::rename(&from, &to).map_err(|e| io_err(&from, e))?;

        tracing::info!("renamed snapshot {} -> {file_name}", snapshot.file_name);
        Ok(SnapshotInfo {
            file_name,
            profile: snapshot.profile.clone(),
            taken_at: snapshot.taken_at,
            label: Some(label),
        })
    }

    pub fn delete(&self, snapshot: &SnapshotInfo) -> Result<(), CoreError> {
        let path = self.path_of(&snapshot.file_name)?;
        std::fs::remove_file(&path).map_err(|e| io_err(&path, e))?;
        tracing::info!("deleted snapshot {}", snapshot.file_name);
        Ok(())
    }

    fn path_of(&self, file_name: &str) -> Result<PathBuf, ValidationError> {
        check_file_name(file_name)?;
        Ok(self.dir.join(file_name))
    }
}

/// Snapshot identities are bare file names inside the snapshots area.
fn check_file_name(file_name: &str) -> Result<(), ValidationError> {
    let bare = !file_name.is_empty()
        && !file_name.contains(['/', '\\'])
        && file_name != "."
        && file_name != ".."
        && file_name.ends_with(EXTENSION);
    if bare {
        Ok(())
    } else {
        Err(ValidationError::InvalidSnapshotName(file_name.to_owned()))
    }
}
