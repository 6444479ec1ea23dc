//! Profile store: the persisted name → profile mapping.
//!
//! # Storage layout
//!
//! ```text
//! <data_root>/
//!   profiles.json          (name → { path, authKey, mirrors }, mode 0600)
//!   profiles/<name>/       (per-profile private storage)
//! ```
//!
//! The store keeps no in-memory cache. The credential field is written by an
//! external login process, so every caller that is about to use a credential
//! re-reads the file first. Mutating operations are one read-modify-write
//! each; there is no cross-process locking.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::error::{io_err, CoreError, StoreError, ValidationError};
use crate::paths::DataLayout;
use crate::types::{Profile, ProfileName};

/// All profiles, ordered by name.
pub type Profiles = BTreeMap<ProfileName, Profile>;

/// Handle to the profile store file under a data root.
#[derive(Debug, Clone)]
pub struct ProfileStore {
    layout: DataLayout,
}

impl ProfileStore {
    pub fn new(layout: DataLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &DataLayout {
        &self.layout
    }

    pub fn path(&self) -> PathBuf {
        self.layout.store_path()
    }

    // -----------------------------------------------------------------------
    // Load / save
    // -----------------------------------------------------------------------

    /// Load every profile.
    ///
    /// A missing file is an empty store. A corrupt file is logged and also
    /// treated as empty. Legacy record shapes are upgraded and written back.
    pub fn load(&self) -> Profiles {
        match self.try_load() {
            Ok(profiles) => profiles,
            Err(err) => {
                tracing::error!("failed to load profiles: {err}");
                Profiles::new()
            }
        }
    }

    /// Strict form of [`load`](Self::load): missing file is still empty, but
    /// unreadable or corrupt files are returned as errors.
    pub fn try_load(&self) -> Result<Profiles, StoreError> {
        let path = self.path();
        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Profiles::new()),
            Err(err) => return Err(io_err(&path, err)),
        };
        let raw: BTreeMap<String, Value> = serde_json::from_str(&contents)
            .map_err(|e| StoreError::Parse { path: path.clone(), source: e })?;

        let (profiles, migrated) = upgrade_records(raw)
            .map_err(|e| StoreError::Parse { path: path.clone(), source: e })?;

        if migrated {
            tracing::info!("upgraded legacy profile records in {}", path.display());
            if let Err(err) = self.save(&profiles) {
                tracing::error!("failed to persist upgraded profile records: {err}");
            }
        }
        Ok(profiles)
    }

    /// Atomically write every profile.
    ///
    /// Write flow: serialize → `.json.tmp` sibling → `chmod 0600` → `rename`.
    pub fn save(&self, profiles: &Profiles) -> Result<(), StoreError> {
        let path = self.path();
        let dir = self.layout.root();
        std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;

        let json = serde_json::to_string_pretty(profiles)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(|e| io_err(&tmp, e))?;
        set_file_permissions(&tmp)?;
        if let Err(e) = std::fs::rename(&tmp, &path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(io_err(&path, e));
        }
        Ok(())
    }

    /// Fresh read of a single profile.
    pub fn get(&self, name: &ProfileName) -> Result<Profile, ValidationError> {
        self.load()
            .remove(name)
            .ok_or_else(|| ValidationError::UnknownProfile(name.clone()))
    }

    // -----------------------------------------------------------------------
    // Record mutations
    // -----------------------------------------------------------------------

    /// Register a new profile and create its private storage directory.
    pub fn add_profile(&self, name: &str) -> Result<Profile, CoreError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        if !is_safe_name(name) {
            return Err(ValidationError::UnsafeName(name.to_owned()).into());
        }
        let name = ProfileName::from(name);
        let mut profiles = self.try_load()?;
        if profiles.contains_key(&name) {
            return Err(ValidationError::DuplicateProfile(name).into());
        }

        let path = unique_profile_dir(&self.layout.profiles_dir(), &name);
        std::fs::create_dir_all(&path).map_err(|e| io_err(&path, e))?;

        let profile = Profile::new(name.clone(), path);
        profiles.insert(name.clone(), profile.clone());
        self.save(&profiles)?;
        tracing::info!("added profile '{name}'");
        Ok(profile)
    }

    /// Remove a profile, its private storage, and any mirror pointers to it.
    pub fn delete_profile(&self, name: &ProfileName) -> Result<Profile, CoreError> {
        let mut profiles = self.try_load()?;
        let removed = profiles
            .remove(name)
            .ok_or_else(|| ValidationError::UnknownProfile(name.clone()))?;

        for profile in profiles.values_mut() {
            if profile.mirror_of.as_ref() == Some(name) {
                tracing::warn!("'{}' no longer mirrors deleted profile '{name}'", profile.name);
                profile.mirror_of = None;
            }
        }
        self.save(&profiles)?;

        if let Err(err) = std::fs::remove_dir_all(&removed.path) {
            tracing::warn!("could not remove {}: {err}", removed.path.display());
        }
        tracing::info!("deleted profile '{name}'");
        Ok(removed)
    }

    /// Store a credential for `name`. Returns `false` when it was already current.
    pub fn set_credential(&self, name: &ProfileName, token: &str) -> Result<bool, CoreError> {
        let mut profiles = self.try_load()?;
        let profile = profiles
            .get_mut(name)
            .ok_or_else(|| ValidationError::UnknownProfile(name.clone()))?;
        if profile.credential.as_deref() == Some(token) {
            return Ok(false);
        }
        profile.credential = Some(token.to_owned());
        self.save(&profiles)?;
        tracing::info!("credential updated for '{name}'");
        Ok(true)
    }

    /// Record (or clear) the master that `name` mirrors.
    pub fn set_mirror(
        &self,
        name: &ProfileName,
        master: Option<&ProfileName>,
    ) -> Result<(), CoreError> {
        let mut profiles = self.try_load()?;
        validate_mirror(&profiles, name, master)?;
        if let Some(profile) = profiles.get_mut(name) {
            profile.mirror_of = master.cloned();
        }
        self.save(&profiles)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Check that `name` may mirror `master`.
///
/// Rejects unknown profiles, self-mirroring, and any assignment that would
/// close a loop in the mirror chain.
pub fn validate_mirror(
    profiles: &Profiles,
    name: &ProfileName,
    master: Option<&ProfileName>,
) -> Result<(), ValidationError> {
    if !profiles.contains_key(name) {
        return Err(ValidationError::UnknownProfile(name.clone()));
    }
    let Some(master) = master else {
        return Ok(());
    };
    if master == name {
        return Err(ValidationError::SelfMirror(name.clone()));
    }
    if !profiles.contains_key(master) {
        return Err(ValidationError::UnknownProfile(master.clone()));
    }

    let mut seen = BTreeSet::new();
    let mut current = master;
    while let Some(next) = profiles.get(current).and_then(|p| p.mirror_of.as_ref()) {
        if next == name {
            return Err(ValidationError::MirrorCycle {
                profile: name.clone(),
                master: master.clone(),
            });
        }
        if !seen.insert(next) {
            break;
        }
        current = next;
    }
    Ok(())
}

/// Group mirror profiles by the master they follow.
pub fn mirror_groups(profiles: &Profiles) -> BTreeMap<ProfileName, Vec<ProfileName>> {
    let mut groups: BTreeMap<ProfileName, Vec<ProfileName>> = BTreeMap::new();
    for (name, profile) in profiles {
        if let Some(master) = &profile.mirror_of {
            groups.entry(master.clone()).or_default().push(name.clone());
        }
    }
    groups
}

/// Profiles whose mirror-of equals `master`, excluding `master` itself.
pub fn mirrors_of(profiles: &Profiles, master: &ProfileName) -> Vec<ProfileName> {
    profiles
        .iter()
        .filter(|(name, p)| *name != master && p.mirror_of.as_ref() == Some(master))
        .map(|(name, _)| name.clone())
        .collect()
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

/// Upgrade legacy record shapes. Returns the profiles and whether any record
/// changed shape.
fn upgrade_records(raw: BTreeMap<String, Value>) -> Result<(Profiles, bool), serde_json::Error> {
    let mut migrated = false;
    let mut profiles = Profiles::new();
    for (key, value) in raw {
        let incomplete = matches!(
            &value,
            Value::Object(map) if !map.contains_key("mirrors") || !map.contains_key("authKey")
        );
        let mut profile: Profile = match value {
            // Oldest shape: the record is just the storage path.
            Value::String(path) => {
                migrated = true;
                Profile::new(ProfileName::default(), PathBuf::from(path))
            }
            other => {
                migrated |= incomplete;
                serde_json::from_value(other)?
            }
        };
        profile.name = ProfileName::from(key);
        profiles.insert(profile.name.clone(), profile);
    }
    Ok((profiles, migrated))
}

/// Names end up in snapshot file names, so they must stay a single path component.
fn is_safe_name(name: &str) -> bool {
    name != "."
        && name != ".."
        && !name
            .chars()
            .any(|c| matches!(c, '/' | '\\') || c.is_control())
}

fn folder_name(name: &ProfileName) -> String {
    let cleaned: String = name
        .0
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == ' ' || *c == '_')
        .collect();
    let cleaned = cleaned.trim_end().to_owned();
    if cleaned.is_empty() {
        "profile".to_owned()
    } else {
        cleaned
    }
}

fn unique_profile_dir(profiles_dir: &Path, name: &ProfileName) -> PathBuf {
    let base = folder_name(name);
    let mut candidate = profiles_dir.join(&base);
    let mut n = 2;
    while candidate.exists() {
        candidate = profiles_dir.join(format!("{base}_{n}"));
        n += 1;
    }
    candidate
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), StoreError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .map_err(|e| io_err(path, e))
}
#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), StoreError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
