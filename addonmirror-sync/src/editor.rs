//! In-memory edits of a fetched addon collection.
//!
//! Nothing here talks to the remote service except to fetch an addon's
//! original manifest and, for [`clone_to_targets`], to update other
//! profiles. Edited collections are persisted with
//! [`SyncEngine::save_collection`](crate::engine::SyncEngine::save_collection).

use std::collections::BTreeSet;

use addonmirror_core::{AddonCollection, AddonEntry, CatalogEntry, ProfileName};

use crate::canonical::canonical_string;
use crate::engine::SyncEngine;
use crate::error::{EditError, RemoteError};
use crate::remote::AddonRemote;

// ---------------------------------------------------------------------------
// Edit session
// ---------------------------------------------------------------------------

/// A working copy of one profile's collection plus the fetched baseline.
#[derive(Debug, Clone)]
pub struct EditSession {
    profile: ProfileName,
    working: AddonCollection,
    baseline: String,
    baseline_entries: BTreeSet<String>,
}

impl EditSession {
    pub fn new(profile: ProfileName, fetched: AddonCollection) -> Self {
        let mut session = Self {
            profile,
            working: fetched,
            baseline: String::new(),
            baseline_entries: BTreeSet::new(),
        };
        session.mark_saved();
        session
    }

    pub fn profile(&self) -> &ProfileName {
        &self.profile
    }

    pub fn collection(&self) -> &AddonCollection {
        &self.working
    }

    pub fn collection_mut(&mut self) -> &mut AddonCollection {
        &mut self.working
    }

    pub fn into_collection(self) -> AddonCollection {
        self.working
    }

    pub fn is_modified(&self) -> bool {
        canonical_string(&self.working) != self.baseline
    }

    /// An entry is modified when no fetched entry has the same canonical form.
    pub fn entry_modified(&self, index: usize) -> bool {
        self.working
            .entries()
            .get(index)
            .is_some_and(|e| !self.baseline_entries.contains(&canonical_string(e)))
    }

    /// Make the working copy the new baseline.
    pub fn mark_saved(&mut self) {
        self.baseline = canonical_string(&self.working);
        self.baseline_entries = self.working.entries().iter().map(canonical_string).collect();
    }

    pub fn entry_mut(&mut self, index: usize) -> Result<&mut AddonEntry, EditError> {
        let len = self.working.len();
        self.working
            .entries_mut()
            .get_mut(index)
            .ok_or(EditError::OutOfRange {
                position: index + 1,
                len,
            })
    }
}

/// Resolve an addon reference: 1-based position, exact transport URL, or
/// case-insensitive manifest name, in that order.
pub fn find_addon(collection: &AddonCollection, query: &str) -> Result<usize, EditError> {
    let query = query.trim();
    if let Ok(position) = query.parse::<usize>() {
        if (1..=collection.len()).contains(&position) {
            return Ok(position - 1);
        }
    }
    let entries = collection.entries();
    entries
        .iter()
        .position(|e| e.transport_url() == Some(query))
        .or_else(|| {
            let wanted = query.to_lowercase();
            entries
                .iter()
                .position(|e| e.manifest.name().is_some_and(|n| n.to_lowercase() == wanted))
        })
        .ok_or_else(|| EditError::AddonNotFound(query.to_owned()))
}

// ---------------------------------------------------------------------------
// Whole-addon edits
// ---------------------------------------------------------------------------

/// Fetch the manifest at `url` and append it as a new entry.
pub fn install_addon(
    collection: &mut AddonCollection,
    url: &str,
    remote: &dyn AddonRemote,
) -> Result<usize, EditError> {
    let url = url.trim();
    if url.is_empty() {
        return Err(EditError::Manifest(RemoteError::NoUrl));
    }
    if collection.contains_transport_url(url) {
        return Err(EditError::AlreadyInstalled(url.to_owned()));
    }
    let manifest = remote.fetch_manifest(url).map_err(EditError::Manifest)?;
    collection.entries_mut().push(AddonEntry::new(url, manifest));
    Ok(collection.len() - 1)
}

pub fn remove_addon(
    collection: &mut AddonCollection,
    index: usize,
) -> Result<AddonEntry, EditError> {
    check_index(index, collection.len())?;
    Ok(collection.entries_mut().remove(index))
}

/// Move the entry at `from` so it ends up at `to`.
pub fn move_addon(
    collection: &mut AddonCollection,
    from: usize,
    to: usize,
) -> Result<(), EditError> {
    let len = collection.len();
    check_index(from, len)?;
    check_index(to, len)?;
    let entries = collection.entries_mut();
    let entry = entries.remove(from);
    entries.insert(to, entry);
    Ok(())
}

/// Replace the manifest's display name. Blank names are ignored.
pub fn rename(entry: &mut AddonEntry, name: &str) -> bool {
    let name = name.trim();
    if name.is_empty() {
        return false;
    }
    entry.manifest.set_name(name);
    true
}

/// Replace the whole manifest with the original from the transport URL.
///
/// Discards every local edit, the master catalog cache included.
pub fn reset_to_default(entry: &mut AddonEntry, remote: &dyn AddonRemote) -> Result<(), EditError> {
    let url = entry
        .transport_url()
        .ok_or(EditError::Manifest(RemoteError::NoUrl))?;
    entry.manifest = remote.fetch_manifest(url).map_err(EditError::Manifest)?;
    Ok(())
}

fn check_index(index: usize, len: usize) -> Result<(), EditError> {
    if index < len {
        Ok(())
    } else {
        Err(EditError::OutOfRange {
            position: index + 1,
            len,
        })
    }
}

// ---------------------------------------------------------------------------
// Catalog selection
// ---------------------------------------------------------------------------

/// Enable/disable state over an addon's full catalog list.
#[derive(Debug, Clone)]
pub struct CatalogSelection {
    addon: String,
    available: Vec<CatalogEntry>,
    enabled: BTreeSet<String>,
}

impl CatalogSelection {
    /// Start editing `entry`'s catalogs.
    ///
    /// The full list comes from the master catalog cache. When the cache has
    /// not been seeded yet, the original manifest is fetched; if that fails
    /// the currently enabled catalogs are used instead.
    pub fn begin(entry: &AddonEntry, remote: &dyn AddonRemote) -> Result<Self, EditError> {
        let addon = entry.display_name().to_owned();
        let available = match entry.manifest.master_catalogs() {
            Some(cached) => cached,
            None => match entry.transport_url().map(|url| remote.fetch_manifest(url)) {
                Some(Ok(original)) => original.catalogs(),
                Some(Err(err)) => {
                    tracing::warn!("using enabled catalogs for '{addon}': {err}");
                    entry.manifest.catalogs()
                }
                None => entry.manifest.catalogs(),
            },
        };
        if available.is_empty() {
            return Err(EditError::NoCatalogs(addon));
        }

        let enabled = entry.manifest.catalogs().into_iter().map(|c| c.id).collect();
        Ok(Self {
            addon,
            available,
            enabled,
        })
    }

    pub fn available(&self) -> &[CatalogEntry] {
        &self.available
    }

    pub fn is_enabled(&self, id: &str) -> bool {
        self.enabled.contains(id)
    }

    /// Flip one catalog. Returns its new state.
    pub fn toggle(&mut self, id: &str) -> Result<bool, EditError> {
        self.check(id)?;
        if self.enabled.remove(id) {
            Ok(false)
        } else {
            self.enabled.insert(id.to_owned());
            Ok(true)
        }
    }

    pub fn enable(&mut self, id: &str) -> Result<(), EditError> {
        self.check(id)?;
        self.enabled.insert(id.to_owned());
        Ok(())
    }

    pub fn disable(&mut self, id: &str) -> Result<(), EditError> {
        self.check(id)?;
        self.enabled.remove(id);
        Ok(())
    }

    /// Write the selection back: enabled catalogs in cache order, plus the cache.
    pub fn commit(self, entry: &mut AddonEntry) {
        let catalogs: Vec<CatalogEntry> = self
            .available
            .iter()
            .filter(|c| self.enabled.contains(&c.id))
            .cloned()
            .collect();
        entry.manifest.set_catalogs(&catalogs);
        entry.manifest.set_master_catalogs(&self.available);
        tracing::debug!(
            "'{}': {} of {} catalogs enabled",
            self.addon,
            catalogs.len(),
            self.available.len()
        );
    }

    fn check(&self, id: &str) -> Result<(), EditError> {
        if self.available.iter().any(|c| c.id == id) {
            Ok(())
        } else {
            Err(EditError::UnknownCatalog(id.to_owned()))
        }
    }
}

// ---------------------------------------------------------------------------
// Catalog order
// ---------------------------------------------------------------------------

/// Reordering of an addon's enabled catalogs. The cache is not touched.
#[derive(Debug, Clone)]
pub struct CatalogOrder {
    catalogs: Vec<CatalogEntry>,
}

impl CatalogOrder {
    pub fn begin(entry: &AddonEntry) -> Result<Self, EditError> {
        let catalogs = entry.manifest.catalogs();
        if catalogs.len() < 2 {
            return Err(EditError::TooFewCatalogs(entry.display_name().to_owned()));
        }
        Ok(Self { catalogs })
    }

    pub fn catalogs(&self) -> &[CatalogEntry] {
        &self.catalogs
    }

    pub fn position_of(&self, id: &str) -> Result<usize, EditError> {
        self.catalogs
            .iter()
            .position(|c| c.id == id)
            .ok_or_else(|| EditError::UnknownCatalog(id.to_owned()))
    }

    pub fn move_up(&mut self, index: usize) -> Result<usize, EditError> {
        self.move_by(index, -1)
    }

    pub fn move_down(&mut self, index: usize) -> Result<usize, EditError> {
        self.move_by(index, 1)
    }

    /// Swap the catalog at `index` step by step, stopping at either end.
    /// Returns where it ended up.
    pub fn move_by(&mut self, index: usize, steps: isize) -> Result<usize, EditError> {
        check_index(index, self.catalogs.len())?;
        let last = self.catalogs.len() - 1;
        let mut pos = index;
        for _ in 0..steps.unsigned_abs() {
            let next = if steps < 0 {
                pos.checked_sub(1)
            } else {
                (pos < last).then_some(pos + 1)
            };
            let Some(next) = next else { break };
            self.catalogs.swap(pos, next);
            pos = next;
        }
        Ok(pos)
    }

    pub fn commit(self, entry: &mut AddonEntry) {
        entry.manifest.set_catalogs(&self.catalogs);
    }
}

// ---------------------------------------------------------------------------
// Clone to other profiles
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloneOutcome {
    Added,
    AlreadyPresent,
    Failed(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CloneReport {
    pub results: Vec<(ProfileName, CloneOutcome)>,
}

impl CloneReport {
    pub fn outcome(&self, target: &ProfileName) -> Option<&CloneOutcome> {
        self.results
            .iter()
            .find(|(name, _)| name == target)
            .map(|(_, outcome)| outcome)
    }

    pub fn failures(&self) -> usize {
        self.results
            .iter()
            .filter(|(_, o)| matches!(o, CloneOutcome::Failed(_)))
            .count()
    }
}

/// Append `entry` to each target's collection where it is missing.
///
/// Targets are handled independently: a failed fetch or push is recorded
/// and the next target is tried. `source` is never a target.
pub fn clone_to_targets(
    engine: &SyncEngine,
    source: &ProfileName,
    entry: &AddonEntry,
    targets: &[ProfileName],
) -> CloneReport {
    let mut report = CloneReport::default();
    for target in targets.iter().filter(|t| *t != source) {
        let outcome = match clone_one(engine, target, entry) {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::error!("skipping '{target}': {err}");
                CloneOutcome::Failed(err.to_string())
            }
        };
        report.results.push((target.clone(), outcome));
    }
    report
}

fn clone_one(
    engine: &SyncEngine,
    target: &ProfileName,
    entry: &AddonEntry,
) -> Result<CloneOutcome, crate::SyncError> {
    let mut collection = engine.fetch_collection(target)?;
    if let Some(url) = entry.transport_url() {
        if collection.contains_transport_url(url) {
            tracing::debug!("'{target}' already has {url}");
            return Ok(CloneOutcome::AlreadyPresent);
        }
    }
    collection.entries_mut().push(entry.clone());
    engine.push_once(target, &collection)?;
    Ok(CloneOutcome::Added)
}

#[cfg(test)]
mod tests {
    use super::*;
    use addonmirror_core::Manifest;
    use serde_json::json;

    struct Originals;

    impl AddonRemote for Originals {
        fn fetch_manifest(&self, url: &str) -> Result<Manifest, RemoteError> {
            match url {
                "https://ok/manifest.json" => Ok(serde_json::from_value(json!({
                    "id": "ok",
                    "name": "Original",
                    "catalogs": [
                        { "id": "a", "type": "movie", "name": "A" },
                        { "id": "b", "type": "movie", "name": "B" },
                        { "id": "c", "type": "series", "name": "C" }
                    ]
                }))
                .unwrap()),
                _ => Err(RemoteError::Network("unreachable".into())),
            }
        }

        fn get_collection(&self, _: &str) -> Result<AddonCollection, RemoteError> {
            unreachable!()
        }

        fn set_collection(&self, _: &str, _: &AddonCollection) -> Result<(), RemoteError> {
            unreachable!()
        }
    }

    fn entry(url: &str, name: &str, catalogs: &[&str]) -> AddonEntry {
        let mut manifest = Manifest::default();
        manifest.set_name(name);
        let catalogs: Vec<_> = catalogs
            .iter()
            .map(|id| CatalogEntry::new(*id, "movie", id.to_uppercase()))
            .collect();
        manifest.set_catalogs(&catalogs);
        AddonEntry::new(url, manifest)
    }

    fn ids(catalogs: &[CatalogEntry]) -> Vec<&str> {
        catalogs.iter().map(|c| c.id.as_str()).collect()
    }

    #[test]
    fn selection_seeds_cache_from_original() {
        let mut addon = entry("https://ok/manifest.json", "Ok", &["b"]);
        let mut selection = CatalogSelection::begin(&addon, &Originals).expect("begin");
        assert_eq!(ids(selection.available()), vec!["a", "b", "c"]);
        assert!(selection.is_enabled("b"));

        assert!(selection.toggle("c").unwrap());
        selection.enable("a").unwrap();
        selection.disable("b").unwrap();
        selection.commit(&mut addon);

        assert_eq!(ids(&addon.manifest.catalogs()), vec!["a", "c"]);
        assert_eq!(ids(&addon.manifest.master_catalogs().unwrap()), vec!["a", "b", "c"]);
    }

    #[test]
    fn selection_falls_back_to_enabled_list() {
        let addon = entry("https://down/manifest.json", "Down", &["x", "y"]);
        let selection = CatalogSelection::begin(&addon, &Originals).expect("begin");
        assert_eq!(ids(selection.available()), vec!["x", "y"]);
    }

    #[test]
    fn selection_rejects_addon_without_catalogs() {
        let addon = entry("https://down/manifest.json", "Bare", &[]);
        assert!(matches!(
            CatalogSelection::begin(&addon, &Originals),
            Err(EditError::NoCatalogs(_))
        ));
    }

    #[test]
    fn selection_rejects_unknown_ids() {
        let addon = entry("https://ok/manifest.json", "Ok", &["a"]);
        let mut selection = CatalogSelection::begin(&addon, &Originals).unwrap();
        assert!(matches!(selection.toggle("zzz"), Err(EditError::UnknownCatalog(_))));
    }

    #[test]
    fn reorder_swaps_and_clamps() {
        let mut addon = entry("https://ok/manifest.json", "Ok", &["a", "b", "c"]);
        addon.manifest.set_master_catalogs(&[CatalogEntry::new("a", "movie", "A")]);

        let mut order = CatalogOrder::begin(&addon).unwrap();
        assert_eq!(order.move_down(0).unwrap(), 1);
        assert_eq!(order.move_up(0).unwrap(), 0);
        assert_eq!(order.move_by(0, 10).unwrap(), 2);
        assert_eq!(ids(order.catalogs()), vec!["a", "c", "b"]);
        order.commit(&mut addon);

        assert_eq!(addon.manifest.master_catalogs().unwrap().len(), 1, "cache untouched");
    }

    #[test]
    fn reorder_and_selection_keep_catalogs_without_id() {
        let mut addon: AddonEntry = serde_json::from_value(json!({
            "transportUrl": "https://down/manifest.json",
            "manifest": {
                "name": "Mixed",
                "catalogs": [
                    { "id": "x", "type": "movie" },
                    { "type": "movie", "name": "legacy" },
                    { "id": "y", "type": "movie" }
                ]
            }
        }))
        .unwrap();

        let mut order = CatalogOrder::begin(&addon).unwrap();
        order.move_down(0).unwrap();
        order.commit(&mut addon);
        let raw = serde_json::to_value(&addon).unwrap();
        assert_eq!(raw["manifest"]["catalogs"][1]["name"], "legacy");
        assert_eq!(ids(&addon.manifest.catalogs()), vec!["y", "x"]);

        let mut selection = CatalogSelection::begin(&addon, &Originals).unwrap();
        selection.disable("x").unwrap();
        selection.commit(&mut addon);
        let raw = serde_json::to_value(&addon).unwrap();
        assert_eq!(raw["manifest"]["catalogs"].as_array().unwrap().len(), 2);
        assert_eq!(raw["manifest"]["catalogs"][1]["name"], "legacy");
        assert_eq!(ids(&addon.manifest.catalogs()), vec!["y"]);
    }

    #[test]
    fn reorder_needs_two_catalogs() {
        let addon = entry("https://ok/manifest.json", "Ok", &["a"]);
        assert!(matches!(
            CatalogOrder::begin(&addon),
            Err(EditError::TooFewCatalogs(_))
        ));
    }

    #[test]
    fn reset_replaces_whole_manifest() {
        let mut addon = entry("https://ok/manifest.json", "Renamed", &["a"]);
        addon.manifest.set_master_catalogs(&[CatalogEntry::new("a", "movie", "A")]);
        reset_to_default(&mut addon, &Originals).expect("reset");
        assert_eq!(addon.manifest.name(), Some("Original"));
        assert!(!addon.manifest.has_master_catalogs());

        let mut broken = entry("https://down/manifest.json", "Keep", &[]);
        assert!(matches!(
            reset_to_default(&mut broken, &Originals),
            Err(EditError::Manifest(RemoteError::Network(_)))
        ));
        assert_eq!(broken.manifest.name(), Some("Keep"));
    }

    #[test]
    fn lookup_by_position_url_and_name() {
        let collection = AddonCollection::new(vec![
            entry("https://one/manifest.json", "Cinemeta", &[]),
            entry("https://two/manifest.json", "Torrentio", &[]),
        ]);
        assert_eq!(find_addon(&collection, "2").unwrap(), 1);
        assert_eq!(find_addon(&collection, "https://one/manifest.json").unwrap(), 0);
        assert_eq!(find_addon(&collection, "torrentio").unwrap(), 1);
        assert!(matches!(
            find_addon(&collection, "3"),
            Err(EditError::AddonNotFound(_))
        ));
    }

    #[test]
    fn session_tracks_entry_changes() {
        let fetched = AddonCollection::new(vec![
            entry("https://one/manifest.json", "One", &[]),
            entry("https://two/manifest.json", "Two", &[]),
        ]);
        let mut session = EditSession::new(ProfileName::from("alice"), fetched);
        assert!(!session.is_modified());

        rename(session.entry_mut(1).unwrap(), "Deux");
        assert!(session.is_modified());
        assert!(!session.entry_modified(0));
        assert!(session.entry_modified(1));

        session.mark_saved();
        assert!(!session.is_modified());
        assert!(!session.entry_modified(1));
    }

    #[test]
    fn moving_addons_is_a_modification() {
        let fetched = AddonCollection::new(vec![
            entry("https://one/manifest.json", "One", &[]),
            entry("https://two/manifest.json", "Two", &[]),
        ]);
        let mut session = EditSession::new(ProfileName::from("alice"), fetched);
        move_addon(session.collection_mut(), 1, 0).unwrap();
        assert!(session.is_modified());
        assert!(!session.entry_modified(0), "entries themselves are unchanged");

        let removed = remove_addon(session.collection_mut(), 0).unwrap();
        assert_eq!(removed.manifest.name(), Some("Two"));
        assert!(remove_addon(session.collection_mut(), 5).is_err());
    }

    #[test]
    fn install_fetches_manifest_and_rejects_duplicates() {
        let mut collection = AddonCollection::default();
        let index = install_addon(&mut collection, "https://ok/manifest.json", &Originals).unwrap();
        assert_eq!(index, 0);
        assert_eq!(collection.entries()[0].manifest.id(), Some("ok"));

        assert!(matches!(
            install_addon(&mut collection, "https://ok/manifest.json", &Originals),
            Err(EditError::AlreadyInstalled(_))
        ));
        assert!(matches!(
            install_addon(&mut collection, "https://down/manifest.json", &Originals),
            Err(EditError::Manifest(_))
        ));
        assert_eq!(collection.len(), 1);
    }
}
