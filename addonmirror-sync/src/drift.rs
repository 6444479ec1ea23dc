//! Drift reports: how a mirror's collection differs from its master's.

use similar::TextDiff;

use addonmirror_core::{AddonCollection, ProfileName};

use crate::canonical::{canonical_pretty, collections_equal, fingerprint};
use crate::engine::SyncEngine;
use crate::error::SyncError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriftReport {
    pub master: ProfileName,
    pub mirror: ProfileName,
    pub master_fingerprint: String,
    pub mirror_fingerprint: String,
    /// Unified diff from master to mirror; empty when in sync.
    pub unified_diff: String,
}

impl DriftReport {
    pub fn in_sync(&self) -> bool {
        self.master_fingerprint == self.mirror_fingerprint
    }
}

/// Compare two already-fetched collections.
pub fn compare(
    master: &ProfileName,
    master_collection: &AddonCollection,
    mirror: &ProfileName,
    mirror_collection: &AddonCollection,
) -> DriftReport {
    let unified_diff = if collections_equal(master_collection, mirror_collection) {
        String::new()
    } else {
        let old = canonical_pretty(master_collection);
        let new = canonical_pretty(mirror_collection);
        TextDiff::from_lines(&old, &new)
            .unified_diff()
            .header(&format!("a/{master}"), &format!("b/{mirror}"))
            .context_radius(3)
            .to_string()
    };

    DriftReport {
        master: master.clone(),
        mirror: mirror.clone(),
        master_fingerprint: fingerprint(master_collection),
        mirror_fingerprint: fingerprint(mirror_collection),
        unified_diff,
    }
}

/// Fetch `mirror` and its master and compare them. Nothing is pushed.
pub fn drift_of(engine: &SyncEngine, mirror: &ProfileName) -> Result<DriftReport, SyncError> {
    let profile = engine.profile(mirror)?;
    let master = profile
        .mirror_of
        .ok_or_else(|| SyncError::NotAMirror(mirror.clone()))?;
    let master_collection = engine.fetch_collection(&master)?;
    let mirror_collection = engine.fetch_collection(mirror)?;
    Ok(compare(&master, &master_collection, mirror, &mirror_collection))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn collection(value: serde_json::Value) -> AddonCollection {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn equal_collections_have_no_diff() {
        let a = collection(json!([{ "transportUrl": "u1", "manifest": { "name": "A", "id": "a" } }]));
        let b = collection(json!([{ "manifest": { "id": "a", "name": "A" }, "transportUrl": "u1" }]));
        let report = compare(&"bob".into(), &a, &"alice".into(), &b);
        assert!(report.in_sync());
        assert!(report.unified_diff.is_empty());
    }

    #[test]
    fn drift_shows_changed_lines() {
        let master = collection(json!([
            { "transportUrl": "u1", "manifest": { "name": "X" } },
            { "transportUrl": "u2", "manifest": { "name": "Y" } }
        ]));
        let mirror = collection(json!([{ "transportUrl": "u1", "manifest": { "name": "X" } }]));
        let report = compare(&"bob".into(), &master, &"alice".into(), &mirror);

        assert!(!report.in_sync());
        assert!(report.unified_diff.contains("--- a/bob"));
        assert!(report.unified_diff.contains("+++ b/alice"));
        assert!(report.unified_diff.contains("-    \"transportUrl\": \"u2\""));
    }
}
