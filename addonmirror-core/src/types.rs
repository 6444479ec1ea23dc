//! Domain types for profiles and their addon collections.
//!
//! Manifests are schema-free JSON documents on the remote side, so
//! [`Manifest`] wraps a raw [`serde_json::Map`] and exposes typed accessors
//! for the handful of keys this crate reads or edits. Every other key
//! round-trips untouched.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Manifest key holding the locally cached full catalog list.
///
/// Never sent to the remote service.
pub const MASTER_CATALOG_CACHE_KEY: &str = "_master_catalog_list";

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// A strongly-typed profile name (the store key).
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProfileName(pub String);

impl ProfileName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProfileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for ProfileName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ProfileName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Profiles
// ---------------------------------------------------------------------------

/// A managed identity on the remote addon service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    /// Store key; filled in by the store after deserialization.
    #[serde(skip)]
    pub name: ProfileName,
    /// Private storage area for this profile (login session data).
    pub path: PathBuf,
    /// Secret token authorizing collection fetch/push.
    #[serde(rename = "authKey", default)]
    pub credential: Option<String>,
    /// Name of the master profile this one mirrors.
    #[serde(rename = "mirrors", default)]
    pub mirror_of: Option<ProfileName>,
}

impl Profile {
    pub fn new(name: ProfileName, path: PathBuf) -> Self {
        Self {
            name,
            path,
            credential: None,
            mirror_of: None,
        }
    }

    /// The credential, if present and non-empty.
    pub fn credential(&self) -> Option<&str> {
        self.credential.as_deref().filter(|c| !c.is_empty())
    }
}

// ---------------------------------------------------------------------------
// Catalogs
// ---------------------------------------------------------------------------

/// A content list exposed by an addon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: String,
    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CatalogEntry {
    pub fn new(id: impl Into<String>, kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            name: Some(name.into()),
            extra: Map::new(),
        }
    }

    /// Display name, falling back to the id.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

fn parse_catalogs(value: Option<&Value>) -> Vec<CatalogEntry> {
    let Some(Value::Array(items)) = value else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| match serde_json::from_value::<CatalogEntry>(item.clone()) {
            Ok(catalog) => Some(catalog),
            Err(err) => {
                tracing::warn!("skipping malformed catalog entry: {err}");
                None
            }
        })
        .collect()
}

fn catalog_values(catalogs: &[CatalogEntry]) -> Vec<Value> {
    catalogs
        .iter()
        .map(|c| serde_json::to_value(c).unwrap_or(Value::Null))
        .collect()
}

// ---------------------------------------------------------------------------
// Manifest
// ---------------------------------------------------------------------------

/// An addon manifest: an opaque JSON object with typed accessors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Manifest(pub Map<String, Value>);

impl Manifest {
    fn str_field(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn id(&self) -> Option<&str> {
        self.str_field("id")
    }

    pub fn name(&self) -> Option<&str> {
        self.str_field("name")
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.0.insert("name".to_owned(), Value::String(name.into()));
    }

    pub fn version(&self) -> Option<&str> {
        self.str_field("version")
    }

    pub fn behavior_hints(&self) -> Option<&Value> {
        self.0.get("behaviorHints")
    }

    /// Enabled catalogs, in manifest order.
    pub fn catalogs(&self) -> Vec<CatalogEntry> {
        parse_catalogs(self.0.get("catalogs"))
    }

    /// Replace the enabled catalogs.
    ///
    /// Entries that [`catalogs`](Self::catalogs) cannot read (no string `id`)
    /// are not editable; they are kept at their previous positions.
    pub fn set_catalogs(&mut self, catalogs: &[CatalogEntry]) {
        let mut items = catalog_values(catalogs);
        if let Some(Value::Array(previous)) = self.0.get("catalogs") {
            for (index, raw) in previous.iter().enumerate() {
                if serde_json::from_value::<CatalogEntry>(raw.clone()).is_err() {
                    items.insert(index.min(items.len()), raw.clone());
                }
            }
        }
        self.0.insert("catalogs".to_owned(), Value::Array(items));
    }

    /// The master catalog cache, if it has been seeded.
    pub fn master_catalogs(&self) -> Option<Vec<CatalogEntry>> {
        self.0
            .get(MASTER_CATALOG_CACHE_KEY)
            .map(|v| parse_catalogs(Some(v)))
    }

    pub fn set_master_catalogs(&mut self, catalogs: &[CatalogEntry]) {
        self.0
            .insert(MASTER_CATALOG_CACHE_KEY.to_owned(), Value::Array(catalog_values(catalogs)));
    }

    pub fn has_master_catalogs(&self) -> bool {
        self.0.contains_key(MASTER_CATALOG_CACHE_KEY)
    }

    /// Remove the master catalog cache. Returns whether it was present.
    pub fn strip_master_catalogs(&mut self) -> bool {
        self.0.remove(MASTER_CATALOG_CACHE_KEY).is_some()
    }
}

impl TryFrom<Value> for Manifest {
    type Error = Value;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(other),
        }
    }
}

// ---------------------------------------------------------------------------
// Addon entries and collections
// ---------------------------------------------------------------------------

const TRANSPORT_URL_KEY: &str = "transportUrl";
const MANIFEST_KEY: &str = "manifest";

/// One installed addon in a profile's collection.
///
/// Serializes back to exactly the keys it was read from: a `transportUrl`
/// that is not a string, or a `manifest` that is not an object, stays in
/// [`extra`](Self::extra) untouched, and a missing manifest is not invented.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Map<String, Value>", into = "Map<String, Value>")]
pub struct AddonEntry {
    /// The addon's identity within a collection.
    pub transport_url: Option<String>,
    pub manifest: Manifest,
    /// Remaining keys (`transportName`, `flags`, ...), carried as-is.
    pub extra: Map<String, Value>,
    manifest_absent: bool,
}

impl From<Map<String, Value>> for AddonEntry {
    fn from(mut raw: Map<String, Value>) -> Self {
        let transport_url = match raw.remove(TRANSPORT_URL_KEY) {
            Some(Value::String(url)) => Some(url),
            Some(other) => {
                raw.insert(TRANSPORT_URL_KEY.to_owned(), other);
                None
            }
            None => None,
        };
        let (manifest, manifest_absent) = match raw.remove(MANIFEST_KEY) {
            Some(Value::Object(map)) => (Manifest(map), false),
            Some(other) => {
                raw.insert(MANIFEST_KEY.to_owned(), other);
                (Manifest::default(), true)
            }
            None => (Manifest::default(), true),
        };
        Self {
            transport_url,
            manifest,
            extra: raw,
            manifest_absent,
        }
    }
}

impl From<AddonEntry> for Map<String, Value> {
    fn from(entry: AddonEntry) -> Self {
        let mut raw = entry.extra;
        if let Some(url) = entry.transport_url {
            raw.insert(TRANSPORT_URL_KEY.to_owned(), Value::String(url));
        }
        // An untouched missing manifest stays missing; any edit makes it real.
        if !(entry.manifest_absent && entry.manifest.0.is_empty()) {
            raw.insert(MANIFEST_KEY.to_owned(), Value::Object(entry.manifest.0));
        }
        raw
    }
}

impl AddonEntry {
    pub fn new(transport_url: impl Into<String>, manifest: Manifest) -> Self {
        Self {
            transport_url: Some(transport_url.into()),
            manifest,
            extra: Map::new(),
            manifest_absent: false,
        }
    }

    pub fn transport_url(&self) -> Option<&str> {
        self.transport_url.as_deref().filter(|u| !u.is_empty())
    }

    /// Manifest name, falling back to the transport URL.
    pub fn display_name(&self) -> &str {
        self.manifest
            .name()
            .or(self.transport_url())
            .unwrap_or("<unnamed addon>")
    }
}

/// The ordered addon list of one profile. Order is significant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AddonCollection(pub Vec<AddonEntry>);

impl AddonCollection {
    pub fn new(entries: Vec<AddonEntry>) -> Self {
        Self(entries)
    }

    pub fn entries(&self) -> &[AddonEntry] {
        &self.0
    }

    pub fn entries_mut(&mut self) -> &mut Vec<AddonEntry> {
        &mut self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains_transport_url(&self, url: &str) -> bool {
        self.0.iter().any(|e| e.transport_url() == Some(url))
    }

    /// Deep copy with the master catalog cache removed from every manifest.
    pub fn without_catalog_cache(&self) -> Self {
        let mut copy = self.clone();
        for entry in &mut copy.0 {
            entry.manifest.strip_master_catalogs();
        }
        copy
    }

    /// Whether any manifest still carries the master catalog cache.
    pub fn has_catalog_cache(&self) -> bool {
        self.0.iter().any(|e| e.manifest.has_master_catalogs())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cinemeta() -> AddonEntry {
        serde_json::from_value(json!({
            "transportUrl": "https://v3-cinemeta.example/manifest.json",
            "transportName": "http",
            "flags": { "official": true, "protected": true },
            "manifest": {
                "id": "com.example.cinemeta",
                "name": "Cinemeta",
                "version": "3.0.13",
                "catalogs": [
                    { "id": "top", "type": "movie", "name": "Popular", "extra": [{ "name": "genre" }] },
                    { "id": "year", "type": "series", "name": "New" }
                ],
                "resources": ["catalog", "meta"]
            }
        }))
        .expect("entry")
    }

    #[test]
    fn newtype_display() {
        assert_eq!(ProfileName::from("alice").to_string(), "alice");
    }

    #[test]
    fn unknown_fields_round_trip() {
        let entry = cinemeta();
        let value = serde_json::to_value(&entry).expect("serialize");
        assert_eq!(value["transportName"], "http");
        assert_eq!(value["flags"]["official"], true);
        assert_eq!(value["manifest"]["resources"], json!(["catalog", "meta"]));
        assert_eq!(
            value["manifest"]["catalogs"][0]["extra"],
            json!([{ "name": "genre" }])
        );
    }

    #[test]
    fn odd_entry_shapes_serialize_unchanged() {
        for raw in [
            json!({ "transportUrl": "https://a.example/manifest.json", "flags": {} }),
            json!({ "transportUrl": null, "manifest": { "name": "Local" } }),
            json!({ "transportUrl": 7, "manifest": "not an object" }),
            json!({}),
        ] {
            let entry: AddonEntry = serde_json::from_value(raw.clone()).expect("parse");
            assert_eq!(serde_json::to_value(&entry).expect("serialize"), raw);
        }
    }

    #[test]
    fn editing_a_missing_manifest_writes_it() {
        let mut entry: AddonEntry =
            serde_json::from_value(json!({ "transportUrl": "https://a.example/manifest.json" }))
                .unwrap();
        assert_eq!(entry.transport_url(), Some("https://a.example/manifest.json"));
        entry.manifest.set_name("Renamed");
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["manifest"], json!({ "name": "Renamed" }));
    }

    #[test]
    fn manifest_accessors() {
        let entry = cinemeta();
        assert_eq!(entry.manifest.name(), Some("Cinemeta"));
        assert_eq!(entry.manifest.version(), Some("3.0.13"));
        let ids: Vec<_> = entry.manifest.catalogs().into_iter().map(|c| c.id).collect();
        assert_eq!(ids, vec!["top", "year"]);
        assert!(entry.manifest.master_catalogs().is_none());
    }

    #[test]
    fn catalog_round_trip_keeps_extra_keys() {
        let mut entry = cinemeta();
        let catalogs = entry.manifest.catalogs();
        entry.manifest.set_catalogs(&catalogs);
        assert_eq!(entry, cinemeta());
    }

    #[test]
    fn unreadable_catalogs_keep_their_slot() {
        let mut manifest = Manifest::try_from(json!({
            "catalogs": [
                { "type": "movie", "name": "No id" },
                { "id": "a", "type": "movie" },
                { "id": 3 },
                { "id": "b", "type": "movie" }
            ]
        }))
        .unwrap();
        let mut catalogs = manifest.catalogs();
        assert_eq!(catalogs.len(), 2);
        catalogs.reverse();
        manifest.set_catalogs(&catalogs);

        assert_eq!(
            manifest.0["catalogs"],
            json!([
                { "type": "movie", "name": "No id" },
                { "id": "b", "type": "movie" },
                { "id": 3 },
                { "id": "a", "type": "movie" }
            ])
        );
    }

    #[test]
    fn without_catalog_cache_leaves_original_untouched() {
        let mut entry = cinemeta();
        let cats = entry.manifest.catalogs();
        entry.manifest.set_master_catalogs(&cats);
        let collection = AddonCollection::new(vec![entry]);

        let stripped = collection.without_catalog_cache();
        assert!(!stripped.has_catalog_cache());
        assert!(collection.has_catalog_cache());
    }

    #[test]
    fn profile_record_uses_legacy_key_names() {
        let mut profile = Profile::new(ProfileName::from("alice"), PathBuf::from("/data/alice"));
        profile.credential = Some("secret".to_owned());
        profile.mirror_of = Some(ProfileName::from("bob"));
        let value = serde_json::to_value(&profile).expect("serialize");
        assert_eq!(
            value,
            json!({ "path": "/data/alice", "authKey": "secret", "mirrors": "bob" })
        );
    }

    #[test]
    fn empty_credential_counts_as_absent() {
        let mut profile = Profile::new(ProfileName::from("a"), PathBuf::from("/a"));
        profile.credential = Some(String::new());
        assert!(profile.credential().is_none());
    }

    #[test]
    fn display_name_falls_back_to_transport_url() {
        let entry = AddonEntry::new("https://x.example/manifest.json", Manifest::default());
        assert_eq!(entry.display_name(), "https://x.example/manifest.json");
    }
}
