//! In-memory remote and store fixtures shared by the integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use serde_json::{json, Value};
use tempfile::TempDir;

use addonmirror_core::{AddonCollection, DataLayout, Manifest, ProfileName, ProfileStore};
use addonmirror_sync::remote::push_payload;
use addonmirror_sync::{AddonRemote, RemoteError, SyncEngine};

/// Remote service double. Collections are keyed by credential.
#[derive(Default)]
pub struct FakeRemote {
    collections: Mutex<HashMap<String, AddonCollection>>,
    manifests: Mutex<HashMap<String, Manifest>>,
    failing_fetch: Mutex<HashSet<String>>,
    failing_push: Mutex<HashSet<String>>,
    /// Every accepted push, as the wire payload.
    pub pushes: Mutex<Vec<Value>>,
    pub fetches: Mutex<Vec<String>>,
}

impl FakeRemote {
    pub fn put(&self, profile: &str, collection: AddonCollection) {
        self.collections
            .lock()
            .unwrap()
            .insert(key(profile), collection);
    }

    pub fn collection(&self, profile: &str) -> AddonCollection {
        self.collections
            .lock()
            .unwrap()
            .get(&key(profile))
            .cloned()
            .unwrap_or_default()
    }

    pub fn put_manifest(&self, url: &str, manifest: Value) {
        self.manifests
            .lock()
            .unwrap()
            .insert(url.to_owned(), serde_json::from_value(manifest).unwrap());
    }

    pub fn fail_fetch(&self, profile: &str) {
        self.failing_fetch.lock().unwrap().insert(key(profile));
    }

    pub fn fail_push(&self, profile: &str) {
        self.failing_push.lock().unwrap().insert(key(profile));
    }

    pub fn push_count(&self) -> usize {
        self.pushes.lock().unwrap().len()
    }

    pub fn fetch_count(&self, profile: &str) -> usize {
        let key = key(profile);
        self.fetches.lock().unwrap().iter().filter(|k| **k == key).count()
    }
}

impl AddonRemote for FakeRemote {
    fn fetch_manifest(&self, transport_url: &str) -> Result<Manifest, RemoteError> {
        self.manifests
            .lock()
            .unwrap()
            .get(transport_url)
            .cloned()
            .ok_or_else(|| RemoteError::Network(format!("cannot reach {transport_url}")))
    }

    fn get_collection(&self, auth_key: &str) -> Result<AddonCollection, RemoteError> {
        self.fetches.lock().unwrap().push(auth_key.to_owned());
        if self.failing_fetch.lock().unwrap().contains(auth_key) {
            return Err(RemoteError::Network("connection reset".into()));
        }
        self.collections
            .lock()
            .unwrap()
            .get(auth_key)
            .cloned()
            .ok_or_else(|| RemoteError::BadResponse("Session does not exist".into()))
    }

    fn set_collection(&self, auth_key: &str, addons: &AddonCollection) -> Result<(), RemoteError> {
        if self.failing_push.lock().unwrap().contains(auth_key) {
            return Err(RemoteError::Rejected("{\"result\":{\"success\":false}}".into()));
        }
        self.pushes.lock().unwrap().push(push_payload(auth_key, addons)?);
        self.collections
            .lock()
            .unwrap()
            .insert(auth_key.to_owned(), addons.clone());
        Ok(())
    }
}

pub fn key(profile: &str) -> String {
    format!("key-{profile}")
}

pub struct Fixture {
    pub dir: TempDir,
    pub store: ProfileStore,
    pub remote: Arc<FakeRemote>,
    pub engine: SyncEngine,
}

/// A data root with the given profiles, each logged in.
pub fn fixture(profiles: &[&str]) -> Fixture {
    let dir = TempDir::new().unwrap();
    let store = ProfileStore::new(DataLayout::new(dir.path()));
    for name in profiles {
        store.add_profile(name).unwrap();
        store.set_credential(&name_of(name), &key(name)).unwrap();
    }
    let remote = Arc::new(FakeRemote::default());
    let engine = SyncEngine::new(store.clone(), remote.clone());
    Fixture {
        dir,
        store,
        remote,
        engine,
    }
}

pub fn name_of(name: &str) -> ProfileName {
    ProfileName::from(name)
}

pub fn addon(url: &str, name: &str) -> Value {
    json!({
        "transportUrl": url,
        "transportName": "http",
        "flags": { "official": false },
        "manifest": { "id": name.to_lowercase(), "name": name, "version": "1.0.0" }
    })
}

pub fn collection(entries: Vec<Value>) -> AddonCollection {
    serde_json::from_value(Value::Array(entries)).unwrap()
}

pub fn addon_x() -> Value {
    addon("https://x.example/manifest.json", "AddonX")
}

pub fn addon_y() -> Value {
    addon("https://y.example/manifest.json", "AddonY")
}
