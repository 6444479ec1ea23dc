//! Boundary to the remote addon service.
//!
//! [`AddonRemote`] has three wire-level methods that implementations
//! provide, and two profile-level methods built on top of them. The
//! profile-level methods own the credential check and the removal of the
//! master catalog cache, so every implementation gets both for free.

use std::time::Duration;

use serde_json::{json, Value};

use addonmirror_core::{AddonCollection, Config, Manifest, Profile};

use crate::error::RemoteError;

pub const GET_COLLECTION_ENDPOINT: &str = "addonCollectionGet";
pub const SET_COLLECTION_ENDPOINT: &str = "addonCollectionSet";

pub trait AddonRemote: Send + Sync {
    /// Anonymous fetch of an addon's manifest from its transport URL.
    fn fetch_manifest(&self, transport_url: &str) -> Result<Manifest, RemoteError>;

    /// Fetch the collection owned by `auth_key`.
    fn get_collection(&self, auth_key: &str) -> Result<AddonCollection, RemoteError>;

    /// Replace the collection owned by `auth_key` with `addons`, as given.
    fn set_collection(&self, auth_key: &str, addons: &AddonCollection) -> Result<(), RemoteError>;

    /// Fetch `profile`'s collection. Fails without a call when it has no credential.
    fn fetch_collection(&self, profile: &Profile) -> Result<AddonCollection, RemoteError> {
        let auth_key = credential_of(profile)?;
        self.get_collection(auth_key)
    }

    /// Push `collection` as `profile`'s full collection.
    ///
    /// The master catalog cache is stripped from a copy before sending;
    /// `collection` itself is left as it was.
    fn push_collection(
        &self,
        profile: &Profile,
        collection: &AddonCollection,
    ) -> Result<(), RemoteError> {
        let auth_key = credential_of(profile)?;
        let outgoing = collection.without_catalog_cache();
        self.set_collection(auth_key, &outgoing)
    }
}

fn credential_of(profile: &Profile) -> Result<&str, RemoteError> {
    profile
        .credential()
        .ok_or_else(|| RemoteError::NoCredential(profile.name.clone()))
}

// ---------------------------------------------------------------------------
// HTTP implementation
// ---------------------------------------------------------------------------

/// [`AddonRemote`] over HTTPS, one `ureq` agent with a fixed timeout.
pub struct HttpRemote {
    agent: ureq::Agent,
    api_base: String,
}

impl HttpRemote {
    pub fn new(api_base: impl Into<String>, timeout: Duration) -> Self {
        let mut api_base = api_base.into();
        if !api_base.ends_with('/') {
            api_base.push('/');
        }
        Self {
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
            api_base,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.api_base_url.clone(), config.timeout())
    }

    fn endpoint(&self, name: &str) -> String {
        format!("{}{name}", self.api_base)
    }

    fn post(&self, endpoint: &str, body: Value) -> Result<String, RemoteError> {
        let url = self.endpoint(endpoint);
        tracing::debug!("POST {url}");
        let response = self.agent.post(&url).send_json(body).map_err(network_error)?;
        response
            .into_string()
            .map_err(|e| RemoteError::Network(e.to_string()))
    }
}

impl AddonRemote for HttpRemote {
    fn fetch_manifest(&self, transport_url: &str) -> Result<Manifest, RemoteError> {
        if transport_url.is_empty() {
            return Err(RemoteError::NoUrl);
        }
        tracing::debug!("GET {transport_url}");
        let body = self
            .agent
            .get(transport_url)
            .call()
            .map_err(network_error)?
            .into_string()
            .map_err(|e| RemoteError::Network(e.to_string()))?;
        parse_manifest_response(&body).map_err(|err| {
            tracing::error!("manifest fetch failed for {transport_url}: {err}");
            err
        })
    }

    fn get_collection(&self, auth_key: &str) -> Result<AddonCollection, RemoteError> {
        let body = self.post(GET_COLLECTION_ENDPOINT, json!({ "authKey": auth_key }))?;
        parse_collection_response(&body)
    }

    fn set_collection(&self, auth_key: &str, addons: &AddonCollection) -> Result<(), RemoteError> {
        let body = self.post(SET_COLLECTION_ENDPOINT, push_payload(auth_key, addons)?)?;
        parse_push_response(&body)
    }
}

fn network_error(err: ureq::Error) -> RemoteError {
    match err {
        ureq::Error::Status(code, response) => {
            RemoteError::Network(format!("HTTP {code} from {}", response.get_url()))
        }
        ureq::Error::Transport(transport) => RemoteError::Network(transport.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Wire format
// ---------------------------------------------------------------------------

/// Body of an `addonCollectionSet` request.
pub fn push_payload(auth_key: &str, addons: &AddonCollection) -> Result<Value, RemoteError> {
    let addons =
        serde_json::to_value(addons).map_err(|e| RemoteError::BadResponse(e.to_string()))?;
    Ok(json!({ "authKey": auth_key, "addons": addons }))
}

pub fn parse_manifest_response(body: &str) -> Result<Manifest, RemoteError> {
    let value: Value =
        serde_json::from_str(body).map_err(|e| RemoteError::BadResponse(e.to_string()))?;
    Manifest::try_from(value)
        .map_err(|_| RemoteError::BadResponse("manifest is not a JSON object".to_owned()))
}

/// Extract `result.addons` from an `addonCollectionGet` response.
pub fn parse_collection_response(body: &str) -> Result<AddonCollection, RemoteError> {
    let mut value: Value =
        serde_json::from_str(body).map_err(|e| RemoteError::BadResponse(e.to_string()))?;
    let addons = value
        .get_mut("result")
        .and_then(|r| r.get_mut("addons"))
        .map(Value::take)
        .ok_or_else(|| RemoteError::BadResponse("response did not contain addons".to_owned()))?;
    serde_json::from_value(addons).map_err(|e| RemoteError::BadResponse(e.to_string()))
}

/// An `addonCollectionSet` response succeeds iff `result.success` is true.
///
/// Anything else is a rejection carrying the raw response text.
pub fn parse_push_response(body: &str) -> Result<(), RemoteError> {
    let success = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.pointer("/result/success").and_then(Value::as_bool))
        .unwrap_or(false);
    if success {
        Ok(())
    } else {
        Err(RemoteError::Rejected(body.trim().to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use addonmirror_core::{AddonEntry, CatalogEntry, ProfileName, MASTER_CATALOG_CACHE_KEY};

    #[test]
    fn collection_response_extracts_addons() {
        let body = r#"{"result":{"addons":[{"transportUrl":"https://a/manifest.json","manifest":{"name":"A"}}],"lastModified":1}}"#;
        let collection = parse_collection_response(body).expect("parse");
        assert_eq!(collection.len(), 1);
        assert_eq!(collection.entries()[0].display_name(), "A");
    }

    #[test]
    fn collection_response_without_addons_is_bad_response() {
        let err = parse_collection_response(r#"{"error":{"message":"Session does not exist"}}"#)
            .unwrap_err();
        assert!(matches!(err, RemoteError::BadResponse(_)));

        let err = parse_collection_response("<html>").unwrap_err();
        assert!(matches!(err, RemoteError::BadResponse(_)));
    }

    #[test]
    fn push_response_success_flag() {
        assert!(parse_push_response(r#"{"result":{"success":true}}"#).is_ok());

        let err = parse_push_response(r#"{"result":{"success":false},"error":"quota"}"#)
            .unwrap_err();
        match err {
            RemoteError::Rejected(detail) => assert!(detail.contains("quota")),
            other => panic!("expected Rejected, got {other:?}"),
        }
        assert!(matches!(parse_push_response(""), Err(RemoteError::Rejected(_))));
    }

    #[test]
    fn manifest_response_must_be_object() {
        let manifest = parse_manifest_response(r#"{"id":"org.a","catalogs":[]}"#).unwrap();
        assert_eq!(manifest.id(), Some("org.a"));
        assert!(matches!(
            parse_manifest_response("[1,2]"),
            Err(RemoteError::BadResponse(_))
        ));
    }

    #[test]
    fn endpoint_joins_base() {
        let remote = HttpRemote::new("https://api.example/api", Duration::from_secs(1));
        assert_eq!(
            remote.endpoint(GET_COLLECTION_ENDPOINT),
            "https://api.example/api/addonCollectionGet"
        );
    }

    /// Records what would go over the wire.
    #[derive(Default)]
    struct Recorder {
        sent: Mutex<Vec<Value>>,
    }

    impl AddonRemote for Recorder {
        fn fetch_manifest(&self, _: &str) -> Result<Manifest, RemoteError> {
            Err(RemoteError::NoUrl)
        }

        fn get_collection(&self, _: &str) -> Result<AddonCollection, RemoteError> {
            Ok(AddonCollection::default())
        }

        fn set_collection(&self, auth_key: &str, addons: &AddonCollection) -> Result<(), RemoteError> {
            self.sent.lock().unwrap().push(push_payload(auth_key, addons)?);
            Ok(())
        }
    }

    fn profile(credential: Option<&str>) -> Profile {
        let mut profile = Profile::new(ProfileName::from("alice"), "/tmp/alice".into());
        profile.credential = credential.map(str::to_owned);
        profile
    }

    #[test]
    fn push_strips_catalog_cache_from_payload_only() {
        let mut manifest = Manifest::default();
        manifest.set_master_catalogs(&[CatalogEntry::new("top", "movie", "Top")]);
        let collection = AddonCollection::new(vec![AddonEntry::new("https://a/manifest.json", manifest)]);

        let recorder = Recorder::default();
        recorder
            .push_collection(&profile(Some("key")), &collection)
            .expect("push");

        let sent = recorder.sent.lock().unwrap();
        assert_eq!(sent[0]["authKey"], "key");
        assert!(sent[0]["addons"][0]["manifest"].get(MASTER_CATALOG_CACHE_KEY).is_none());
        assert!(collection.has_catalog_cache(), "working copy keeps its cache");
    }

    #[test]
    fn missing_credential_fails_without_a_call() {
        let recorder = Recorder::default();
        let err = recorder
            .push_collection(&profile(Some("")), &AddonCollection::default())
            .unwrap_err();
        assert_eq!(err, RemoteError::NoCredential(ProfileName::from("alice")));
        assert!(recorder.sent.lock().unwrap().is_empty());

        assert!(matches!(
            recorder.fetch_collection(&profile(None)),
            Err(RemoteError::NoCredential(_))
        ));
    }
}
