use std::path::Path;
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use tempfile::TempDir;

fn addonmirror(home: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_addonmirror"));
    cmd.env("HOME", home)
        .env("USERPROFILE", home)
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG");
    cmd
}

fn store_json(home: &Path) -> serde_json::Value {
    let raw = std::fs::read_to_string(home.join(".addonmirror").join("profiles.json"))
        .expect("profiles.json");
    serde_json::from_str(&raw).expect("valid json")
}

#[test]
fn empty_store_suggests_adding_a_profile() {
    let home = TempDir::new().unwrap();
    addonmirror(home.path())
        .args(["profile", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No profiles yet."))
        .stdout(predicate::str::contains("addonmirror profile add <name>"));
}

#[test]
fn add_login_list_delete() {
    let home = TempDir::new().unwrap();

    addonmirror(home.path())
        .args(["profile", "add", "alice"])
        .assert()
        .success()
        .stdout(predicate::str::contains("✓ Added profile 'alice'"));
    addonmirror(home.path())
        .args(["profile", "add", "bob"])
        .assert()
        .success();

    addonmirror(home.path())
        .args(["profile", "login", "alice", "  secret-token  "])
        .assert()
        .success()
        .stdout(predicate::str::contains("✓ Credential saved for 'alice'"));
    addonmirror(home.path())
        .args(["profile", "login", "alice", "secret-token"])
        .assert()
        .success()
        .stdout(predicate::str::contains("is unchanged"));

    let store = store_json(home.path());
    assert_eq!(store["alice"]["authKey"], "secret-token");
    assert!(store["bob"]["authKey"].is_null());

    let output = addonmirror(home.path())
        .args(["profile", "list", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let listed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let names: Vec<&str> = listed
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["alice", "bob"]);
    assert_eq!(listed[0]["logged_in"], true);
    assert_eq!(listed[1]["logged_in"], false);

    addonmirror(home.path())
        .args(["profile", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("alice"))
        .stdout(predicate::str::contains("yes"));

    addonmirror(home.path())
        .args(["profile", "delete", "bob"])
        .assert()
        .success()
        .stdout(predicate::str::contains("✓ Deleted profile 'bob'"));
    let store = store_json(home.path());
    assert!(store.get("bob").is_none());
    assert!(store.get("alice").is_some());
}

#[test]
fn duplicate_profile_is_rejected() {
    let home = TempDir::new().unwrap();
    addonmirror(home.path())
        .args(["profile", "add", "alice"])
        .assert()
        .success();
    addonmirror(home.path())
        .args(["profile", "add", "alice"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to add profile 'alice'"));
}

#[test]
fn profile_name_must_be_one_path_component() {
    let home = TempDir::new().unwrap();
    addonmirror(home.path())
        .args(["profile", "add", "tv/den"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot contain path separators"));
    addonmirror(home.path())
        .args(["profile", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No profiles yet."));
}

#[test]
fn login_requires_known_profile() {
    let home = TempDir::new().unwrap();
    addonmirror(home.path())
        .args(["profile", "login", "ghost", "token"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("addonmirror profile add ghost"));
}

#[test]
fn config_show_uses_defaults() {
    let home = TempDir::new().unwrap();
    addonmirror(home.path())
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("https://api.strem.io/api/"))
        .stdout(predicate::str::contains(".addonmirror"))
        .stdout(predicate::str::contains("10s"));
}

#[test]
fn data_dir_moves_new_profiles() {
    let home = TempDir::new().unwrap();
    let elsewhere = TempDir::new().unwrap();
    let data = elsewhere.path().join("mirror-data");

    addonmirror(home.path())
        .args(["config", "data-dir"])
        .arg(&data)
        .assert()
        .success()
        .stdout(predicate::str::contains("✓ Data directory set to"));

    addonmirror(home.path())
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("mirror-data"));

    addonmirror(home.path())
        .args(["profile", "add", "alice"])
        .assert()
        .success();
    assert!(data.join("profiles.json").is_file());
    assert!(!home.path().join(".addonmirror").join("profiles.json").exists());
}
