//! `addonmirror backup ...`: snapshot files of a profile's collection.

use anyhow::{Context, Result};
use clap::Subcommand;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use addonmirror_core::SnapshotInfo;

use super::App;

#[derive(Subcommand, Debug)]
pub enum BackupCommand {
    /// Fetch the current collection and save it as a snapshot.
    Create {
        profile: String,
        /// Free-text label appended to the file name.
        #[arg(long)]
        label: Option<String>,
    },

    /// List a profile's snapshots, most recent first.
    List {
        profile: String,
        #[arg(long)]
        json: bool,
    },

    /// Push a snapshot back as the profile's collection.
    Restore { profile: String, snapshot: String },

    /// Replace a snapshot's label.
    Rename {
        profile: String,
        snapshot: String,
        label: String,
    },

    /// Delete a snapshot file.
    Delete { profile: String, snapshot: String },
}

pub fn run(app: &App, cmd: BackupCommand) -> Result<()> {
    match cmd {
        BackupCommand::Create { profile, label } => create(app, &profile, label),
        BackupCommand::List { profile, json } => list(app, &profile, json),
        BackupCommand::Restore { profile, snapshot } => restore(app, &profile, &snapshot),
        BackupCommand::Rename {
            profile,
            snapshot,
            label,
        } => rename(app, &profile, &snapshot, &label),
        BackupCommand::Delete { profile, snapshot } => delete(app, &profile, &snapshot),
    }
}

fn create(app: &App, profile: &str, label: Option<String>) -> Result<()> {
    let name = app.profile_name(profile)?;
    let session = app.session()?;
    let target = name.clone();
    let info = session
        .run("creating backup", move |engine| {
            engine.create_backup(&target, label.as_deref())
        })
        .with_context(|| format!("failed to back up '{name}'"))?;
    println!("✓ Backup saved: {}", info.file_name);
    Ok(())
}

#[derive(Serialize)]
struct SnapshotJson {
    file_name: String,
    display_name: String,
    taken_at: Option<String>,
    label: Option<String>,
}

#[derive(Tabled)]
struct SnapshotRow {
    #[tabled(rename = "taken")]
    display_name: String,
    #[tabled(rename = "file")]
    file_name: String,
}

fn list(app: &App, profile: &str, json: bool) -> Result<()> {
    let name = app.profile_name(profile)?;
    let snapshots = app
        .backups()
        .list(&name)
        .with_context(|| format!("failed to list backups for '{name}'"))?;

    if json {
        let payload: Vec<SnapshotJson> = snapshots
            .iter()
            .map(|s| SnapshotJson {
                file_name: s.file_name.clone(),
                display_name: s.display_name(),
                taken_at: s.taken_at.map(|t| t.format("%Y-%m-%dT%H:%M:%S").to_string()),
                label: s.label.clone(),
            })
            .collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&payload).context("failed to serialize backups")?
        );
        return Ok(());
    }

    if snapshots.is_empty() {
        println!("No backups for '{name}'.");
        return Ok(());
    }
    let rows: Vec<SnapshotRow> = snapshots
        .iter()
        .map(|s| SnapshotRow {
            display_name: s.display_name(),
            file_name: s.file_name.clone(),
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
    Ok(())
}

fn find(app: &App, profile: &str, snapshot: &str) -> Result<SnapshotInfo> {
    let name = app.profile_name(profile)?;
    app.backups()
        .find(&name, snapshot)
        .with_context(|| format!("no backup '{snapshot}' for '{name}'"))
}

fn restore(app: &App, profile: &str, snapshot: &str) -> Result<()> {
    let info = find(app, profile, snapshot)?;
    let name = info.profile.clone();
    let session = app.session()?;
    let target = name.clone();
    let chosen = info.clone();
    let collection = session
        .run("restoring backup", move |engine| {
            engine.restore_backup(&target, &chosen)
        })
        .with_context(|| format!("failed to restore {} to '{name}'", info.file_name))?;
    println!(
        "✓ Restored {} ({} addons) to '{name}'",
        info.display_name(),
        collection.len()
    );
    Ok(())
}

fn rename(app: &App, profile: &str, snapshot: &str, label: &str) -> Result<()> {
    let info = find(app, profile, snapshot)?;
    let renamed = app
        .backups()
        .rename(&info, label)
        .with_context(|| format!("failed to rename {}", info.file_name))?;
    println!("✓ Renamed to {}", renamed.file_name);
    Ok(())
}

fn delete(app: &App, profile: &str, snapshot: &str) -> Result<()> {
    let info = find(app, profile, snapshot)?;
    app.backups()
        .delete(&info)
        .with_context(|| format!("failed to delete {}", info.file_name))?;
    println!("✓ Deleted {}", info.file_name);
    Ok(())
}
