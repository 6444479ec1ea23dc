//! `addonmirror profile ...`: manage the profile store.

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use addonmirror_core::ProfileName;

use super::App;

#[derive(Subcommand, Debug)]
pub enum ProfileCommand {
    /// Register a new profile.
    Add { name: String },

    /// List profiles with their login and mirror state.
    List {
        /// Emit machine-readable JSON.
        #[arg(long)]
        json: bool,
    },

    /// Delete a profile and its private storage.
    Delete { name: String },

    /// Store the credential obtained from the service's web login.
    Login { name: String, token: String },

    /// Make a profile mirror another, or stop mirroring.
    Mirror(MirrorArgs),
}

#[derive(Args, Debug)]
pub struct MirrorArgs {
    /// The profile that will follow the master.
    pub name: String,

    /// Master profile to copy from. Its collection is pushed immediately.
    #[arg(long, conflicts_with = "off")]
    pub master: Option<String>,

    /// Stop mirroring.
    #[arg(long)]
    pub off: bool,
}

pub fn run(app: &App, cmd: ProfileCommand) -> Result<()> {
    match cmd {
        ProfileCommand::Add { name } => add(app, &name),
        ProfileCommand::List { json } => list(app, json),
        ProfileCommand::Delete { name } => delete(app, &name),
        ProfileCommand::Login { name, token } => login(app, &name, &token),
        ProfileCommand::Mirror(args) => mirror(app, args),
    }
}

fn add(app: &App, name: &str) -> Result<()> {
    let profile = app
        .store
        .add_profile(name)
        .with_context(|| format!("failed to add profile '{name}'"))?;
    println!("✓ Added profile '{}'", profile.name);
    println!("  storage: {}", profile.path.display());
    println!("  next: addonmirror profile login {} <token>", profile.name);
    Ok(())
}

#[derive(Serialize)]
struct ProfileJson {
    name: String,
    logged_in: bool,
    mirrors: Option<String>,
    path: String,
}

#[derive(Tabled)]
struct ProfileRow {
    #[tabled(rename = "profile")]
    name: String,
    #[tabled(rename = "logged in")]
    logged_in: String,
    #[tabled(rename = "mirrors")]
    mirrors: String,
}

fn list(app: &App, json: bool) -> Result<()> {
    let profiles = app.store.load();

    if json {
        let payload: Vec<ProfileJson> = profiles
            .values()
            .map(|p| ProfileJson {
                name: p.name.to_string(),
                logged_in: p.credential().is_some(),
                mirrors: p.mirror_of.as_ref().map(ToString::to_string),
                path: p.path.display().to_string(),
            })
            .collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&payload).context("failed to serialize profiles")?
        );
        return Ok(());
    }

    if profiles.is_empty() {
        println!("No profiles yet.");
        println!("Run: addonmirror profile add <name>");
        return Ok(());
    }

    let rows: Vec<ProfileRow> = profiles
        .values()
        .map(|p| ProfileRow {
            name: p.name.to_string(),
            logged_in: if p.credential().is_some() { "yes" } else { "no" }.to_string(),
            mirrors: p
                .mirror_of
                .as_ref()
                .map_or_else(|| "-".to_string(), ToString::to_string),
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
    Ok(())
}

fn delete(app: &App, name: &str) -> Result<()> {
    let name = ProfileName::from(name);
    let dependents = addonmirror_core::store::mirrors_of(&app.store.load(), &name);
    app.store
        .delete_profile(&name)
        .with_context(|| format!("failed to delete profile '{name}'"))?;
    println!("✓ Deleted profile '{name}'");
    for mirror in dependents {
        println!("  '{mirror}' no longer mirrors anything");
    }
    Ok(())
}

fn login(app: &App, name: &str, token: &str) -> Result<()> {
    let name = app.profile_name(name)?;
    if token.trim().is_empty() {
        bail!("token cannot be empty");
    }
    let changed = app
        .store
        .set_credential(&name, token.trim())
        .with_context(|| format!("failed to store credential for '{name}'"))?;
    if changed {
        println!("✓ Credential saved for '{name}'");
    } else {
        println!("Credential for '{name}' is unchanged");
    }
    Ok(())
}

fn mirror(app: &App, args: MirrorArgs) -> Result<()> {
    let name = app.profile_name(&args.name)?;
    let master = match (args.master, args.off) {
        (Some(master), false) => Some(ProfileName::from(master)),
        (None, true) => None,
        _ => bail!("pass either --master <profile> or --off"),
    };

    let session = app.session()?;
    let target = name.clone();
    let chosen = master.clone();
    session
        .run("configuring mirror", move |engine| {
            engine.configure_mirror(&target, chosen.as_ref())
        })
        .with_context(|| format!("failed to configure mirroring for '{name}'"))?;

    match master {
        Some(master) => println!("✓ '{name}' now mirrors '{master}'"),
        None => println!("✓ Mirroring disabled for '{name}'"),
    }
    Ok(())
}
