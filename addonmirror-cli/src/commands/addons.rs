//! `addonmirror addons ...`: inspect and edit one profile's collection.
//!
//! Each edit fetches the collection, applies one change to the working
//! copy, and saves it (which also pushes to every mirror of the profile).

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use addonmirror_core::{AddonCollection, ProfileName};
use addonmirror_sync::editor::{
    self, clone_to_targets, find_addon, CatalogOrder, CatalogSelection, CloneOutcome, EditSession,
};
use addonmirror_sync::{EditError, Session, SyncEngine, SyncError};

use super::{print_cascade, App};

#[derive(Subcommand, Debug)]
pub enum AddonsCommand {
    /// List a profile's addons in order.
    List {
        profile: String,
        /// Print the raw collection as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Install an addon from its manifest URL.
    Install {
        #[command(flatten)]
        edit: EditOpts,
        url: String,
    },

    /// Remove an addon.
    Remove {
        #[command(flatten)]
        edit: EditOpts,
        /// Position (1-based), transport URL or name.
        addon: String,
    },

    /// Move an addon to another position.
    Move {
        #[command(flatten)]
        edit: EditOpts,
        addon: String,
        /// New 1-based position.
        #[arg(long)]
        to: usize,
    },

    /// Change an addon's display name.
    Rename {
        #[command(flatten)]
        edit: EditOpts,
        addon: String,
        new_name: String,
    },

    /// Show or change which catalogs an addon exposes.
    Catalogs(CatalogsArgs),

    /// Move one enabled catalog up (negative) or down (positive).
    MoveCatalog {
        #[command(flatten)]
        edit: EditOpts,
        addon: String,
        catalog: String,
        #[arg(long, allow_negative_numbers = true)]
        by: isize,
    },

    /// Replace an addon's manifest with the original from its URL.
    Reset {
        #[command(flatten)]
        edit: EditOpts,
        addon: String,
    },

    /// Copy an addon into other profiles' collections.
    Clone(CloneArgs),
}

#[derive(Args, Debug)]
pub struct EditOpts {
    /// Profile whose collection is edited.
    pub profile: String,

    /// Show what would change without saving.
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Args, Debug)]
pub struct CatalogsArgs {
    #[command(flatten)]
    pub edit: EditOpts,
    pub addon: String,
    #[arg(long, value_name = "CATALOG_ID")]
    pub enable: Vec<String>,
    #[arg(long, value_name = "CATALOG_ID")]
    pub disable: Vec<String>,
    #[arg(long, value_name = "CATALOG_ID")]
    pub toggle: Vec<String>,
}

#[derive(Args, Debug)]
pub struct CloneArgs {
    /// Source profile.
    pub profile: String,
    pub addon: String,
    /// Target profile; repeat for several.
    #[arg(long = "to", required_unless_present = "all")]
    pub targets: Vec<String>,
    /// Clone into every other profile.
    #[arg(long, conflicts_with = "targets")]
    pub all: bool,
}

pub fn run(app: &App, cmd: AddonsCommand) -> Result<()> {
    match cmd {
        AddonsCommand::List { profile, json } => list(app, &profile, json),
        AddonsCommand::Install { edit, url } => apply(app, &edit, "installing addon", move |s, e| {
            let index = editor::install_addon(s.collection_mut(), &url, e.remote())?;
            Ok(format!("installed {}", s.collection().entries()[index].display_name()))
        }),
        AddonsCommand::Remove { edit, addon } => apply(app, &edit, "removing addon", move |s, _| {
            let index = find_addon(s.collection(), &addon)?;
            let removed = editor::remove_addon(s.collection_mut(), index)?;
            Ok(format!("removed {}", removed.display_name()))
        }),
        AddonsCommand::Move { edit, addon, to } => apply(app, &edit, "moving addon", move |s, _| {
            let from = find_addon(s.collection(), &addon)?;
            let len = s.collection().len();
            let to = to
                .checked_sub(1)
                .filter(|i| *i < len)
                .ok_or(EditError::OutOfRange { position: to, len })?;
            editor::move_addon(s.collection_mut(), from, to)?;
            Ok(format!("moved to position {}", to + 1))
        }),
        AddonsCommand::Rename {
            edit,
            addon,
            new_name,
        } => apply(app, &edit, "renaming addon", move |s, _| {
            let index = find_addon(s.collection(), &addon)?;
            editor::rename(s.entry_mut(index)?, &new_name);
            Ok(format!("renamed to '{}'", new_name.trim()))
        }),
        AddonsCommand::Catalogs(args) => catalogs(app, args),
        AddonsCommand::MoveCatalog {
            edit,
            addon,
            catalog,
            by,
        } => apply(app, &edit, "reordering catalogs", move |s, _| {
            let index = find_addon(s.collection(), &addon)?;
            let entry = s.entry_mut(index)?;
            let mut order = CatalogOrder::begin(entry)?;
            let from = order.position_of(&catalog)?;
            let to = order.move_by(from, by)?;
            order.commit(entry);
            Ok(format!("catalog '{catalog}' moved to position {}", to + 1))
        }),
        AddonsCommand::Reset { edit, addon } => apply(app, &edit, "resetting addon", move |s, e| {
            let index = find_addon(s.collection(), &addon)?;
            editor::reset_to_default(s.entry_mut(index)?, e.remote())?;
            Ok("manifest reset to original".to_string())
        }),
        AddonsCommand::Clone(args) => clone(app, args),
    }
}

// ---------------------------------------------------------------------------
// List
// ---------------------------------------------------------------------------

#[derive(Tabled)]
struct AddonRow {
    #[tabled(rename = "#")]
    position: usize,
    #[tabled(rename = "name")]
    name: String,
    #[tabled(rename = "version")]
    version: String,
    #[tabled(rename = "catalogs")]
    catalogs: String,
    #[tabled(rename = "url")]
    url: String,
}

fn list(app: &App, profile: &str, json: bool) -> Result<()> {
    let name = app.profile_name(profile)?;
    let collection = fetch(app, &name)?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&collection).context("failed to serialize addons")?
        );
        return Ok(());
    }
    if collection.is_empty() {
        println!("'{name}' has no addons.");
        return Ok(());
    }

    let rows: Vec<AddonRow> = collection
        .entries()
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            let enabled = entry.manifest.catalogs().len();
            let catalogs = match entry.manifest.master_catalogs() {
                Some(all) => format!("{enabled}/{}", all.len()),
                None => enabled.to_string(),
            };
            AddonRow {
                position: i + 1,
                name: entry.display_name().to_string(),
                version: entry.manifest.version().unwrap_or("-").to_string(),
                catalogs,
                url: entry.transport_url().unwrap_or("-").to_string(),
            }
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
    Ok(())
}

fn fetch(app: &App, name: &ProfileName) -> Result<AddonCollection> {
    let session = app.session()?;
    let target = name.clone();
    session
        .run("fetching addons", move |engine| engine.fetch_collection(&target))
        .with_context(|| format!("failed to fetch addons for '{name}'"))
}

// ---------------------------------------------------------------------------
// Edits
// ---------------------------------------------------------------------------

/// Fetch, apply one edit on a worker, then save unless nothing changed.
fn apply<F>(app: &App, opts: &EditOpts, label: &str, edit: F) -> Result<()>
where
    F: FnOnce(&mut EditSession, &SyncEngine) -> Result<String, SyncError> + Send + 'static,
{
    let name = app.profile_name(&opts.profile)?;
    let session = app.session()?;

    let target = name.clone();
    let (working, summary) = session
        .run(label, move |engine| {
            let mut working = EditSession::new(target.clone(), engine.fetch_collection(&target)?);
            let summary = edit(&mut working, engine)?;
            Ok((working, summary))
        })
        .with_context(|| format!("{label} failed for '{name}'"))?;

    if !working.is_modified() {
        println!("Nothing changed for '{name}'.");
        return Ok(());
    }

    println!("{} {summary}", "•".cyan());
    for (i, entry) in working.collection().entries().iter().enumerate() {
        if working.entry_modified(i) {
            println!("  * #{} {}", i + 1, entry.display_name());
        }
    }
    if opts.dry_run {
        println!("{}", "dry run: nothing saved".yellow());
        return Ok(());
    }

    save(&session, &name, working.into_collection())
}

fn save(session: &Session, name: &ProfileName, collection: AddonCollection) -> Result<()> {
    let target = name.clone();
    let report = session
        .run("saving addons", move |engine| {
            engine.save_collection(&target, &collection)
        })
        .with_context(|| format!("failed to save addons for '{name}'"))?;
    println!("✓ Saved addons for '{name}'");
    print_cascade(&report);
    Ok(())
}

fn catalogs(app: &App, args: CatalogsArgs) -> Result<()> {
    let CatalogsArgs {
        edit,
        addon,
        enable,
        disable,
        toggle,
    } = args;

    if enable.is_empty() && disable.is_empty() && toggle.is_empty() {
        return show_catalogs(app, &edit.profile, addon);
    }

    apply(app, &edit, "updating catalogs", move |s, e| {
        let index = find_addon(s.collection(), &addon)?;
        let entry = s.entry_mut(index)?;
        let mut selection = CatalogSelection::begin(entry, e.remote())?;
        for id in &enable {
            selection.enable(id)?;
        }
        for id in &disable {
            selection.disable(id)?;
        }
        for id in &toggle {
            selection.toggle(id)?;
        }
        selection.commit(entry);
        let enabled = entry.manifest.catalogs().len();
        Ok(format!("{enabled} catalogs enabled on {}", entry.display_name()))
    })
}

fn show_catalogs(app: &App, profile: &str, addon: String) -> Result<()> {
    let name = app.profile_name(profile)?;
    let session = app.session()?;
    let target = name.clone();
    let (addon_name, lines) = session
        .run("loading catalogs", move |engine| {
            let collection = engine.fetch_collection(&target)?;
            let entry = &collection.entries()[find_addon(&collection, &addon)?];
            let selection = CatalogSelection::begin(entry, engine.remote())?;
            let lines: Vec<(bool, String)> = selection
                .available()
                .iter()
                .map(|c| {
                    let kind = if c.kind.is_empty() { "-" } else { c.kind.as_str() };
                    (
                        selection.is_enabled(&c.id),
                        format!("{} ({kind}) [{}]", c.display_name(), c.id),
                    )
                })
                .collect();
            Ok((entry.display_name().to_string(), lines))
        })
        .with_context(|| format!("failed to load catalogs for '{name}'"))?;

    println!("{}", addon_name.bold());
    for (enabled, line) in lines {
        if enabled {
            println!("  {} {line}", "[ON] ".green());
        } else {
            println!("  {} {line}", "[OFF]".bright_black());
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Clone
// ---------------------------------------------------------------------------

fn clone(app: &App, args: CloneArgs) -> Result<()> {
    let source = app.profile_name(&args.profile)?;
    let targets: Vec<ProfileName> = if args.all {
        app.store
            .load()
            .into_keys()
            .filter(|name| *name != source)
            .collect()
    } else {
        args.targets
            .iter()
            .map(|t| app.profile_name(t))
            .collect::<Result<_>>()?
    };
    if targets.is_empty() {
        println!("No other profiles to clone to.");
        return Ok(());
    }

    let session = app.session()?;
    let from = source.clone();
    let addon = args.addon;
    let (addon_name, report) = session
        .run("cloning addon", move |engine| {
            let collection = engine.fetch_collection(&from)?;
            let index = find_addon(&collection, &addon)?;
            let entry = &collection.entries()[index];
            let report = clone_to_targets(engine, &from, entry, &targets);
            Ok((entry.display_name().to_string(), report))
        })
        .with_context(|| format!("failed to clone from '{source}'"))?;

    println!("Cloning '{addon_name}' from '{source}':");
    for (target, outcome) in &report.results {
        match outcome {
            CloneOutcome::Added => println!("  {} {target}: added", "✓".green()),
            CloneOutcome::AlreadyPresent => println!("  {} {target}: already installed", "•".cyan()),
            CloneOutcome::Failed(err) => println!("  {} {target}: {err}", "✗".red()),
        }
    }
    Ok(())
}
