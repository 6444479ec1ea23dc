//! addonmirror: manage addon collections across several profiles.
//!
//! # Usage
//!
//! ```text
//! addonmirror profile add|list|delete|login|mirror
//! addonmirror addons list|install|remove|move|rename|catalogs|move-catalog|reset|clone <profile> ...
//! addonmirror backup create|list|restore|rename|delete <profile> ...
//! addonmirror reconcile [--json]
//! addonmirror diff <mirror>
//! addonmirror config show|data-dir
//! ```

mod commands;

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    addons::AddonsCommand, backup::BackupCommand, config::ConfigCommand, diff::DiffArgs,
    profile::ProfileCommand, reconcile::ReconcileArgs, App,
};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "addonmirror",
    version,
    about = "Keep addon collections of several profiles in sync",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Add, remove, log in and link profiles.
    Profile {
        #[command(subcommand)]
        command: ProfileCommand,
    },

    /// Inspect and edit a profile's addon collection.
    Addons {
        #[command(subcommand)]
        command: AddonsCommand,
    },

    /// Snapshot and restore addon collections.
    Backup {
        #[command(subcommand)]
        command: BackupCommand,
    },

    /// Bring every mirror in line with its master.
    Reconcile(ReconcileArgs),

    /// Show how a mirror differs from its master, without pushing.
    Diff(DiffArgs),

    /// Show or change configuration.
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    let app = App::load()?;
    init_tracing(&app.layout.log_path());

    match cli.command {
        Commands::Profile { command } => commands::profile::run(&app, command),
        Commands::Addons { command } => commands::addons::run(&app, command),
        Commands::Backup { command } => commands::backup::run(&app, command),
        Commands::Reconcile(args) => args.run(&app),
        Commands::Diff(args) => args.run(&app),
        Commands::Config { command } => commands::config::run(&app, command),
    }
}

/// Log to `log_path` when it can be opened, stderr otherwise.
fn init_tracing(log_path: &Path) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let file = log_path
        .parent()
        .map(std::fs::create_dir_all)
        .transpose()
        .ok()
        .and_then(|_| OpenOptions::new().create(true).append(true).open(log_path).ok());

    match file {
        Some(file) => {
            let _ = fmt()
                .with_env_filter(filter)
                .with_target(false)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init();
        }
        None => {
            let _ = fmt()
                .with_env_filter(filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .try_init();
        }
    }
}
