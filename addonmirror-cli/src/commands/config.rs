//! `addonmirror config show` and `addonmirror config data-dir <path>`.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Subcommand;

use addonmirror_core::{config as app_config, paths};

use super::App;

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print the effective configuration.
    Show,

    /// Store profiles and backups somewhere else. Existing data is not moved.
    DataDir { path: PathBuf },
}

pub fn run(app: &App, cmd: ConfigCommand) -> Result<()> {
    match cmd {
        ConfigCommand::Show => show(app),
        ConfigCommand::DataDir { path } => data_dir(app, path),
    }
}

fn show(app: &App) -> Result<()> {
    println!("config file   {}", paths::config_path(&app.home).display());
    println!("data root     {}", app.layout.root().display());
    println!("profiles      {}", app.layout.store_path().display());
    println!("snapshots     {}", app.layout.snapshots_dir().display());
    println!("log file      {}", app.layout.log_path().display());
    println!("api base url  {}", app.config.api_base_url);
    println!("timeout       {}s", app.config.timeout_secs);
    Ok(())
}

fn data_dir(app: &App, path: PathBuf) -> Result<()> {
    let path = if path.is_absolute() {
        path
    } else {
        std::env::current_dir()
            .context("could not resolve current directory")?
            .join(path)
    };
    app_config::set_data_dir_at(&app.home, &path)
        .with_context(|| format!("failed to use {} as data directory", path.display()))?;
    println!("✓ Data directory set to {}", path.display());
    println!("  existing profiles and backups stay in {}", app.layout.root().display());
    Ok(())
}
