//! `addonmirror diff <mirror>`: drift between a mirror and its master.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use addonmirror_sync::drift::drift_of;

use super::App;

#[derive(Args, Debug)]
pub struct DiffArgs {
    /// The mirror profile to compare against its master.
    pub mirror: String,
}

impl DiffArgs {
    pub fn run(self, app: &App) -> Result<()> {
        let mirror = app.profile_name(&self.mirror)?;
        let session = app.session()?;
        let target = mirror.clone();
        let report = session
            .run("comparing collections", move |engine| drift_of(engine, &target))
            .with_context(|| format!("failed to compare '{mirror}' with its master"))?;

        println!("master  {} {}", report.master, short(&report.master_fingerprint));
        println!("mirror  {} {}", report.mirror, short(&report.mirror_fingerprint));

        if report.in_sync() {
            println!("{}", "In sync.".green());
            return Ok(());
        }
        for line in report.unified_diff.lines() {
            if line.starts_with("+++") || line.starts_with("---") {
                println!("{}", line.bold());
            } else if line.starts_with('+') {
                println!("{}", line.green());
            } else if line.starts_with('-') {
                println!("{}", line.red());
            } else if line.starts_with("@@") {
                println!("{}", line.cyan());
            } else {
                println!("{line}");
            }
        }
        Ok(())
    }
}

fn short(fingerprint: &str) -> &str {
    fingerprint.get(..12).unwrap_or(fingerprint)
}
