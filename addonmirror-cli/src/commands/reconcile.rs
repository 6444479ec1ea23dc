//! `addonmirror reconcile`: one scan over every mirror.

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use addonmirror_core::store::mirror_groups;

use super::{status_label, App};

#[derive(Args, Debug)]
pub struct ReconcileArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct OutcomeJson {
    mirror: String,
    master: String,
    status: String,
    pushed: bool,
    error: Option<String>,
}

#[derive(Tabled)]
struct OutcomeRow {
    #[tabled(rename = "mirror")]
    mirror: String,
    #[tabled(rename = "master")]
    master: String,
    #[tabled(rename = "status")]
    status: String,
    #[tabled(rename = "detail")]
    detail: String,
}

impl ReconcileArgs {
    pub fn run(self, app: &App) -> Result<()> {
        if mirror_groups(&app.store.load()).is_empty() {
            if self.json {
                println!("[]");
            } else {
                println!("No mirrored profiles.");
                println!("Run: addonmirror profile mirror <name> --master <profile>");
            }
            return Ok(());
        }

        let mut session = app.session()?;
        session.start_reconciliation();
        if !self.json {
            println!("Checking mirrors...");
        }
        let report = session
            .wait_for_reconciliation()
            .context("reconciliation did not complete")?
            .context("reconciliation was not started")?;

        if self.json {
            let payload: Vec<OutcomeJson> = report
                .outcomes
                .iter()
                .map(|o| OutcomeJson {
                    mirror: o.mirror.to_string(),
                    master: o.master.to_string(),
                    status: o.status.to_string(),
                    pushed: o.pushed,
                    error: o.error.clone(),
                })
                .collect();
            println!(
                "{}",
                serde_json::to_string_pretty(&payload).context("failed to serialize report")?
            );
            return Ok(());
        }

        let rows: Vec<OutcomeRow> = report
            .outcomes
            .iter()
            .map(|o| OutcomeRow {
                mirror: o.mirror.to_string(),
                master: o.master.to_string(),
                status: status_label(o.status),
                detail: match (&o.error, o.pushed) {
                    (Some(err), _) => err.clone(),
                    (None, true) => "pushed master's addons".to_string(),
                    (None, false) => "up to date".to_string(),
                },
            })
            .collect();
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");
        println!(
            "Finished at {} | {} pushed | {} failed",
            report
                .finished_at
                .with_timezone(&chrono::Local)
                .format("%H:%M:%S"),
            report.pushed(),
            report.failed()
        );
        Ok(())
    }
}
