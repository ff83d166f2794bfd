//! `rollout releases` — release history of a deploy root.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use rollout_core::{history, DeployTarget, Release};

/// Arguments for `rollout releases`.
#[derive(Args, Debug)]
pub struct ReleasesArgs {
    /// Deploy root (the directory holding `releases/` and `current`).
    pub deploy_to: PathBuf,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl ReleasesArgs {
    pub fn run(self) -> Result<()> {
        let target = DeployTarget::new(&self.deploy_to);
        let releases = history::list(&target)
            .with_context(|| format!("failed to read releases under {}", self.deploy_to.display()))?;
        let current = history::current_release(&target)
            .context("failed to resolve current release")?
            .map(|r| r.path);

        let rows: Vec<ReleaseRow> = releases
            .into_iter()
            .map(|release| ReleaseRow::new(release, current.as_deref()))
            .collect();

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&rows).context("failed to serialize releases JSON")?
            );
            return Ok(());
        }
        print_table(&self.deploy_to, rows);
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct ReleaseRow {
    sequence: u64,
    revision: String,
    name: String,
    path: PathBuf,
    current: bool,
    validated: bool,
    created_at: Option<DateTime<Utc>>,
    deployed_at: Option<DateTime<Utc>>,
}

impl ReleaseRow {
    fn new(release: Release, current: Option<&std::path::Path>) -> Self {
        Self {
            sequence: release.sequence,
            revision: release.revision.to_string(),
            name: release.name(),
            current: current == Some(release.path.as_path()),
            validated: release.is_validated(),
            created_at: release.created_at,
            deployed_at: release.deployed_at,
            path: release.path,
        }
    }
}

#[derive(Tabled)]
struct ReleaseTableRow {
    #[tabled(rename = "")]
    marker: String,
    #[tabled(rename = "seq")]
    sequence: u64,
    #[tabled(rename = "revision")]
    revision: String,
    #[tabled(rename = "state")]
    state: String,
    #[tabled(rename = "deployed")]
    deployed: String,
}

fn print_table(deploy_to: &std::path::Path, rows: Vec<ReleaseRow>) {
    if rows.is_empty() {
        println!("No releases under {}.", deploy_to.display());
        return;
    }

    let live = rows.iter().filter(|r| r.current).count();
    println!(
        "{} | {} releases | {}",
        deploy_to.display().to_string().bold(),
        rows.len(),
        if live == 0 {
            "no current release".yellow().to_string()
        } else {
            "current ●".green().to_string()
        }
    );

    let table_rows: Vec<ReleaseTableRow> = rows
        .into_iter()
        .map(|row| ReleaseTableRow {
            marker: if row.current { "●".green().to_string() } else { String::new() },
            sequence: row.sequence,
            revision: row.revision,
            state: state_label(row.validated),
            deployed: row
                .deployed_at
                .map(|at| at.format("%Y-%m-%d %H:%M:%S UTC").to_string())
                .unwrap_or_else(|| "-".to_string()),
        })
        .collect();
    let mut table = Table::new(table_rows);
    table.with(Style::rounded());
    println!("{table}");
}

fn state_label(validated: bool) -> String {
    if validated {
        "deployed".green().to_string()
    } else {
        "unvalidated".red().to_string()
    }
}
