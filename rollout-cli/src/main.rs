//! rollout — revision-based deploys with atomic promotion and rollback.
//!
//! # Usage
//!
//! ```text
//! rollout deploy <manifest> [--revision <rev>] [--force] [--dry-run]
//! rollout rollback <manifest> [--to <rev>]
//! rollout releases <deploy_to> [--json]
//! ```
//!
//! Logs go to stderr; set `RUST_LOG` to change the level (default `info`).

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{deploy::DeployArgs, releases::ReleasesArgs, rollback::RollbackArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "rollout",
    version,
    about = "Deploy revisions into release directories and roll them back",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Deploy the manifest's revision (or --revision) and promote it.
    Deploy(DeployArgs),

    /// Re-promote an earlier release without fetching.
    Rollback(RollbackArgs),

    /// List the releases under a deploy root.
    Releases(ReleasesArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    match cli.command {
        Commands::Deploy(args) => args.run(),
        Commands::Rollback(args) => args.run(),
        Commands::Releases(args) => args.run(),
    }
}

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
