//! `rollout deploy` — fetch (or reuse) a revision and promote it.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use rollout_deploy::{Deployer, DeployPlan, DeployRequest, GitScm, PlanAction, ShellRunner};

use super::{bind_manifest_hooks, load_manifest, print_outcome};

/// Arguments for `rollout deploy`.
#[derive(Args, Debug)]
pub struct DeployArgs {
    /// Path to the YAML deploy manifest.
    pub manifest: PathBuf,

    /// Branch, tag or commit to deploy instead of the manifest's revision.
    #[arg(long)]
    pub revision: Option<String>,

    /// Fetch a fresh release even if the revision is already deployed.
    #[arg(long)]
    pub force: bool,

    /// Show what a deploy would do without changing anything.
    #[arg(long)]
    pub dry_run: bool,
}

impl DeployArgs {
    pub fn run(self) -> Result<()> {
        let manifest = load_manifest(&self.manifest)?;
        let scm = GitScm::new(manifest.repository.clone());
        let runner = ShellRunner;
        let deployer = Deployer::new(&scm, &runner);

        let mut request = DeployRequest::from_manifest(&manifest);
        if let Some(revision) = self.revision {
            request.revision = revision;
        }
        request.force = self.force;

        if self.dry_run {
            let plan = deployer
                .plan(&request)
                .with_context(|| format!("cannot plan deploy of '{}'", request.revision))?;
            print_plan(&request.revision, &plan);
            return Ok(());
        }

        bind_manifest_hooks(&mut request, &manifest.hooks, &manifest.environment, &runner);
        let revision = request.revision.clone();
        let outcome = deployer
            .deploy(&mut request)
            .with_context(|| format!("deploy of '{revision}' failed"))?;
        print_outcome(&outcome);
        Ok(())
    }
}

fn print_plan(specifier: &str, plan: &DeployPlan) {
    let prefix = "[dry-run]".bright_black();
    match &plan.action {
        PlanAction::Unchanged(release) => println!(
            "{prefix} {specifier} ({}) is already live in {}; nothing to do",
            plan.revision,
            release.name()
        ),
        PlanAction::Reuse(release) => println!(
            "{prefix} would re-promote {} for {specifier} ({}) without fetching",
            release.name(),
            plan.revision
        ),
        PlanAction::Fetch => println!(
            "{prefix} would fetch {specifier} ({}) into a new release",
            plan.revision
        ),
    }
}
