//! `rollout rollback` — re-promote an earlier release.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use rollout_deploy::{Deployer, DeployRequest, GitScm, ShellRunner};

use super::{bind_manifest_hooks, load_manifest, print_outcome};

/// Arguments for `rollout rollback`.
#[derive(Args, Debug)]
pub struct RollbackArgs {
    /// Path to the YAML deploy manifest.
    pub manifest: PathBuf,

    /// Revision to roll back to. Defaults to the release before `current`.
    #[arg(long)]
    pub to: Option<String>,
}

impl RollbackArgs {
    pub fn run(self) -> Result<()> {
        let manifest = load_manifest(&self.manifest)?;
        let scm = GitScm::new(manifest.repository.clone());
        let runner = ShellRunner;
        let deployer = Deployer::new(&scm, &runner);

        let mut request = DeployRequest::from_manifest(&manifest);
        bind_manifest_hooks(&mut request, &manifest.hooks, &manifest.environment, &runner);

        let outcome = deployer
            .rollback(&mut request, self.to.as_deref())
            .context("rollback failed")?;
        print_outcome(&outcome);
        Ok(())
    }
}
