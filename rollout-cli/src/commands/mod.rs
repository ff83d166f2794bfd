//! Subcommands and the glue they share.

pub mod deploy;
pub mod releases;
pub mod rollback;

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;

use rollout_core::manifest::{self, DeployManifest, HookCommands};
use rollout_core::HookPhase;
use rollout_deploy::{CommandRunner, DeployOutcome, DeployRequest, HookContext};

pub(crate) fn load_manifest(path: &Path) -> Result<DeployManifest> {
    let manifest = manifest::load_at(path)
        .with_context(|| format!("failed to load manifest {}", path.display()))?;
    tracing::info!(
        manifest = %path.display(),
        deploy_to = %manifest.deploy_to.display(),
        revision = %manifest.revision,
        "loaded manifest"
    );
    Ok(manifest)
}

/// Bind each manifest hook command to its phase. Commands run through
/// `runner` in the release directory, with the manifest environment plus
/// `ROLLOUT_*` variables describing the release.
pub(crate) fn bind_manifest_hooks<'a>(
    request: &mut DeployRequest<'a>,
    hooks: &'a HookCommands,
    environment: &'a BTreeMap<String, String>,
    runner: &'a dyn CommandRunner,
) {
    for &phase in HookPhase::all() {
        let Some(command) = hooks.get(phase) else {
            continue;
        };
        tracing::debug!(%phase, command = %command, "binding manifest hook");
        request.hooks.set(phase, move |ctx: &HookContext| {
            let mut env = environment.clone();
            env.extend(hook_env(ctx));
            let status = runner.run(command, &ctx.release_path, &env)?;
            if status.success() {
                Ok(())
            } else {
                Err(format!("`{command}` returned {status}").into())
            }
        });
    }
}

fn hook_env(ctx: &HookContext) -> [(String, String); 5] {
    [
        ("ROLLOUT_HOOK".into(), ctx.phase.to_string()),
        ("ROLLOUT_REVISION".into(), ctx.revision.to_string()),
        (
            "ROLLOUT_RELEASE_PATH".into(),
            ctx.release_path.display().to_string(),
        ),
        ("ROLLOUT_DEPLOY_TO".into(), ctx.deploy_to.display().to_string()),
        (
            "ROLLOUT_SHARED_PATH".into(),
            ctx.shared_path.display().to_string(),
        ),
    ]
}

pub(crate) fn print_outcome(outcome: &DeployOutcome) {
    let release = outcome.release();
    match outcome {
        DeployOutcome::Unchanged(_) => println!(
            "{} {} is already live ({})",
            "✓".green(),
            release.revision,
            release.name()
        ),
        DeployOutcome::Deployed(_) => println!(
            "{} deployed {} → {}",
            "✓".green(),
            release.revision,
            release.name()
        ),
        DeployOutcome::RolledBack(_) => println!(
            "{} rolled back to {} ({})",
            "✓".green(),
            release.revision,
            release.name()
        ),
    }
}
