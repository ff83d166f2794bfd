//! Deploy state machine.
//!
//! ```text
//! resolve → classify ─┬─ Unchanged ──────────────────────────────→ done
//!                     ├─ Reuse ─────────────────┐
//!                     └─ Fetch → links + before_migrate → migrate ┤
//!                                                                  ↓
//!        before_symlink → links → promote → restart hooks → cleanup → done
//! ```
//!
//! Any failure after the checkout leaves the release directory on disk with
//! an unvalidated receipt and puts `current` back where it was. Nothing needs
//! repairing before the next invocation: unvalidated releases are never
//! reused, so a retry fetches afresh and runs every hook again.

use std::path::Path;

use serde::Serialize;

use rollout_core::{history, DeployTarget, HistoryError, HookPhase, Release, RevisionId};

use crate::collab::{run_checked, CommandRunner, Scm};
use crate::error::{history_err, DeployError, Stage};
use crate::hooks::{self, HookContext};
use crate::promote;
use crate::request::DeployRequest;
use crate::share;

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// How a successful invocation ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "release", rename_all = "snake_case")]
pub enum DeployOutcome {
    /// The revision was already live; nothing ran.
    Unchanged(Release),
    /// A new release was fetched and promoted.
    Deployed(Release),
    /// An existing release was promoted again.
    RolledBack(Release),
}

impl DeployOutcome {
    pub fn release(&self) -> &Release {
        match self {
            DeployOutcome::Unchanged(r)
            | DeployOutcome::Deployed(r)
            | DeployOutcome::RolledBack(r) => r,
        }
    }
}

/// What a deploy of a request would do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", content = "release", rename_all = "snake_case")]
pub enum PlanAction {
    Unchanged(Release),
    Reuse(Release),
    Fetch,
}

/// Result of [`Deployer::plan`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeployPlan {
    pub revision: RevisionId,
    #[serde(flatten)]
    pub action: PlanAction,
}

// ---------------------------------------------------------------------------
// Deployer
// ---------------------------------------------------------------------------

/// Sequences history, links, hooks, promotion and the two collaborators.
pub struct Deployer<'c> {
    scm: &'c dyn Scm,
    runner: &'c dyn CommandRunner,
}

impl<'c> Deployer<'c> {
    pub fn new(scm: &'c dyn Scm, runner: &'c dyn CommandRunner) -> Self {
        Self { scm, runner }
    }

    /// Deploy `request.revision`: no-op if it is live, reuse a validated
    /// release if one exists, otherwise fetch a new one.
    pub fn deploy(&self, request: &mut DeployRequest<'_>) -> Result<DeployOutcome, DeployError> {
        let target = bootstrap(request)?;
        let revision = self.resolve(&request.revision)?;

        match classify(&target, &revision, request.force)? {
            PlanAction::Unchanged(release) => {
                tracing::info!(revision = %revision, release = %release.path.display(), "already deployed");
                Ok(DeployOutcome::Unchanged(release))
            }
            PlanAction::Reuse(release) => {
                tracing::info!(revision = %revision, release = %release.path.display(), "reusing release");
                self.reuse(&target, request, release).map(DeployOutcome::RolledBack)
            }
            PlanAction::Fetch => self.fresh(&target, request, revision).map(DeployOutcome::Deployed),
        }
    }

    /// Roll back to a deployed release without fetching anything.
    ///
    /// `to` names a revision (a recorded revision id, or any specifier the
    /// SCM can resolve); `None` picks the validated release just before
    /// `current`.
    pub fn rollback(
        &self,
        request: &mut DeployRequest<'_>,
        to: Option<&str>,
    ) -> Result<DeployOutcome, DeployError> {
        let target = bootstrap(request)?;

        let release = match to {
            Some(specifier) => match latest_validated(&target, &RevisionId::from(specifier))? {
                Some(release) => release,
                None => {
                    let revision = self.resolve(specifier)?;
                    latest_validated(&target, &revision)?.ok_or_else(|| {
                        DeployError::RevisionNotDeployed {
                            revision: revision.to_string(),
                        }
                    })?
                }
            },
            None => previous_validated(&target)?.ok_or_else(|| DeployError::NoPreviousRelease {
                releases_dir: target.releases_dir(),
            })?,
        };

        if is_current(&target, &release)? {
            tracing::info!(release = %release.path.display(), "rollback target is already current");
            return Ok(DeployOutcome::Unchanged(release));
        }
        tracing::info!(revision = %release.revision, release = %release.path.display(), "rolling back");
        self.reuse(&target, request, release).map(DeployOutcome::RolledBack)
    }

    /// Resolve and classify `request` without touching the filesystem.
    pub fn plan(&self, request: &DeployRequest<'_>) -> Result<DeployPlan, DeployError> {
        let target = target_for(request)?;
        let revision = self.resolve(&request.revision)?;
        let action = classify(&target, &revision, request.force)?;
        Ok(DeployPlan { revision, action })
    }

    // -----------------------------------------------------------------------
    // Paths through the state machine
    // -----------------------------------------------------------------------

    fn fresh(
        &self,
        target: &DeployTarget,
        request: &mut DeployRequest<'_>,
        revision: RevisionId,
    ) -> Result<Release, DeployError> {
        let previous = target.read_current();

        let release =
            history::register(target, &revision).map_err(|e| DeployError::ReleaseCreation {
                path: target.releases_dir(),
                source: Box::new(e),
            })?;
        if let Err(source) = self.scm.checkout(&revision, &release.path) {
            if let Err(err) = history::remove_release(target, &release) {
                tracing::warn!(release = %release.path.display(), error = %err, "could not remove failed checkout");
            }
            return Err(DeployError::ReleaseCreation {
                path: release.path,
                source,
            });
        }
        tracing::info!(revision = %revision, release = %release.path.display(), "checked out release");

        if let Err(err) = self.advance(target, request, &release, true) {
            recover(target, previous.as_deref(), &err);
            return Err(err);
        }

        let release = mark_deployed(target, &release, previous.as_deref())?;
        let summary = history::prune(target, request.keep_releases);
        if !summary.removed.is_empty() || !summary.failed.is_empty() {
            tracing::info!(
                removed = summary.removed.len(),
                failed = summary.failed.len(),
                "pruned old releases"
            );
        }
        Ok(release)
    }

    fn reuse(
        &self,
        target: &DeployTarget,
        request: &mut DeployRequest<'_>,
        release: Release,
    ) -> Result<Release, DeployError> {
        let previous = target.read_current();

        if let Err(err) = self.advance(target, request, &release, false) {
            recover(target, previous.as_deref(), &err);
            return Err(err);
        }

        let release = mark_deployed(target, &release, previous.as_deref())?;
        let discarded = history::discard_after(target, release.sequence)
            .map_err(history_err(Stage::Cleanup))?;
        if !discarded.is_empty() {
            tracing::info!(discarded = discarded.len(), "discarded releases newer than rollback target");
        }
        Ok(release)
    }

    /// Steps from the first link pass through `after_restart`. The
    /// pre-migration steps only run for a fresh checkout.
    fn advance(
        &self,
        target: &DeployTarget,
        request: &mut DeployRequest<'_>,
        release: &Release,
        fresh: bool,
    ) -> Result<(), DeployError> {
        let shared = target.shared_dir();
        let context = |phase| HookContext {
            phase,
            release_path: release.path.clone(),
            revision: release.revision.clone(),
            deploy_to: target.root().to_path_buf(),
            shared_path: shared.clone(),
        };

        if fresh {
            share::apply(
                &request.symlinks_before_migrate,
                &shared,
                &release.path,
                request.shared_collision,
            )?;
            let ctx = context(HookPhase::BeforeMigrate);
            hooks::run(&ctx, request.hooks.get_mut(ctx.phase))?;

            if request.migrate {
                match &request.migration_command {
                    Some(command) => {
                        tracing::info!(command = %command, "running migration");
                        run_checked(self.runner, command, &release.path, &request.environment)
                            .map_err(|source| DeployError::Migration {
                                command: command.clone(),
                                source,
                            })?;
                    }
                    None => tracing::warn!("migrate is set but there is no migration command"),
                }
            }
        }

        let ctx = context(HookPhase::BeforeSymlink);
        hooks::run(&ctx, request.hooks.get_mut(ctx.phase))?;

        share::purge(&release.path, &request.purge_before_symlink)?;
        share::create_dirs(&release.path, &request.create_dirs_before_symlink)?;
        share::apply(&request.symlinks, &shared, &release.path, request.shared_collision)?;
        share::apply(
            &request.symlinks_before_migrate,
            &shared,
            &release.path,
            request.shared_collision,
        )?;

        promote::promote(target, &release.path)?;

        let ctx = context(HookPhase::BeforeRestart);
        hooks::run(&ctx, request.hooks.get_mut(ctx.phase))?;

        if let Some(command) = &request.restart_command {
            tracing::info!(command = %command, "restarting");
            run_checked(self.runner, command, &target.current_path(), &request.environment)
                .map_err(|source| DeployError::Restart {
                    command: command.clone(),
                    source,
                })?;
        }

        let ctx = context(HookPhase::AfterRestart);
        hooks::run(&ctx, request.hooks.get_mut(ctx.phase))?;
        Ok(())
    }

    fn resolve(&self, specifier: &str) -> Result<RevisionId, DeployError> {
        let revision = self
            .scm
            .resolve(specifier)
            .map_err(|source| DeployError::Resolution {
                specifier: specifier.to_string(),
                source,
            })?;
        tracing::debug!(specifier, revision = %revision, "resolved");
        Ok(revision)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// The request's deploy root as an absolute path, so `current` never holds a
/// link relative to the caller's working directory.
fn target_for(request: &DeployRequest<'_>) -> Result<DeployTarget, DeployError> {
    let root = std::path::absolute(&request.deploy_to).map_err(|source| DeployError::History {
        stage: Stage::Layout,
        source: HistoryError::Io {
            path: request.deploy_to.clone(),
            source,
        },
    })?;
    Ok(DeployTarget::new(root))
}

fn bootstrap(request: &DeployRequest<'_>) -> Result<DeployTarget, DeployError> {
    let target = target_for(request)?;
    target.ensure_dirs().map_err(history_err(Stage::Layout))?;
    Ok(target)
}

fn classify(
    target: &DeployTarget,
    revision: &RevisionId,
    force: bool,
) -> Result<PlanAction, DeployError> {
    if force {
        return Ok(PlanAction::Fetch);
    }
    let Some(release) = latest_validated(target, revision)? else {
        return Ok(PlanAction::Fetch);
    };
    if is_current(target, &release)? {
        Ok(PlanAction::Unchanged(release))
    } else {
        Ok(PlanAction::Reuse(release))
    }
}

/// Most recent validated release of `revision`.
fn latest_validated(
    target: &DeployTarget,
    revision: &RevisionId,
) -> Result<Option<Release>, DeployError> {
    Ok(history::list(target)
        .map_err(history_err(Stage::Classify))?
        .into_iter()
        .filter(|r| &r.revision == revision && r.is_validated())
        .max_by_key(|r| r.sequence))
}

/// The newest validated release older than `current`.
fn previous_validated(target: &DeployTarget) -> Result<Option<Release>, DeployError> {
    let Some(current) = history::current_release(target).map_err(history_err(Stage::Classify))?
    else {
        return Ok(None);
    };
    Ok(history::list(target)
        .map_err(history_err(Stage::Classify))?
        .into_iter()
        .filter(|r| r.sequence < current.sequence && r.is_validated())
        .max_by_key(|r| r.sequence))
}

fn is_current(target: &DeployTarget, release: &Release) -> Result<bool, DeployError> {
    Ok(history::current_release(target)
        .map_err(history_err(Stage::Classify))?
        .is_some_and(|c| c.path == release.path))
}

/// Record the validation. A release whose receipt cannot be written must not
/// stay live, so a failure here also restores `current`.
fn mark_deployed(
    target: &DeployTarget,
    release: &Release,
    previous: Option<&Path>,
) -> Result<Release, DeployError> {
    history::mark_deployed(target, release).map_err(|source| {
        let err = history_err(Stage::Cleanup)(source);
        recover(target, previous, &err);
        err
    })
}

/// Put `current` back after a failed invocation. Errors here are logged; the
/// original failure is what the caller gets.
fn recover(target: &DeployTarget, previous: Option<&Path>, err: &DeployError) {
    tracing::warn!(stage = %err.stage(), error = %err, "deploy failed; restoring current");
    if target.read_current().as_deref() == previous {
        return;
    }
    if let Err(restore_err) = promote::restore(target, previous) {
        tracing::error!(
            error = %restore_err,
            previous = ?previous,
            "could not restore current"
        );
    }
}
