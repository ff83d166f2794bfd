//! Lifecycle hooks: four fixed extension points run in order.

use std::fmt;
use std::path::PathBuf;

use rollout_core::{HookPhase, RevisionId};

use crate::error::{BoxError, DeployError};

/// What a hook gets to see about the release being deployed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookContext {
    pub phase: HookPhase,
    pub release_path: PathBuf,
    pub revision: RevisionId,
    pub deploy_to: PathBuf,
    pub shared_path: PathBuf,
}

/// Caller-supplied work bound to one phase.
pub type Hook<'a> = Box<dyn FnMut(&HookContext) -> Result<(), BoxError> + 'a>;

/// Optional hooks for each phase.
#[derive(Default)]
pub struct Hooks<'a> {
    pub before_migrate: Option<Hook<'a>>,
    pub before_symlink: Option<Hook<'a>>,
    pub before_restart: Option<Hook<'a>>,
    pub after_restart: Option<Hook<'a>>,
}

impl<'a> Hooks<'a> {
    /// Bind `hook` to `phase`, replacing whatever was there.
    pub fn set(
        &mut self,
        phase: HookPhase,
        hook: impl FnMut(&HookContext) -> Result<(), BoxError> + 'a,
    ) -> &mut Self {
        *self.slot(phase) = Some(Box::new(hook));
        self
    }

    pub fn get_mut(&mut self, phase: HookPhase) -> Option<&mut Hook<'a>> {
        self.slot(phase).as_mut()
    }

    fn slot(&mut self, phase: HookPhase) -> &mut Option<Hook<'a>> {
        match phase {
            HookPhase::BeforeMigrate => &mut self.before_migrate,
            HookPhase::BeforeSymlink => &mut self.before_symlink,
            HookPhase::BeforeRestart => &mut self.before_restart,
            HookPhase::AfterRestart => &mut self.after_restart,
        }
    }
}

impl fmt::Debug for Hooks<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("before_migrate", &self.before_migrate.is_some())
            .field("before_symlink", &self.before_symlink.is_some())
            .field("before_restart", &self.before_restart.is_some())
            .field("after_restart", &self.after_restart.is_some())
            .finish()
    }
}

/// Run `hook` for `ctx.phase`. A missing hook is a no-op.
pub fn run(ctx: &HookContext, hook: Option<&mut Hook<'_>>) -> Result<(), DeployError> {
    let Some(hook) = hook else {
        tracing::debug!(phase = %ctx.phase, "no hook bound");
        return Ok(());
    };
    tracing::info!(phase = %ctx.phase, release = %ctx.release_path.display(), "running hook");
    hook(ctx).map_err(|source| DeployError::Hook {
        phase: ctx.phase,
        source,
    })
}
