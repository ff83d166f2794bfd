//! Collaborator contracts the orchestrator consumes but never implements
//! itself: source control and process execution.
//!
//! `ShellRunner` is the production process runner that spawns `sh -c`.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::process::Command;

use rollout_core::RevisionId;

use crate::error::BoxError;

/// Source control: turn a specifier into a concrete revision and materialize
/// that revision into an empty directory.
pub trait Scm {
    /// Resolve a branch, tag or commit specifier to a concrete revision id.
    ///
    /// Annotated tags must resolve to the commit they point at.
    fn resolve(&self, specifier: &str) -> Result<RevisionId, BoxError>;

    /// Check out `revision` into `destination`, which exists and is empty.
    fn checkout(&self, revision: &RevisionId, destination: &Path) -> Result<(), BoxError>;
}

/// Exit status reported by a [`CommandRunner`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandStatus {
    /// `None` when the process was terminated by a signal.
    pub code: Option<i32>,
}

impl CommandStatus {
    pub const SUCCESS: CommandStatus = CommandStatus { code: Some(0) };

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl fmt::Display for CommandStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "exit status {code}"),
            None => write!(f, "terminated by signal"),
        }
    }
}

/// Runs migration and restart commands.
///
/// Timeouts and cancellation are the runner's concern; the orchestrator
/// waits for whatever it returns.
pub trait CommandRunner {
    fn run(
        &self,
        command: &str,
        cwd: &Path,
        env: &BTreeMap<String, String>,
    ) -> Result<CommandStatus, BoxError>;
}

/// Production runner that spawns `sh -c <command>` with inherited stdio.
#[derive(Debug, Default, Clone, Copy)]
pub struct ShellRunner;

impl CommandRunner for ShellRunner {
    fn run(
        &self,
        command: &str,
        cwd: &Path,
        env: &BTreeMap<String, String>,
    ) -> Result<CommandStatus, BoxError> {
        tracing::info!(command, cwd = %cwd.display(), "running command");
        let status = Command::new("sh")
            .arg("-c")
            .arg(command)
            .current_dir(cwd)
            .envs(env)
            .status()
            .map_err(|e| format!("failed to spawn `sh -c {command}`: {e}"))?;
        Ok(CommandStatus {
            code: status.code(),
        })
    }
}

/// Run `command` and turn a spawn failure or non-zero exit into an error.
pub(crate) fn run_checked(
    runner: &dyn CommandRunner,
    command: &str,
    cwd: &Path,
    env: &BTreeMap<String, String>,
) -> Result<(), BoxError> {
    let status = runner.run(command, cwd, env)?;
    if status.success() {
        Ok(())
    } else {
        Err(format!("`{command}` returned {status}").into())
    }
}
