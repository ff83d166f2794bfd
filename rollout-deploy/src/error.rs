//! Error types for rollout-deploy.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use rollout_core::{HistoryError, HookPhase};

/// Boxed error returned by caller-supplied hooks and collaborators.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The deploy step an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Layout,
    Resolve,
    Classify,
    Fetch,
    Link,
    Hook(HookPhase),
    Migrate,
    Promote,
    Restart,
    Cleanup,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Layout => write!(f, "layout"),
            Stage::Resolve => write!(f, "resolve"),
            Stage::Classify => write!(f, "classify"),
            Stage::Fetch => write!(f, "fetch"),
            Stage::Link => write!(f, "link"),
            Stage::Hook(phase) => write!(f, "hook {phase}"),
            Stage::Migrate => write!(f, "migrate"),
            Stage::Promote => write!(f, "promote"),
            Stage::Restart => write!(f, "restart"),
            Stage::Cleanup => write!(f, "cleanup"),
        }
    }
}

/// All errors that can end a deploy or rollback invocation.
#[derive(Debug, Error)]
pub enum DeployError {
    /// The SCM collaborator could not resolve the revision specifier.
    #[error("cannot resolve revision '{specifier}': {source}")]
    Resolution {
        specifier: String,
        #[source]
        source: BoxError,
    },

    /// Registering the release directory or checking out into it failed.
    #[error("cannot create release at {path}: {source}")]
    ReleaseCreation {
        path: PathBuf,
        #[source]
        source: BoxError,
    },

    #[error("migration command `{command}` failed: {source}")]
    Migration {
        command: String,
        #[source]
        source: BoxError,
    },

    /// A caller hook returned an error; tagged with its phase.
    #[error("{phase} hook failed: {source}")]
    Hook {
        phase: HookPhase,
        #[source]
        source: BoxError,
    },

    #[error("restart command `{command}` failed: {source}")]
    Restart {
        command: String,
        #[source]
        source: BoxError,
    },

    /// Swapping `current` failed; the previous `current` is intact.
    #[error("cannot promote {release} to {current}: {source}")]
    Promotion {
        release: PathBuf,
        current: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A shared link could not be created.
    #[error("cannot link shared {shared} into {destination}: {source}")]
    Link {
        shared: PathBuf,
        destination: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Purging or creating a directory inside the release failed.
    #[error("cannot prepare {path} in release: {source}")]
    Prepare {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A link map entry is not a plain relative path.
    #[error("invalid link path '{path}': must be relative without '..'")]
    InvalidLinkPath { path: String },

    /// Explicit rollback with no earlier validated release.
    #[error("there is no release to roll back to in {releases_dir}")]
    NoPreviousRelease { releases_dir: PathBuf },

    /// Explicit rollback to a revision that was never successfully deployed.
    #[error("revision '{revision}' has no deployed release to roll back to")]
    RevisionNotDeployed { revision: String },

    /// Release history or layout failure.
    #[error("{stage}: {source}")]
    History {
        stage: Stage,
        #[source]
        source: HistoryError,
    },
}

impl DeployError {
    /// The stage the invocation failed in.
    pub fn stage(&self) -> Stage {
        match self {
            DeployError::Resolution { .. } => Stage::Resolve,
            DeployError::ReleaseCreation { .. } => Stage::Fetch,
            DeployError::Migration { .. } => Stage::Migrate,
            DeployError::Hook { phase, .. } => Stage::Hook(*phase),
            DeployError::Restart { .. } => Stage::Restart,
            DeployError::Promotion { .. } => Stage::Promote,
            DeployError::Link { .. }
            | DeployError::Prepare { .. }
            | DeployError::InvalidLinkPath { .. } => Stage::Link,
            DeployError::NoPreviousRelease { .. } | DeployError::RevisionNotDeployed { .. } => {
                Stage::Classify
            }
            DeployError::History { stage, .. } => *stage,
        }
    }
}

/// Convenience constructor for [`DeployError::History`].
pub(crate) fn history_err(stage: Stage) -> impl FnOnce(HistoryError) -> DeployError {
    move |source| DeployError::History { stage, source }
}
