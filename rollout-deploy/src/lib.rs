//! # rollout-deploy
//!
//! Release orchestration on top of `rollout-core`'s history store.
//!
//! [`Deployer::deploy`] classifies a request as a no-op, a reuse of an
//! existing release, or a fresh fetch, then runs links, hooks, migration,
//! promotion and restart in fixed order. [`Deployer::rollback`] re-promotes
//! an earlier release without fetching.
//!
//! Source control and process execution come in through the [`Scm`] and
//! [`CommandRunner`] traits; [`GitScm`] and [`ShellRunner`] are the
//! production implementations.

pub mod collab;
pub mod error;
pub mod git;
pub mod hooks;
pub mod orchestrator;
pub mod promote;
pub mod request;
pub mod share;

pub use collab::{CommandRunner, CommandStatus, Scm, ShellRunner};
pub use error::{BoxError, DeployError, Stage};
pub use git::GitScm;
pub use hooks::{Hook, HookContext, Hooks};
pub use orchestrator::{DeployOutcome, DeployPlan, Deployer, PlanAction};
pub use request::DeployRequest;
pub use share::LinkResult;
