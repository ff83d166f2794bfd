//! Rollout core library — release history, deploy layout, manifests, errors.
//!
//! Public API surface:
//! - [`types`] — revision ids, releases, hook phases
//! - [`layout`] — [`DeployTarget`] paths
//! - [`history`] — list / find / register / prune / discard
//! - [`receipt`] — per-release sidecar metadata
//! - [`manifest`] — YAML deploy manifest
//! - [`error`] — [`HistoryError`], [`ManifestError`]

pub mod error;
pub mod history;
pub mod layout;
pub mod manifest;
pub mod receipt;
pub mod types;

pub use error::{HistoryError, ManifestError};
pub use layout::DeployTarget;
pub use manifest::DeployManifest;
pub use types::{HookPhase, Release, ReleaseReceipt, RevisionId, SharedCollision};
