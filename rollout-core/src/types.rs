//! Domain types for release history.
//!
//! All path fields use `PathBuf`; never `&str` or `String` for filesystem paths.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// A concrete, resolved revision identifier (e.g. a commit hash).
///
/// Only resolved ids are ever compared; raw specifiers such as branch or tag
/// names never reach the history store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RevisionId(pub String);

impl RevisionId {
    /// Filesystem-safe form used in release directory names.
    ///
    /// Characters outside `[A-Za-z0-9._-]` become `_`.
    pub fn slug(&self) -> String {
        let slug: String = self
            .0
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        if slug.is_empty() {
            "_".to_string()
        } else {
            slug
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RevisionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for RevisionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RevisionId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// The four fixed lifecycle extension points, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookPhase {
    BeforeMigrate,
    BeforeSymlink,
    BeforeRestart,
    AfterRestart,
}

impl HookPhase {
    /// All phases in the order a fresh deploy runs them.
    pub fn all() -> &'static [HookPhase] {
        &[
            HookPhase::BeforeMigrate,
            HookPhase::BeforeSymlink,
            HookPhase::BeforeRestart,
            HookPhase::AfterRestart,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            HookPhase::BeforeMigrate => "before_migrate",
            HookPhase::BeforeSymlink => "before_symlink",
            HookPhase::BeforeRestart => "before_restart",
            HookPhase::AfterRestart => "after_restart",
        }
    }
}

impl fmt::Display for HookPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What to do when a shared link destination already exists in the checkout
/// as a regular file or directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SharedCollision {
    /// Keep the checkout's copy and skip the shared entry.
    #[default]
    Skip,
    /// Remove the checkout's copy and link the shared entry in its place.
    Overwrite,
}

impl fmt::Display for SharedCollision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SharedCollision::Skip => write!(f, "skip"),
            SharedCollision::Overwrite => write!(f, "overwrite"),
        }
    }
}

// ---------------------------------------------------------------------------
// Domain structs
// ---------------------------------------------------------------------------

/// Sidecar metadata stored next to each release directory as
/// `releases/<name>.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseReceipt {
    pub revision: RevisionId,
    pub sequence: u64,
    pub created_at: DateTime<Utc>,
    /// Set once the deploy that created the release completed successfully.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployed_at: Option<DateTime<Utc>>,
}

/// One materialized checkout under `releases/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Release {
    pub revision: RevisionId,
    pub sequence: u64,
    /// Absolute path of the release directory.
    pub path: PathBuf,
    pub created_at: Option<DateTime<Utc>>,
    pub deployed_at: Option<DateTime<Utc>>,
}

impl Release {
    /// Directory name under `releases/` (`<sequence>-<slug>`).
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// A release is validated once a deploy through it has completed.
    ///
    /// Unvalidated releases are leftovers of failed attempts and are never
    /// reused or treated as the live release.
    pub fn is_validated(&self) -> bool {
        self.deployed_at.is_some()
    }

    pub fn is_at(&self, path: &Path) -> bool {
        self.path == path
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
