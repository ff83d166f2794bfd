//! YAML deploy manifest.
//!
//! A manifest describes one deploy target and everything a deploy of it
//! needs: where to fetch from, which revision, commands, shared links and
//! hooks. Unset keys take the defaults below.
//!
//! ```yaml
//! deploy_to: /srv/shop
//! repository: https://example.com/shop.git
//! revision: main
//! migrate: true
//! migration_command: bin/migrate
//! restart_command: touch tmp/restart.txt
//! keep_releases: 3
//! shared_collision: skip
//! hooks:
//!   before_restart: bin/warm-cache
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ManifestError;
use crate::types::{HookPhase, SharedCollision};

pub const DEFAULT_KEEP_RELEASES: usize = 5;
pub const DEFAULT_REVISION: &str = "HEAD";

/// Shared-relative path → release-relative path.
pub type LinkMap = BTreeMap<String, String>;

/// `system → public/system`, `pids → tmp/pids`, `log → log`.
pub fn default_symlinks() -> LinkMap {
    [
        ("system", "public/system"),
        ("pids", "tmp/pids"),
        ("log", "log"),
    ]
    .into_iter()
    .map(|(s, r)| (s.to_string(), r.to_string()))
    .collect()
}

/// `config/database.yml → config/database.yml`.
pub fn default_symlinks_before_migrate() -> LinkMap {
    let mut links = LinkMap::new();
    links.insert(
        "config/database.yml".to_string(),
        "config/database.yml".to_string(),
    );
    links
}

pub fn default_purge_before_symlink() -> Vec<String> {
    vec!["log".into(), "tmp/pids".into(), "public/system".into()]
}

pub fn default_create_dirs_before_symlink() -> Vec<String> {
    vec!["tmp".into(), "public".into(), "config".into()]
}

fn default_revision() -> String {
    DEFAULT_REVISION.to_string()
}

fn default_keep_releases() -> usize {
    DEFAULT_KEEP_RELEASES
}

/// Shell commands bound to hook phases; each runs with the release directory
/// as its working directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HookCommands {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before_migrate: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before_symlink: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before_restart: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after_restart: Option<String>,
}

impl HookCommands {
    pub fn get(&self, phase: HookPhase) -> Option<&str> {
        match phase {
            HookPhase::BeforeMigrate => self.before_migrate.as_deref(),
            HookPhase::BeforeSymlink => self.before_symlink.as_deref(),
            HookPhase::BeforeRestart => self.before_restart.as_deref(),
            HookPhase::AfterRestart => self.after_restart.as_deref(),
        }
    }
}

/// On-disk deploy manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployManifest {
    /// Deploy root. Relative paths are resolved against the manifest's directory.
    pub deploy_to: PathBuf,
    /// Repository URL or local path handed to the SCM collaborator.
    pub repository: String,
    #[serde(default = "default_revision")]
    pub revision: String,
    #[serde(default)]
    pub migrate: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub migration_command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restart_command: Option<String>,
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
    #[serde(default = "default_symlinks")]
    pub symlinks: LinkMap,
    #[serde(default = "default_symlinks_before_migrate")]
    pub symlinks_before_migrate: LinkMap,
    #[serde(default = "default_purge_before_symlink")]
    pub purge_before_symlink: Vec<String>,
    #[serde(default = "default_create_dirs_before_symlink")]
    pub create_dirs_before_symlink: Vec<String>,
    #[serde(default = "default_keep_releases")]
    pub keep_releases: usize,
    #[serde(default)]
    pub shared_collision: SharedCollision,
    #[serde(default)]
    pub hooks: HookCommands,
}

/// Load and validate the manifest at `path`.
///
/// Returns `ManifestError::Parse` (with path + line context) if the YAML is
/// malformed.
pub fn load_at(path: &Path) -> Result<DeployManifest, ManifestError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ManifestError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut manifest: DeployManifest =
        serde_yaml::from_str(&contents).map_err(|source| ManifestError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

    if manifest.deploy_to.as_os_str().is_empty() {
        return Err(ManifestError::Invalid {
            path: path.to_path_buf(),
            message: "deploy_to must not be empty".to_string(),
        });
    }
    if manifest.repository.trim().is_empty() {
        return Err(ManifestError::Invalid {
            path: path.to_path_buf(),
            message: "repository must not be empty".to_string(),
        });
    }
    if manifest.migrate && manifest.migration_command.is_none() {
        return Err(ManifestError::Invalid {
            path: path.to_path_buf(),
            message: "migrate is true but no migration_command is set".to_string(),
        });
    }

    if manifest.deploy_to.is_relative() {
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        manifest.deploy_to = base.join(&manifest.deploy_to);
    }
    Ok(manifest)
}
