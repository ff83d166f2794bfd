//! Caller-facing description of one deploy.

use std::collections::BTreeMap;
use std::path::PathBuf;

use rollout_core::manifest::{self, DeployManifest, LinkMap, DEFAULT_KEEP_RELEASES};
use rollout_core::SharedCollision;

use crate::hooks::Hooks;

/// Everything the orchestrator needs for a deploy or rollback.
///
/// [`DeployRequest::new`] fills in the same defaults an empty manifest gets.
#[derive(Debug)]
pub struct DeployRequest<'a> {
    pub deploy_to: PathBuf,
    /// Branch, tag or commit specifier handed to the SCM.
    pub revision: String,
    pub migrate: bool,
    pub migration_command: Option<String>,
    pub restart_command: Option<String>,
    /// Extra environment for the migration and restart commands.
    pub environment: BTreeMap<String, String>,
    pub symlinks: LinkMap,
    pub symlinks_before_migrate: LinkMap,
    pub purge_before_symlink: Vec<String>,
    pub create_dirs_before_symlink: Vec<String>,
    pub keep_releases: usize,
    pub shared_collision: SharedCollision,
    /// Fetch a new release even when the revision is already deployed.
    pub force: bool,
    pub hooks: Hooks<'a>,
}

impl<'a> DeployRequest<'a> {
    pub fn new(deploy_to: impl Into<PathBuf>, revision: impl Into<String>) -> Self {
        Self {
            deploy_to: deploy_to.into(),
            revision: revision.into(),
            migrate: false,
            migration_command: None,
            restart_command: None,
            environment: BTreeMap::new(),
            symlinks: manifest::default_symlinks(),
            symlinks_before_migrate: manifest::default_symlinks_before_migrate(),
            purge_before_symlink: manifest::default_purge_before_symlink(),
            create_dirs_before_symlink: manifest::default_create_dirs_before_symlink(),
            keep_releases: DEFAULT_KEEP_RELEASES,
            shared_collision: SharedCollision::default(),
            force: false,
            hooks: Hooks::default(),
        }
    }

    /// Build a request from a loaded manifest. Hooks are left unbound; the
    /// caller decides how manifest hook commands are executed.
    pub fn from_manifest(m: &DeployManifest) -> Self {
        Self {
            deploy_to: m.deploy_to.clone(),
            revision: m.revision.clone(),
            migrate: m.migrate,
            migration_command: m.migration_command.clone(),
            restart_command: m.restart_command.clone(),
            environment: m.environment.clone(),
            symlinks: m.symlinks.clone(),
            symlinks_before_migrate: m.symlinks_before_migrate.clone(),
            purge_before_symlink: m.purge_before_symlink.clone(),
            create_dirs_before_symlink: m.create_dirs_before_symlink.clone(),
            keep_releases: m.keep_releases,
            shared_collision: m.shared_collision,
            force: false,
            hooks: Hooks::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_uses_manifest_defaults() {
        let req = DeployRequest::new("/srv/app", "main");
        assert_eq!(req.keep_releases, 5);
        assert_eq!(req.symlinks.get("pids").map(String::as_str), Some("tmp/pids"));
        assert!(!req.force);
        assert!(!req.migrate);
    }
}
