//! Deploy target directory layout.
//!
//! ```text
//! <deploy_to>/
//!   releases/
//!     000001-<revision>/        (release directory)
//!     000001-<revision>.json    (release receipt)
//!   shared/                     (state that survives across releases)
//!   current -> releases/<name>  (symlink, absent before the first deploy)
//! ```

use std::path::{Path, PathBuf};

use crate::error::{io_err, HistoryError};

pub const RELEASES_DIR: &str = "releases";
pub const SHARED_DIR: &str = "shared";
pub const CURRENT_LINK: &str = "current";
pub const PROMOTE_TMP: &str = "current.rollout.tmp";
pub const RECEIPT_EXT: &str = "json";

/// A deploy root and its fixed children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployTarget {
    root: PathBuf,
}

impl DeployTarget {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn releases_dir(&self) -> PathBuf {
        self.root.join(RELEASES_DIR)
    }

    pub fn shared_dir(&self) -> PathBuf {
        self.root.join(SHARED_DIR)
    }

    pub fn current_path(&self) -> PathBuf {
        self.root.join(CURRENT_LINK)
    }

    /// Temporary link name used by the promoter; same directory as `current`
    /// so the rename never crosses filesystems.
    pub fn promote_tmp_path(&self) -> PathBuf {
        self.root.join(PROMOTE_TMP)
    }

    pub fn release_path(&self, name: &str) -> PathBuf {
        self.releases_dir().join(name)
    }

    /// `releases/<name>.json` for a release directory.
    pub fn receipt_path(&self, release_path: &Path) -> PathBuf {
        let name = release_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.releases_dir().join(format!("{name}.{RECEIPT_EXT}"))
    }

    /// Create `deploy_to`, `releases/` and `shared/` (and any missing parents).
    pub fn ensure_dirs(&self) -> Result<(), HistoryError> {
        for dir in [self.releases_dir(), self.shared_dir()] {
            if dir.is_dir() {
                tracing::debug!(path = %dir.display(), "directory already exists");
                continue;
            }
            std::fs::create_dir_all(&dir).map_err(|e| io_err(&dir, e))?;
            tracing::debug!(path = %dir.display(), "created directory");
        }
        Ok(())
    }

    /// Where `current` points, if it is a symlink.
    ///
    /// Relative link targets are resolved against the deploy root.
    pub fn read_current(&self) -> Option<PathBuf> {
        let link = std::fs::read_link(self.current_path()).ok()?;
        if link.is_absolute() {
            Some(link)
        } else {
            Some(self.root.join(link))
        }
    }
}
