//! Shared-state wiring: symlinks from a release into `shared/`.
//!
//! A deploy applies two link maps. `symlinks_before_migrate` is applied
//! right after checkout so migrations see shared config; `symlinks` is
//! applied after `before_symlink`, together with the purge/create-dir
//! preparation of the release tree.

use std::io;
use std::path::{Component, Path, PathBuf};

use rollout_core::manifest::LinkMap;
use rollout_core::SharedCollision;

use crate::error::DeployError;

// ---------------------------------------------------------------------------
// Link result
// ---------------------------------------------------------------------------

/// Outcome of one link map entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkResult {
    /// Nothing existed at the destination; a new link was created.
    Linked { destination: PathBuf },
    /// A symlink already existed and was recreated.
    Relinked { destination: PathBuf },
    /// A checkout file or directory was removed and replaced by the link.
    Replaced { destination: PathBuf },
    /// A checkout file or directory was kept; no link was made.
    Skipped { destination: PathBuf },
}

impl LinkResult {
    pub fn destination(&self) -> &Path {
        match self {
            LinkResult::Linked { destination }
            | LinkResult::Relinked { destination }
            | LinkResult::Replaced { destination }
            | LinkResult::Skipped { destination } => destination,
        }
    }
}

// ---------------------------------------------------------------------------
// Path validation
// ---------------------------------------------------------------------------

/// Reject empty, absolute and `..`-bearing paths.
pub(crate) fn validate_relative(path: &str) -> Result<&Path, DeployError> {
    let p = Path::new(path);
    let plain = !path.is_empty()
        && p.components().all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
        && p.components().any(|c| matches!(c, Component::Normal(_)));
    if plain {
        Ok(p)
    } else {
        Err(DeployError::InvalidLinkPath {
            path: path.to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// apply
// ---------------------------------------------------------------------------

/// Link every `shared_rel → release_rel` entry of `mapping` into
/// `release_path`.
///
/// All entries are validated before anything is touched.
pub fn apply(
    mapping: &LinkMap,
    shared_root: &Path,
    release_path: &Path,
    policy: SharedCollision,
) -> Result<Vec<LinkResult>, DeployError> {
    let mut entries = Vec::with_capacity(mapping.len());
    for (shared_rel, release_rel) in mapping {
        entries.push((
            validate_relative(shared_rel)?,
            validate_relative(release_rel)?,
        ));
    }

    let mut results = Vec::with_capacity(entries.len());
    for (shared_rel, release_rel) in entries {
        let shared = shared_root.join(shared_rel);
        let destination = release_path.join(release_rel);
        results.push(link_one(&shared, &destination, policy)?);
    }
    Ok(results)
}

fn link_one(
    shared: &Path,
    destination: &Path,
    policy: SharedCollision,
) -> Result<LinkResult, DeployError> {
    let link_err = |source: io::Error| DeployError::Link {
        shared: shared.to_path_buf(),
        destination: destination.to_path_buf(),
        source,
    };

    if let Some(parent) = destination.parent() {
        std::fs::create_dir_all(parent).map_err(link_err)?;
    }

    let existing = match std::fs::symlink_metadata(destination) {
        Ok(meta) => Some(meta),
        Err(e) if e.kind() == io::ErrorKind::NotFound => None,
        Err(e) => return Err(link_err(e)),
    };

    let result = match existing {
        None => LinkResult::Linked {
            destination: destination.to_path_buf(),
        },
        Some(meta) if meta.file_type().is_symlink() => {
            std::fs::remove_file(destination).map_err(link_err)?;
            LinkResult::Relinked {
                destination: destination.to_path_buf(),
            }
        }
        Some(_) if policy == SharedCollision::Skip => {
            tracing::warn!(
                destination = %destination.display(),
                shared = %shared.display(),
                "checkout already has this path; keeping it"
            );
            return Ok(LinkResult::Skipped {
                destination: destination.to_path_buf(),
            });
        }
        Some(meta) => {
            if meta.is_dir() {
                std::fs::remove_dir_all(destination).map_err(link_err)?;
            } else {
                std::fs::remove_file(destination).map_err(link_err)?;
            }
            LinkResult::Replaced {
                destination: destination.to_path_buf(),
            }
        }
    };

    symlink(shared, destination).map_err(link_err)?;
    tracing::debug!(
        destination = %destination.display(),
        shared = %shared.display(),
        "linked shared path"
    );
    Ok(result)
}

// ---------------------------------------------------------------------------
// Release preparation
// ---------------------------------------------------------------------------

/// Remove each listed path from the release tree. Missing paths are fine.
pub fn purge(release_path: &Path, paths: &[String]) -> Result<(), DeployError> {
    for rel in paths {
        let path = release_path.join(validate_relative(rel)?);
        let prepare_err = |source| DeployError::Prepare {
            path: path.clone(),
            source,
        };
        let meta = match std::fs::symlink_metadata(&path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
            Err(e) => return Err(prepare_err(e)),
        };
        if meta.is_dir() {
            std::fs::remove_dir_all(&path).map_err(prepare_err)?;
        } else {
            std::fs::remove_file(&path).map_err(prepare_err)?;
        }
        tracing::debug!(path = %path.display(), "purged");
    }
    Ok(())
}

/// Create each listed directory (and parents) inside the release tree.
pub fn create_dirs(release_path: &Path, paths: &[String]) -> Result<(), DeployError> {
    for rel in paths {
        let path = release_path.join(validate_relative(rel)?);
        std::fs::create_dir_all(&path).map_err(|source| DeployError::Prepare {
            path: path.clone(),
            source,
        })?;
    }
    Ok(())
}

#[cfg(unix)]
pub(crate) fn symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(not(unix))]
pub(crate) fn symlink(_target: &Path, _link: &Path) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "release links require a unix platform",
    ))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::fs;
    use tempfile::TempDir;

    struct Fixture {
        _tmp: TempDir,
        shared: PathBuf,
        release: PathBuf,
    }

    fn fixture() -> Fixture {
        let tmp = TempDir::new().unwrap();
        let shared = tmp.path().join("shared");
        let release = tmp.path().join("releases").join("000001-abc");
        fs::create_dir_all(shared.join("system")).unwrap();
        fs::create_dir_all(&release).unwrap();
        Fixture {
            _tmp: tmp,
            shared,
            release,
        }
    }

    fn map(entries: &[(&str, &str)]) -> LinkMap {
        entries
            .iter()
            .map(|(s, r)| (s.to_string(), r.to_string()))
            .collect()
    }

    #[test]
    fn links_into_missing_intermediate_dirs() {
        let fx = fixture();
        let results = apply(
            &map(&[("system", "public/system")]),
            &fx.shared,
            &fx.release,
            SharedCollision::Skip,
        )
        .expect("apply");

        let dest = fx.release.join("public/system");
        assert_eq!(results, vec![LinkResult::Linked { destination: dest.clone() }]);
        assert_eq!(fs::read_link(&dest).unwrap(), fx.shared.join("system"));
    }

    #[test]
    fn existing_symlink_is_recreated() {
        let fx = fixture();
        let dest = fx.release.join("log");
        std::os::unix::fs::symlink("/nowhere", &dest).unwrap();

        let results = apply(&map(&[("log", "log")]), &fx.shared, &fx.release, SharedCollision::Skip)
            .expect("apply");
        assert!(matches!(results[0], LinkResult::Relinked { .. }));
        assert_eq!(fs::read_link(&dest).unwrap(), fx.shared.join("log"));
    }

    #[test]
    fn skip_keeps_checkout_file() {
        let fx = fixture();
        fs::create_dir_all(fx.release.join("config")).unwrap();
        let dest = fx.release.join("config/database.yml");
        fs::write(&dest, "from checkout").unwrap();

        let results = apply(
            &map(&[("config/database.yml", "config/database.yml")]),
            &fx.shared,
            &fx.release,
            SharedCollision::Skip,
        )
        .expect("apply");

        assert!(matches!(results[0], LinkResult::Skipped { .. }));
        assert_eq!(fs::read_to_string(&dest).unwrap(), "from checkout");
    }

    #[test]
    fn overwrite_replaces_checkout_directory() {
        let fx = fixture();
        let dest = fx.release.join("public/system");
        fs::create_dir_all(dest.join("nested")).unwrap();
        fs::write(dest.join("nested/file"), "x").unwrap();

        let results = apply(
            &map(&[("system", "public/system")]),
            &fx.shared,
            &fx.release,
            SharedCollision::Overwrite,
        )
        .expect("apply");

        assert!(matches!(results[0], LinkResult::Replaced { .. }));
        assert!(fs::symlink_metadata(&dest).unwrap().file_type().is_symlink());
    }

    #[rstest]
    #[case("/etc/passwd")]
    #[case("../escape")]
    #[case("log/../../escape")]
    #[case("")]
    fn rejects_unsafe_paths(#[case] bad: &str) {
        let fx = fixture();
        let err = apply(&map(&[("log", bad)]), &fx.shared, &fx.release, SharedCollision::Skip)
            .unwrap_err();
        assert!(matches!(err, DeployError::InvalidLinkPath { .. }), "got: {err}");
        assert_eq!(fs::read_dir(&fx.release).unwrap().count(), 0);
    }

    #[test]
    fn purge_then_create_dirs() {
        let fx = fixture();
        fs::create_dir_all(fx.release.join("log")).unwrap();
        fs::write(fx.release.join("log/dev.log"), "noise").unwrap();

        purge(&fx.release, &["log".into(), "tmp/pids".into()]).expect("purge");
        assert!(!fx.release.join("log").exists());

        create_dirs(&fx.release, &["tmp".into(), "public".into()]).expect("create");
        assert!(fx.release.join("tmp").is_dir());
        assert!(fx.release.join("public").is_dir());
    }

    #[test]
    fn purge_removes_link_without_touching_its_target() {
        let fx = fixture();
        fs::write(fx.shared.join("system/keep.txt"), "shared").unwrap();
        fs::create_dir_all(fx.release.join("public")).unwrap();
        std::os::unix::fs::symlink(fx.shared.join("system"), fx.release.join("public/system"))
            .unwrap();

        purge(&fx.release, &["public/system".into()]).expect("purge");
        assert!(fx.shared.join("system/keep.txt").exists());
    }
}
