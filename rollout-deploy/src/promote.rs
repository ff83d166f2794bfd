//! Atomic promotion of a release to `current`.
//!
//! 1. Create the symlink `current.rollout.tmp` in the deploy root.
//! 2. Rename it onto `current` (atomic on POSIX; replaces an existing link).
//!
//! The same path runs whether or not `current` exists, so there is never a
//! moment where `current` is missing or half-written.

use std::io;
use std::path::Path;

use rollout_core::DeployTarget;

use crate::error::DeployError;
use crate::share::symlink;

/// Point `current` at `release_path`.
///
/// Failure to create the temporary link leaves `current` untouched; a failed
/// rename removes the temporary link before the error is returned.
pub fn promote(target: &DeployTarget, release_path: &Path) -> Result<(), DeployError> {
    let tmp = target.promote_tmp_path();
    let current = target.current_path();
    let promotion_err = |source: io::Error| DeployError::Promotion {
        release: release_path.to_path_buf(),
        current: current.clone(),
        source,
    };

    // A stale temp link from an interrupted run would make symlink() fail.
    match std::fs::remove_file(&tmp) {
        Ok(()) => tracing::debug!(path = %tmp.display(), "removed stale promote link"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(promotion_err(e)),
    }

    symlink(release_path, &tmp).map_err(promotion_err)?;

    if let Err(e) = std::fs::rename(&tmp, &current) {
        let _ = std::fs::remove_file(&tmp);
        return Err(promotion_err(e));
    }

    tracing::info!(
        current = %current.display(),
        release = %release_path.display(),
        "promoted release"
    );
    Ok(())
}

/// Put `current` back the way it was before an invocation started.
///
/// `previous` is the release `current` pointed at beforehand; `None` removes
/// `current` entirely.
pub fn restore(target: &DeployTarget, previous: Option<&Path>) -> Result<(), DeployError> {
    match previous {
        Some(path) => promote(target, path),
        None => {
            let current = target.current_path();
            match std::fs::remove_file(&current) {
                Ok(()) => {
                    tracing::info!(current = %current.display(), "removed current");
                    Ok(())
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
                Err(source) => Err(DeployError::Promotion {
                    release: current.clone(),
                    current,
                    source,
                }),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
