//! Release history store.
//!
//! The history of a deploy target is the live set of directories under
//! `releases/`; there is no index file. Order comes from the directory name
//! convention `<sequence:06>-<revision slug>`, so listing is a `read_dir` and
//! a sort, and releases deleted out-of-band simply disappear from history.
//!
//! # API pattern
//!
//! Every function takes the [`DeployTarget`] explicitly and re-reads the
//! filesystem; nothing is cached between calls.

use std::io::ErrorKind;
use std::path::Path;

use chrono::Utc;

use crate::error::{io_err, HistoryError};
use crate::layout::{DeployTarget, RECEIPT_EXT};
use crate::receipt;
use crate::types::{Release, ReleaseReceipt, RevisionId};

// ---------------------------------------------------------------------------
// 1. Naming
// ---------------------------------------------------------------------------

/// Directory name for a release: zero-padded sequence, then the revision slug.
pub fn release_dir_name(sequence: u64, revision: &RevisionId) -> String {
    format!("{sequence:06}-{}", revision.slug())
}

/// Split a release directory name into `(sequence, slug)`.
///
/// Returns `None` for names that do not follow the convention.
pub fn parse_release_dir_name(name: &str) -> Option<(u64, &str)> {
    let (seq, slug) = name.split_once('-')?;
    if seq.is_empty() || slug.is_empty() || !seq.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some((seq.parse().ok()?, slug))
}

// ---------------------------------------------------------------------------
// 2. Read
// ---------------------------------------------------------------------------

/// List every release under `releases/`, oldest first.
///
/// Hidden entries, plain files, symlinks and directories whose names do not
/// follow the naming convention are ignored. A release without a readable
/// receipt is reported as unvalidated, with its revision taken from the
/// directory name.
pub fn list(target: &DeployTarget) -> Result<Vec<Release>, HistoryError> {
    let dir = target.releases_dir();
    let entries = match std::fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(vec![]),
        Err(err) => return Err(io_err(&dir, err)),
    };

    let mut releases = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| io_err(&dir, e))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') {
            continue;
        }
        // `file_type` does not follow symlinks.
        let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
        if !is_dir {
            continue;
        }
        let Some((sequence, slug)) = parse_release_dir_name(&name) else {
            tracing::debug!(entry = %name, "ignoring non-release entry");
            continue;
        };
        // A directory sitting where a sibling release's receipt belongs.
        let receipt_suffix = format!(".{RECEIPT_EXT}");
        if name
            .strip_suffix(receipt_suffix.as_str())
            .is_some_and(|stem| dir.join(stem).is_dir())
        {
            tracing::warn!(entry = %name, "receipt path is a directory");
            continue;
        }

        let path = entry.path();
        let receipt_path = target.receipt_path(&path);
        let receipt = match receipt::load_at(&receipt_path) {
            Ok(receipt) => receipt,
            Err(err) => {
                tracing::warn!(path = %receipt_path.display(), error = %err, "unreadable release receipt");
                None
            }
        };

        let release = match receipt {
            Some(r) if r.sequence == sequence => Release {
                revision: r.revision,
                sequence,
                path,
                created_at: Some(r.created_at),
                deployed_at: r.deployed_at,
            },
            _ => Release {
                revision: RevisionId::from(slug),
                sequence,
                path,
                created_at: None,
                deployed_at: None,
            },
        };
        releases.push(release);
    }

    releases.sort_by(|a, b| a.sequence.cmp(&b.sequence).then_with(|| a.path.cmp(&b.path)));
    Ok(releases)
}

/// The most recent release whose revision matches `revision`.
pub fn find_by_revision(
    target: &DeployTarget,
    revision: &RevisionId,
) -> Result<Option<Release>, HistoryError> {
    Ok(list(target)?
        .into_iter()
        .filter(|r| &r.revision == revision)
        .max_by_key(|r| r.sequence))
}

/// The release `current` points at, if it is a listed release directory.
pub fn current_release(target: &DeployTarget) -> Result<Option<Release>, HistoryError> {
    let Some(link) = target.read_current() else {
        return Ok(None);
    };
    if !link.is_dir() {
        return Ok(None);
    }
    let releases_dir = target.releases_dir();
    let Some(name) = link.file_name() else {
        return Ok(None);
    };
    let in_releases = link
        .parent()
        .map(|p| same_dir(p, &releases_dir))
        .unwrap_or(false);
    if !in_releases {
        return Ok(None);
    }
    Ok(list(target)?
        .into_iter()
        .find(|r| r.path.file_name() == Some(name)))
}

// ---------------------------------------------------------------------------
// 3. Register
// ---------------------------------------------------------------------------

/// Create a new, empty release directory for `revision` with the next
/// sequence number, plus a pending receipt.
///
/// Returns [`HistoryError::ReleaseExists`] if the directory is already
/// present; an existing release is never overwritten.
pub fn register(target: &DeployTarget, revision: &RevisionId) -> Result<Release, HistoryError> {
    let releases_dir = target.releases_dir();
    std::fs::create_dir_all(&releases_dir).map_err(|e| io_err(&releases_dir, e))?;

    let sequence = list(target)?
        .iter()
        .map(|r| r.sequence)
        .max()
        .unwrap_or(0)
        + 1;
    let path = target.release_path(&release_dir_name(sequence, revision));

    match std::fs::create_dir(&path) {
        Ok(()) => {}
        Err(err) if err.kind() == ErrorKind::AlreadyExists => {
            return Err(HistoryError::ReleaseExists { path });
        }
        Err(err) => return Err(io_err(&path, err)),
    }

    let now = Utc::now();
    let pending = ReleaseReceipt {
        revision: revision.clone(),
        sequence,
        created_at: now,
        deployed_at: None,
    };
    if let Err(err) = receipt::save_at(&target.receipt_path(&path), &pending) {
        let _ = std::fs::remove_dir(&path);
        return Err(err);
    }

    tracing::info!(release = %path.display(), revision = %revision, sequence, "registered release");
    Ok(Release {
        revision: revision.clone(),
        sequence,
        path,
        created_at: Some(now),
        deployed_at: None,
    })
}

/// Stamp `deployed_at` into the release's receipt, validating it.
pub fn mark_deployed(target: &DeployTarget, release: &Release) -> Result<Release, HistoryError> {
    let path = target.receipt_path(&release.path);
    let now = Utc::now();
    let mut stamped = receipt::load_at(&path)?.unwrap_or_else(|| ReleaseReceipt {
        revision: release.revision.clone(),
        sequence: release.sequence,
        created_at: release.created_at.unwrap_or(now),
        deployed_at: None,
    });
    stamped.deployed_at = Some(now);
    receipt::save_at(&path, &stamped)?;

    Ok(Release {
        created_at: Some(stamped.created_at),
        deployed_at: Some(now),
        ..release.clone()
    })
}

// ---------------------------------------------------------------------------
// 4. Delete
// ---------------------------------------------------------------------------

/// Delete one release: the receipt first, then the directory tree
/// child-first.
///
/// Dropping the receipt first means an interrupted deletion leaves at most an
/// unvalidated directory, never one that still looks deployed.
pub fn remove_release(target: &DeployTarget, release: &Release) -> Result<(), HistoryError> {
    receipt::remove_at(&target.receipt_path(&release.path))?;
    remove_tree(&release.path)?;
    tracing::info!(release = %release.path.display(), "removed release");
    Ok(())
}

/// Outcome of [`prune`].
#[derive(Debug, Default)]
pub struct PruneSummary {
    pub removed: Vec<Release>,
    pub failed: Vec<(Release, String)>,
}

/// Delete all but the newest `keep` releases that `current` does not
/// reference.
///
/// Never fails: errors are logged and reported in the summary.
pub fn prune(target: &DeployTarget, keep: usize) -> PruneSummary {
    let mut summary = PruneSummary::default();

    let (releases, current) = match (list(target), current_release(target)) {
        (Ok(releases), Ok(current)) => (releases, current),
        (Err(err), _) | (_, Err(err)) => {
            tracing::warn!(error = %err, "could not read release history; skipping prune");
            return summary;
        }
    };

    let candidates: Vec<Release> = releases
        .into_iter()
        .filter(|r| current.as_ref().map(|c| c.path != r.path).unwrap_or(true))
        .collect();
    let excess = candidates.len().saturating_sub(keep);

    for release in candidates.into_iter().take(excess) {
        match remove_release(target, &release) {
            Ok(()) => summary.removed.push(release),
            Err(err) => {
                tracing::warn!(release = %release.path.display(), error = %err, "failed to prune release");
                summary.failed.push((release, err.to_string()));
            }
        }
    }
    summary
}

/// Delete every release newer than the most recent release of `revision`.
///
/// Returns the removed releases, oldest first.
pub fn discard_newer_than(
    target: &DeployTarget,
    revision: &RevisionId,
) -> Result<Vec<Release>, HistoryError> {
    let anchor = find_by_revision(target, revision)?.ok_or_else(|| {
        HistoryError::RevisionNotFound {
            revision: revision.to_string(),
            releases_dir: target.releases_dir(),
        }
    })?;
    discard_after(target, anchor.sequence)
}

/// Delete every release whose sequence is greater than `sequence`.
pub fn discard_after(target: &DeployTarget, sequence: u64) -> Result<Vec<Release>, HistoryError> {
    let mut removed = Vec::new();
    for release in list(target)?.into_iter().filter(|r| r.sequence > sequence) {
        remove_release(target, &release)?;
        removed.push(release);
    }
    Ok(removed)
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

/// `a` and `b` name the same directory, either literally or once resolved.
fn same_dir(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (std::fs::canonicalize(a), std::fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Remove `path` depth-first without following symlinks.
///
/// Links that point into `shared/` are removed as links; their targets are
/// never touched.
fn remove_tree(path: &Path) -> Result<(), HistoryError> {
    let meta = match std::fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(()),
        Err(err) => return Err(io_err(path, err)),
    };

    if !meta.is_dir() {
        return std::fs::remove_file(path).map_err(|e| io_err(path, e));
    }

    for entry in std::fs::read_dir(path).map_err(|e| io_err(path, e))? {
        let entry = entry.map_err(|e| io_err(path, e))?;
        remove_tree(&entry.path())?;
    }
    std::fs::remove_dir(path).map_err(|e| io_err(path, e))
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
