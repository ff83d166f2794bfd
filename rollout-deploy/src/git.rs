//! `Scm` backed by the system `git` binary.
//!
//! Resolution reads `git ls-remote` so nothing is cloned to answer "what
//! commit is `main`?". Checkout is a plain clone followed by a detached
//! checkout of the resolved commit.

use std::ffi::OsStr;
use std::path::Path;
use std::process::Command;

use rollout_core::RevisionId;

use crate::collab::Scm;
use crate::error::BoxError;

/// Git source for one repository URL or local path.
#[derive(Debug, Clone)]
pub struct GitScm {
    repository: String,
}

impl GitScm {
    pub fn new(repository: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
        }
    }

    pub fn repository(&self) -> &str {
        &self.repository
    }

    fn git<I, S>(&self, args: I) -> Result<String, BoxError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut cmd = Command::new("git");
        cmd.args(["-c", "advice.detachedHead=false"])
            .args(args)
            .env("GIT_TERMINAL_PROMPT", "0");
        let rendered = format!("{cmd:?}");
        let output = cmd
            .output()
            .map_err(|e| format!("failed to execute git: {e}"))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(format!("{rendered} failed: {}", stderr.trim()).into());
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl Scm for GitScm {
    fn resolve(&self, specifier: &str) -> Result<RevisionId, BoxError> {
        let listing = self.git(["ls-remote", self.repository.as_str()])?;
        if let Some(sha) = pick_ref(&listing, specifier) {
            tracing::debug!(specifier, sha, "resolved revision");
            return Ok(RevisionId::from(sha));
        }
        if is_full_object_id(specifier) {
            return Ok(RevisionId::from(specifier.to_ascii_lowercase()));
        }
        Err(format!(
            "no branch, tag or full commit id '{specifier}' in {}",
            self.repository
        )
        .into())
    }

    fn checkout(&self, revision: &RevisionId, destination: &Path) -> Result<(), BoxError> {
        tracing::info!(
            repository = %self.repository,
            revision = %revision,
            destination = %destination.display(),
            "checking out"
        );
        self.git([
            OsStr::new("clone"),
            OsStr::new("--quiet"),
            OsStr::new("--no-checkout"),
            OsStr::new("--"),
            OsStr::new(&self.repository),
            destination.as_os_str(),
        ])?;
        self.git([
            OsStr::new("-C"),
            destination.as_os_str(),
            OsStr::new("checkout"),
            OsStr::new("--quiet"),
            OsStr::new("--detach"),
            OsStr::new(revision.as_str()),
        ])?;
        Ok(())
    }
}

/// Pick the commit for `specifier` out of `git ls-remote` output.
///
/// Annotated tags appear twice; the peeled `^{}` line names the commit and
/// wins. Tags are preferred over branches of the same name.
fn pick_ref<'a>(listing: &'a str, specifier: &str) -> Option<&'a str> {
    let refs: Vec<(&str, &str)> = listing
        .lines()
        .filter_map(|line| line.split_once('\t'))
        .map(|(sha, name)| (sha.trim(), name.trim()))
        .collect();
    let lookup = |name: &str| refs.iter().find(|(_, n)| *n == name).map(|(sha, _)| *sha);

    let candidates = if specifier == "HEAD" || specifier.starts_with("refs/") {
        vec![format!("{specifier}^{{}}"), specifier.to_string()]
    } else {
        vec![
            format!("refs/tags/{specifier}^{{}}"),
            format!("refs/tags/{specifier}"),
            format!("refs/heads/{specifier}"),
        ]
    };
    candidates.iter().find_map(|name| lookup(name.as_str()))
}

fn is_full_object_id(s: &str) -> bool {
    matches!(s.len(), 40 | 64) && s.chars().all(|c| c.is_ascii_hexdigit())
}
