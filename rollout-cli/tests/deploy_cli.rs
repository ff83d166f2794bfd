//! Drive the `rollout` binary against a throwaway local git repository.

#![cfg(unix)]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use predicates::str::contains;
use tempfile::TempDir;

fn rollout_cmd() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("rollout"));
    cmd.env("RUST_LOG", "warn")
        .env("GIT_CONFIG_NOSYSTEM", "1")
        .env("GIT_CONFIG_GLOBAL", "/dev/null");
    cmd
}

fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

fn git(repo: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .arg("-C")
        .arg(repo)
        .args(args)
        .env("GIT_CONFIG_NOSYSTEM", "1")
        .env("GIT_CONFIG_GLOBAL", "/dev/null")
        .env("GIT_AUTHOR_NAME", "Rollout Test")
        .env("GIT_AUTHOR_EMAIL", "rollout@example.com")
        .env("GIT_COMMITTER_NAME", "Rollout Test")
        .env("GIT_COMMITTER_EMAIL", "rollout@example.com")
        .output()
        .expect("run git");
    assert!(
        output.status.success(),
        "git {args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout).unwrap().trim().to_string()
}

fn commit_version(repo: &Path, version: &str) -> String {
    fs::write(repo.join("VERSION"), version).unwrap();
    git(repo, &["add", "VERSION"]);
    git(repo, &["commit", "-q", "-m", &format!("version {version}")]);
    git(repo, &["rev-parse", "HEAD"])
}

struct Fixture {
    tmp: TempDir,
    repo: PathBuf,
    manifest: PathBuf,
    v1: String,
    v2: String,
}

impl Fixture {
    fn deploy_to(&self) -> PathBuf {
        self.tmp.path().join("app")
    }

    fn current_version(&self) -> String {
        fs::read_to_string(self.deploy_to().join("current/VERSION")).unwrap()
    }

    fn releases_json(&self) -> Vec<serde_json::Value> {
        let output = rollout_cmd()
            .args(["releases", "--json"])
            .arg(self.deploy_to())
            .output()
            .expect("run releases");
        assert!(output.status.success());
        serde_json::from_slice(&output.stdout).expect("releases json")
    }
}

/// Repository with `v1` (annotated tag) and a newer HEAD commit, plus a
/// manifest deploying into `<tmp>/app`.
fn fixture(extra_manifest: &str) -> Fixture {
    let tmp = TempDir::new().unwrap();
    let repo = tmp.path().join("repo");
    fs::create_dir_all(&repo).unwrap();
    git(&repo, &["init", "-q"]);
    let v1 = commit_version(&repo, "1");
    git(&repo, &["tag", "-a", "v1", "-m", "release 1"]);
    let v2 = commit_version(&repo, "2");

    let manifest = tmp.path().join("deploy.yaml");
    fs::write(
        &manifest,
        format!(
            "deploy_to: app\nrepository: {}\nrestart_command: echo restarted > restart.txt\n{extra_manifest}",
            repo.display()
        ),
    )
    .unwrap();

    Fixture {
        tmp,
        repo,
        manifest,
        v1,
        v2,
    }
}

#[test]
fn deploy_twice_is_unchanged() {
    if !git_available() {
        return;
    }
    let fx = fixture("");

    rollout_cmd()
        .arg("deploy")
        .arg(&fx.manifest)
        .assert()
        .success()
        .stdout(contains("deployed").and(contains(fx.v2.as_str())));
    assert_eq!(fx.current_version(), "2");
    assert!(fx.deploy_to().join("current/restart.txt").is_file());

    rollout_cmd()
        .arg("deploy")
        .arg(&fx.manifest)
        .assert()
        .success()
        .stdout(contains("already live"));
    assert_eq!(fx.releases_json().len(), 1);
}

#[test]
fn annotated_tag_deploys_its_commit() {
    if !git_available() {
        return;
    }
    let fx = fixture("");

    rollout_cmd()
        .args(["deploy", "--revision", "v1"])
        .arg(&fx.manifest)
        .assert()
        .success();

    assert_eq!(fx.current_version(), "1");
    let releases = fx.releases_json();
    assert_eq!(releases[0]["revision"], fx.v1.as_str());
    assert_eq!(releases[0]["current"], true);
    assert_eq!(releases[0]["validated"], true);
}

#[test]
fn dry_run_changes_nothing() {
    if !git_available() {
        return;
    }
    let fx = fixture("");

    rollout_cmd()
        .args(["deploy", "--dry-run"])
        .arg(&fx.manifest)
        .assert()
        .success()
        .stdout(contains("would fetch"));
    assert!(!fx.deploy_to().exists());
}

#[test]
fn rollback_restores_previous_release() {
    if !git_available() {
        return;
    }
    let fx = fixture("");

    rollout_cmd()
        .args(["deploy", "--revision", "v1"])
        .arg(&fx.manifest)
        .assert()
        .success();
    rollout_cmd()
        .arg("deploy")
        .arg(&fx.manifest)
        .assert()
        .success();
    assert_eq!(fx.current_version(), "2");

    rollout_cmd()
        .arg("rollback")
        .arg(&fx.manifest)
        .assert()
        .success()
        .stdout(contains("rolled back"));

    assert_eq!(fx.current_version(), "1");
    let releases = fx.releases_json();
    assert_eq!(releases.len(), 1);
    assert_eq!(releases[0]["revision"], fx.v1.as_str());

    rollout_cmd()
        .arg("rollback")
        .arg(&fx.manifest)
        .assert()
        .failure()
        .stderr(contains("no release to roll back to"));
}

#[test]
fn failing_hook_keeps_current_and_reports_phase() {
    if !git_available() {
        return;
    }
    let fx = fixture("");
    rollout_cmd()
        .args(["deploy", "--revision", "v1"])
        .arg(&fx.manifest)
        .assert()
        .success();

    let failing = fx.tmp.path().join("failing.yaml");
    fs::write(
        &failing,
        format!(
            "deploy_to: app\nrepository: {}\nhooks:\n  before_restart: exit 7\n",
            fx.repo.display()
        ),
    )
    .unwrap();

    rollout_cmd()
        .arg("deploy")
        .arg(&failing)
        .assert()
        .failure()
        .stderr(contains("before_restart hook failed"));
    assert_eq!(fx.current_version(), "1");

    let releases = fx.releases_json();
    let failed = releases
        .iter()
        .find(|r| r["revision"] == fx.v2.as_str())
        .expect("failed release listed");
    assert_eq!(failed["validated"], false);
}

#[test]
fn hooks_run_in_release_directory_with_context() {
    if !git_available() {
        return;
    }
    let fx = fixture(
        "hooks:\n  before_symlink: printf %s \"$ROLLOUT_REVISION\" > hook_revision.txt\n",
    );

    rollout_cmd()
        .arg("deploy")
        .arg(&fx.manifest)
        .assert()
        .success();
    let written = fs::read_to_string(fx.deploy_to().join("current/hook_revision.txt")).unwrap();
    assert_eq!(written, fx.v2);
}

#[test]
fn releases_on_empty_root() {
    let tmp = TempDir::new().unwrap();
    rollout_cmd()
        .arg("releases")
        .arg(tmp.path())
        .assert()
        .success()
        .stdout(contains("No releases"));
}

#[test]
fn malformed_manifest_names_the_file() {
    let tmp = TempDir::new().unwrap();
    let manifest = tmp.path().join("broken.yaml");
    fs::write(&manifest, "deploy_to: [unterminated\n").unwrap();

    rollout_cmd()
        .arg("deploy")
        .arg(&manifest)
        .assert()
        .failure()
        .stderr(contains("broken.yaml"));
}

#[test]
fn info_logging_reports_the_loaded_manifest() {
    let tmp = TempDir::new().unwrap();
    let manifest = tmp.path().join("deploy.yaml");
    fs::write(
        &manifest,
        "deploy_to: app\nrepository: /nonexistent/repo\nrevision: main\n",
    )
    .unwrap();

    rollout_cmd()
        .env("RUST_LOG", "info")
        .arg("deploy")
        .arg(&manifest)
        .assert()
        .failure()
        .stderr(contains("loaded manifest").and(contains("deploy.yaml")));
}
