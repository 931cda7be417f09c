//! CLI-level tests: drives the built binary against scratch git repositories.

use assert_cmd::Command;
use predicates::prelude::*;
use std::process::Command as StdCommand;
use tempfile::TempDir;

fn git(repo: &std::path::Path, args: &[&str]) {
    let status = StdCommand::new("git")
        .arg("-C")
        .arg(repo)
        .args(args)
        .status()
        .expect("git must be installed");
    assert!(status.success(), "git {args:?} failed");
}

fn git_output(repo: &std::path::Path, args: &[&str]) -> String {
    let output = StdCommand::new("git")
        .arg("-C")
        .arg(repo)
        .args(args)
        .output()
        .expect("git must be installed");
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// Returns the scratch repo plus the base commit SHA (before the unsafe
/// change), since our range validation rejects `~`/`^` revision syntax.
fn init_repo_with_change() -> (TempDir, String) {
    let dir = tempfile::tempdir().unwrap();
    let repo = dir.path();
    git(repo, &["init", "-q", "-b", "main"]);
    git(repo, &["config", "user.email", "test@example.com"]);
    git(repo, &["config", "user.name", "Test"]);
    std::fs::write(repo.join("app.js"), "function ok() {\n  return 1;\n}\n").unwrap();
    git(repo, &["add", "."]);
    git(repo, &["commit", "-q", "-m", "base"]);
    let base_sha = git_output(repo, &["rev-parse", "HEAD"]);

    std::fs::write(
        repo.join("app.js"),
        "function unsafe(req) {\n  db.query(req.body);\n}\n",
    )
    .unwrap();
    git(repo, &["add", "."]);
    git(repo, &["commit", "-q", "-m", "add unsafe query"]);
    (dir, base_sha)
}

#[test]
fn validate_passes_on_a_clean_default_config() {
    let (dir, _base_sha) = init_repo_with_change();
    Command::cargo_bin("review-router")
        .unwrap()
        .args(["--config", "nonexistent.toml", "validate", "--repo"])
        .arg(dir.path())
        .assert()
        .success();
}

#[test]
fn review_dry_run_prints_the_unmitigated_sql_injection_finding() {
    let (dir, base_sha) = init_repo_with_change();
    Command::cargo_bin("review-router")
        .unwrap()
        .args(["--config", "nonexistent.toml", "review", "--repo"])
        .arg(dir.path())
        .args(["--range", &format!("{base_sha}..HEAD"), "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("app.js"));
}

#[test]
fn config_init_refuses_to_overwrite_without_force() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("router.toml");
    std::fs::write(&out, "# existing\n").unwrap();

    Command::cargo_bin("review-router")
        .unwrap()
        .args(["config", "init", "--output"])
        .arg(&out)
        .assert()
        .failure();

    Command::cargo_bin("review-router")
        .unwrap()
        .args(["config", "init", "--force", "--output"])
        .arg(&out)
        .assert()
        .success();
}
