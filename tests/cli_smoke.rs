//! End-to-end tests for the `mimir` binary
//!
//! Each test points MIMIR_CONFIG, MIMIR_DB_PATH and MIMIR_DB_KEY into its
//! own temporary directory so nothing touches the real home directory.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::{tempdir, TempDir};

/// A `mimir` command isolated to `dir`.
fn mimir(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("mimir").expect("binary should build");
    cmd.env("MIMIR_CONFIG", dir.path().join("config.yaml"))
        .env("MIMIR_DB_PATH", dir.path().join("mimir.db"))
        .env("MIMIR_DB_KEY", "smoke-test-key")
        .env_remove("RUST_LOG")
        .env("NO_COLOR", "1");
    cmd
}

#[test]
fn test_status_on_fresh_database() {
    let dir = tempdir().unwrap();

    mimir(&dir)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Projects:  0"));

    assert!(dir.path().join("mimir.db").exists());
}

#[test]
fn test_missing_key_fails_with_hint() {
    let dir = tempdir().unwrap();

    mimir(&dir)
        .env_remove("MIMIR_DB_KEY")
        .arg("status")
        .assert()
        .failure()
        .stderr(predicate::str::contains("MIMIR_DB_KEY"));
}

#[test]
fn test_project_and_session_flow() {
    let dir = tempdir().unwrap();
    let project_dir = dir.path().join("demo");
    std::fs::create_dir(&project_dir).unwrap();
    std::fs::write(project_dir.join("go.mod"), "module demo\n").unwrap();

    mimir(&dir)
        .args(["projects", "add"])
        .arg(&project_dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("Registered project demo"));

    mimir(&dir)
        .args(["projects", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("demo").and(predicate::str::contains("go")));

    mimir(&dir)
        .args(["sessions", "create", "--project", "demo", "--agent", "coder"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created session"));

    let output = mimir(&dir)
        .args(["sessions", "list", "--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let sessions: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let session = &sessions[0];
    assert_eq!(session["status"], "created");
    assert_eq!(session["agent_type"], "coder");
    let id = session["id"].as_str().unwrap().to_string();

    mimir(&dir)
        .args(["sessions", "status", &id[..8], "active"])
        .assert()
        .success()
        .stdout(predicate::str::contains("created -> active"));

    mimir(&dir)
        .args(["sessions", "status", &id, "created"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("active").and(predicate::str::contains("created")));
}

#[test]
fn test_duplicate_project_name_is_rejected() {
    let dir = tempdir().unwrap();

    mimir(&dir)
        .args(["projects", "add", "/tmp/one", "--name", "api"])
        .assert()
        .success();

    mimir(&dir)
        .args(["projects", "add", "/tmp/two", "--name", "api"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already registered"));
}

#[test]
fn test_config_show_redacts_key() {
    let dir = tempdir().unwrap();

    mimir(&dir)
        .args(["config", "show", "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("smoke-test-key").not());
}

#[test]
fn test_config_validate_reports_parse_errors() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("config.yaml"), "server: [not, a, map]\n").unwrap();

    mimir(&dir)
        .args(["config", "validate"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to parse config file"));
}

#[test]
fn test_db_migrate_reports_version() {
    let dir = tempdir().unwrap();

    mimir(&dir)
        .args(["db", "migrate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Schema is at version 1"));
}

#[test]
fn test_status_lists_sessions_of_removed_project() {
    let dir = tempdir().unwrap();

    mimir(&dir)
        .args(["projects", "add", "/tmp/demo", "--name", "demo"])
        .assert()
        .success();
    mimir(&dir)
        .args(["sessions", "create", "--project", "demo", "--agent", "coder"])
        .assert()
        .success();
    mimir(&dir)
        .args(["projects", "remove", "demo"])
        .assert()
        .success();

    mimir(&dir)
        .arg("status")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("Projects:  0")
                .and(predicate::str::contains("Sessions:  1"))
                .and(predicate::str::contains("Recent sessions:"))
                .and(predicate::str::contains("(removed)")),
        );
}
