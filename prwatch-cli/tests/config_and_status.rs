use std::fs;
use std::path::Path;
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use predicates::str::contains;
use prwatch_core::store::{config_path_at, load_settings_at, save_state_at};
use prwatch_core::types::{GroupId, SyncState};
use tempfile::TempDir;

fn prwatch_cmd(home: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_prwatch"));
    cmd.env("HOME", home)
        .env("USERPROFILE", home)
        .env("NO_COLOR", "1")
        .env("CLICOLOR", "0")
        .env_remove("CLICOLOR_FORCE")
        .env_remove("RUST_LOG");
    cmd
}

// ---------------------------------------------------------------------------
// repo
// ---------------------------------------------------------------------------

#[test]
fn repo_add_list_remove_round_trip() {
    let home = TempDir::new().expect("home");

    prwatch_cmd(home.path())
        .args(["repo", "add", "rust-lang/cargo"])
        .assert()
        .success()
        .stdout(contains("Added rust-lang/cargo"));
    prwatch_cmd(home.path())
        .args(["repo", "add", "tokio-rs/tokio"])
        .assert()
        .success();

    prwatch_cmd(home.path())
        .args(["repo", "list"])
        .assert()
        .success()
        .stdout(contains("rust-lang/cargo\ntokio-rs/tokio"));

    prwatch_cmd(home.path())
        .args(["repo", "remove", "rust-lang/cargo"])
        .assert()
        .success();

    let settings = load_settings_at(home.path()).expect("settings");
    assert_eq!(settings.repositories, vec!["tokio-rs/tokio".to_string()]);
}

#[test]
fn repo_add_rejects_malformed_and_duplicate_slugs() {
    let home = TempDir::new().expect("home");

    prwatch_cmd(home.path())
        .args(["repo", "add", "not-a-slug"])
        .assert()
        .failure()
        .stderr(contains("not-a-slug"));

    prwatch_cmd(home.path())
        .args(["repo", "add", "acme/api"])
        .assert()
        .success();
    prwatch_cmd(home.path())
        .args(["repo", "add", "acme/api"])
        .assert()
        .failure();

    assert_eq!(
        load_settings_at(home.path()).expect("settings").repositories,
        vec!["acme/api".to_string()]
    );
}

#[test]
fn repo_remove_unknown_fails() {
    let home = TempDir::new().expect("home");
    prwatch_cmd(home.path())
        .args(["repo", "remove", "acme/api"])
        .assert()
        .failure();
}

#[test]
fn repo_list_empty_prints_hint() {
    let home = TempDir::new().expect("home");
    prwatch_cmd(home.path())
        .args(["repo", "list"])
        .assert()
        .success()
        .stdout(contains("No repositories configured."));
}

// ---------------------------------------------------------------------------
// config
// ---------------------------------------------------------------------------

#[test]
fn config_show_redacts_token() {
    let home = TempDir::new().expect("home");
    prwatch_cmd(home.path())
        .args(["config", "set-token", "ghp_supersecretvalue"])
        .assert()
        .success();

    prwatch_cmd(home.path())
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(contains("ghp_…"))
        .stdout(contains("supersecret").not());
}

#[cfg(unix)]
#[test]
fn config_file_is_private() {
    use std::os::unix::fs::PermissionsExt;

    let home = TempDir::new().expect("home");
    prwatch_cmd(home.path())
        .args(["config", "set-token", "ghp_x"])
        .assert()
        .success();
    let mode = fs::metadata(config_path_at(home.path()))
        .expect("config metadata")
        .permissions()
        .mode();
    assert_eq!(mode & 0o777, 0o600);
}

#[test]
fn config_test_without_token_fails_with_hint() {
    let home = TempDir::new().expect("home");
    prwatch_cmd(home.path())
        .args(["config", "test"])
        .assert()
        .failure()
        .stderr(contains("no GitHub token configured"));
}

#[test]
fn failed_connection_test_does_not_save_candidate_token() {
    let home = TempDir::new().expect("home");
    let prwatch_dir = home.path().join(".prwatch");
    fs::create_dir_all(&prwatch_dir).expect("prwatch dir");
    fs::write(
        config_path_at(home.path()),
        "api_base: http://127.0.0.1:9\n",
    )
    .expect("config");

    prwatch_cmd(home.path())
        .args(["config", "test", "--token", "ghp_candidate"])
        .assert()
        .failure()
        .stderr(contains("connection test failed"));

    assert!(load_settings_at(home.path()).expect("settings").token.is_none());
}

// ---------------------------------------------------------------------------
// update / status
// ---------------------------------------------------------------------------

#[test]
fn update_without_configuration_is_a_noop() {
    let home = TempDir::new().expect("home");
    prwatch_cmd(home.path())
        .arg("update")
        .assert()
        .success()
        .stdout(contains("Nothing to do: no GitHub token configured."));
}

#[test]
fn dry_run_without_repositories_is_a_noop() {
    let home = TempDir::new().expect("home");
    prwatch_cmd(home.path())
        .args(["config", "set-token", "ghp_x"])
        .assert()
        .success();
    prwatch_cmd(home.path())
        .args(["update", "--dry-run"])
        .assert()
        .success()
        .stdout(contains("Nothing to do: no repositories configured."));
}

#[test]
fn status_reports_never_updated_and_stopped_daemon() {
    let home = TempDir::new().expect("home");
    prwatch_cmd(home.path())
        .args(["repo", "add", "acme/api"])
        .assert()
        .success();

    prwatch_cmd(home.path())
        .arg("status")
        .assert()
        .success()
        .stdout(contains("last update: never"))
        .stdout(contains("daemon stopped"))
        .stdout(contains("acme/api"));
}

#[test]
fn status_json_schema() {
    let home = TempDir::new().expect("home");
    prwatch_cmd(home.path())
        .args(["repo", "add", "acme/api"])
        .assert()
        .success();
    save_state_at(
        home.path(),
        &SyncState {
            group_id: Some(GroupId(42)),
            last_update: Some("2026-01-02T03:04:05Z".parse().expect("timestamp")),
        },
    )
    .expect("state");

    let output = prwatch_cmd(home.path())
        .args(["status", "--json"])
        .output()
        .expect("run status");
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).expect("status JSON");

    assert_eq!(json["token_configured"], serde_json::json!(false));
    assert_eq!(json["group_id"], serde_json::json!(42));
    assert_eq!(json["last_update"], serde_json::json!("2026-01-02T03:04:05Z"));
    assert_eq!(json["repositories"][0]["repository"], serde_json::json!("acme/api"));
    assert_eq!(json["repositories"][0]["valid"], serde_json::json!(true));
    assert_eq!(json["daemon"]["running"], serde_json::json!(false));
}

#[test]
fn daemon_status_when_not_running() {
    let home = TempDir::new().expect("home");
    prwatch_cmd(home.path())
        .args(["daemon", "status"])
        .assert()
        .success()
        .stdout(contains("\"running\": false"));
}
