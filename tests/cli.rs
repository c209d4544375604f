// ABOUTME: Integration tests for the catapult CLI commands.
// ABOUTME: Validates --help output, init, and failures that precede any storage call.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;

const BUCKET_VARS: [&str; 4] = [
    "CATAPULT_RELEASE_BUCKET",
    "CATAPULT_DEPLOY_BUCKET",
    "CATAPULT_AWS_PROFILE",
    "CATAPULT_AWS_MFA_DEVICE",
];

fn catapult_cmd() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("catapult"));
    for var in BUCKET_VARS {
        cmd.env_remove(var);
    }
    cmd
}

#[test]
fn help_shows_commands() {
    catapult_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("init"))
        .stdout(predicate::str::contains("release"))
        .stdout(predicate::str::contains("deploy"))
        .stdout(predicate::str::contains("projects"))
        .stdout(predicate::str::contains("resource"));
}

#[test]
fn deploy_help_mentions_rollback_flag() {
    catapult_cmd()
        .args(["deploy", "start", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--rollback"))
        .stdout(predicate::str::contains("--dry"));
}

#[test]
fn init_creates_config_file() {
    let temp_dir = tempfile::tempdir().unwrap();
    let config_path = temp_dir.path().join("catapult.yml");

    catapult_cmd()
        .current_dir(temp_dir.path())
        .args(["init", "--release-bucket", "acme-releases"])
        .assert()
        .success();

    assert!(config_path.exists(), "catapult.yml should be created");
    let content = fs::read_to_string(&config_path).unwrap();
    assert!(content.contains("release_bucket: acme-releases"));
    assert!(content.contains("deploy_bucket:"));
}

#[test]
fn init_refuses_to_overwrite_existing_config() {
    let temp_dir = tempfile::tempdir().unwrap();
    let config_path = temp_dir.path().join("catapult.yml");

    fs::write(&config_path, "release_bucket: mine").unwrap();

    catapult_cmd()
        .current_dir(temp_dir.path())
        .arg("init")
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));

    assert_eq!(fs::read_to_string(&config_path).unwrap(), "release_bucket: mine");
}

#[test]
fn release_without_bucket_fails() {
    let temp_dir = tempfile::tempdir().unwrap();

    catapult_cmd()
        .current_dir(temp_dir.path())
        .args(["--format", "human", "release", "current", "foo"])
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "missing required parameter: release_bucket",
        ));
}

#[test]
fn deploy_without_deploy_bucket_fails() {
    let temp_dir = tempfile::tempdir().unwrap();
    fs::write(temp_dir.path().join("catapult.yml"), "release_bucket: rel\n").unwrap();

    catapult_cmd()
        .current_dir(temp_dir.path())
        .args(["--format", "human", "deploy", "current", "foo", "staging"])
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "missing required parameter: deploy_bucket",
        ));
}

#[test]
fn deploy_bucket_from_environment_is_not_enough_without_release_bucket() {
    let temp_dir = tempfile::tempdir().unwrap();

    catapult_cmd()
        .current_dir(temp_dir.path())
        .env("CATAPULT_DEPLOY_BUCKET", "dep")
        .args(["--format", "human", "deploy", "ls", "foo", "staging"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("release_bucket"));
}

#[test]
fn explicit_missing_config_fails() {
    let temp_dir = tempfile::tempdir().unwrap();

    catapult_cmd()
        .current_dir(temp_dir.path())
        .args(["--config", "absent.yml", "--format", "human", "projects"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("configuration file not found"));
}

#[test]
fn json_format_reports_errors_as_events() {
    let temp_dir = tempfile::tempdir().unwrap();

    catapult_cmd()
        .current_dir(temp_dir.path())
        .args(["--format", "json", "release", "current", "foo"])
        .assert()
        .failure()
        .stderr(predicate::str::contains(r#""event":"error""#));
}

#[test]
fn image_flags_conflict() {
    catapult_cmd()
        .args(["release", "new", "foo", "--image", "sha256:ab", "--no-image"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used with"));
}

#[test]
fn release_new_requires_an_image_choice() {
    catapult_cmd()
        .args(["release", "new", "foo"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("required arguments were not provided"))
        .stderr(predicate::str::contains("--no-image"));
}

#[test]
fn release_new_help_mentions_rollback_flag() {
    catapult_cmd()
        .args(["release", "new", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--rollback"))
        .stdout(predicate::str::contains("--no-image"));
}

#[test]
fn release_help_lists_find_and_log() {
    catapult_cmd()
        .args(["release", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("find"))
        .stdout(predicate::str::contains("log"));
}

#[test]
fn release_log_needs_a_range() {
    catapult_cmd()
        .args(["release", "log", "foo"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("<RANGE>"));
}

#[test]
fn resource_check_rejects_malformed_request() {
    catapult_cmd()
        .args(["--format", "human", "resource", "check"])
        .write_stdin("not json")
        .assert()
        .failure()
        .stderr(predicate::str::contains("JSON error"));
}

#[test]
fn resource_deploy_source_without_deploys_bucket_fails() {
    let request = r#"{"source": {"app_name": "foo", "bucket": "rel", "environment": "staging"}}"#;

    catapult_cmd()
        .args(["--format", "human", "resource", "check"])
        .write_stdin(request)
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "missing required parameter: deploys_bucket",
        ));
}
