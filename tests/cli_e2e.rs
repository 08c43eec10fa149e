//! End-to-end CLI tests for the tubedl binary.
//!
//! These never reach the network or the extraction engine: they exercise
//! argument handling and the configuration guard rails that run before any
//! download starts.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Test that --help displays usage information and exits with code 0.
#[test]
fn test_binary_help_displays_usage() {
    let mut cmd = Command::cargo_bin("tubedl").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Download online media"))
        .stdout(predicate::str::contains("download"));
}

/// Test that --version displays version and exits with code 0.
#[test]
fn test_binary_version_displays_version() {
    let mut cmd = Command::cargo_bin("tubedl").unwrap();
    cmd.arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("tubedl"));
}

/// Test that running without a subcommand fails with usage output.
#[test]
fn test_binary_requires_subcommand() {
    let mut cmd = Command::cargo_bin("tubedl").unwrap();
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

/// Test that download without a URL fails to parse.
#[test]
fn test_download_requires_url() {
    let mut cmd = Command::cargo_bin("tubedl").unwrap();
    cmd.arg("download")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

/// Test that invalid flags cause non-zero exit.
#[test]
fn test_binary_invalid_flag_returns_error() {
    let mut cmd = Command::cargo_bin("tubedl").unwrap();
    cmd.args(["download", "https://example.com/v1", "--invalid-flag"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

/// With no config file and no --format, the run fails before the engine is
/// ever needed.
#[test]
fn test_download_without_config_reports_missing_format() {
    let temp = TempDir::new().unwrap();
    let mut cmd = Command::cargo_bin("tubedl").unwrap();
    cmd.current_dir(temp.path())
        .args(["download", "https://example.com/v1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no output format"));
}

/// A format alone is not enough: a local destination needs a directory.
#[test]
fn test_download_without_directory_reports_missing_output() {
    let temp = TempDir::new().unwrap();
    let mut cmd = Command::cargo_bin("tubedl").unwrap();
    cmd.current_dir(temp.path())
        .args(["download", "https://example.com/v1", "--format", "mp4"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no output directory"));
}

/// --dest-type validates its value at parse time.
#[test]
fn test_download_rejects_unknown_destination() {
    let mut cmd = Command::cargo_bin("tubedl").unwrap();
    cmd.args(["download", "https://example.com/v1", "--dest-type", "ftp"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid value"));
}
