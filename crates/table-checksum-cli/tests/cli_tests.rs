//! CLI integration tests for table-checksum.
//!
//! These tests verify command-line argument parsing, help output,
//! and exit codes for error conditions that need no database.

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;

/// Get a command for the table-checksum binary.
fn cmd() -> Command {
    Command::cargo_bin("table-checksum").unwrap()
}

fn config_file(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

// =============================================================================
// Help and Version Tests
// =============================================================================

#[test]
fn test_help_shows_all_commands() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("verify"))
        .stdout(predicate::str::contains("health-check"));
}

#[test]
fn test_verify_subcommand_help() {
    cmd()
        .args(["verify", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--source"))
        .stdout(predicate::str::contains("--target"))
        .stdout(predicate::str::contains("--source-table"))
        .stdout(predicate::str::contains("--target-table"))
        .stdout(predicate::str::contains("--step"))
        .stdout(predicate::str::contains("--batching"))
        .stdout(predicate::str::contains("--digest-format"));
}

#[test]
fn test_health_check_subcommand_help() {
    cmd()
        .args(["health-check", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--source"))
        .stdout(predicate::str::contains("--target"));
}

#[test]
fn test_version_flag() {
    cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("table-checksum"));
}

// =============================================================================
// Global Flags Tests
// =============================================================================

#[test]
fn test_log_format_default() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--log-format"))
        .stdout(predicate::str::contains("[default: text]"));
}

#[test]
fn test_verbosity_default() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--verbosity"))
        .stdout(predicate::str::contains("[default: info]"));
}

#[test]
fn test_output_json_flag_exists() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--output-json"));
}

// =============================================================================
// Error Handling Tests
// =============================================================================

#[test]
fn test_no_subcommand_shows_usage() {
    cmd()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_missing_config_file_is_io_error() {
    cmd()
        .args(["--config", "/nonexistent/checksum.yaml", "verify"])
        .assert()
        .code(7)
        .stderr(predicate::str::contains("IO error"));
}

#[test]
fn test_invalid_yaml_is_config_error() {
    let file = config_file("source: [unclosed\n");
    cmd()
        .arg("--config")
        .arg(file.path())
        .arg("verify")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("YAML error"));
}

#[test]
fn test_zero_step_is_config_error() {
    let file = config_file(
        "source:\n  url: mysql://root@localhost:3306/test\nverify:\n  source_table: users\n",
    );
    cmd()
        .arg("--config")
        .arg(file.path())
        .args(["verify", "--step", "0"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("step"));
}

#[test]
fn test_verify_without_source_is_config_error() {
    cmd()
        .args(["verify", "--source-table", "users"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("--source is required"));
}

#[test]
fn test_verify_without_table_is_config_error() {
    cmd()
        .args(["verify", "--source", "mysql://root@localhost:3306/test"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("--source-table is required"));
}

#[test]
fn test_unknown_batching_rejected() {
    cmd()
        .args([
            "verify",
            "--source",
            "mysql://root@localhost/test",
            "--source-table",
            "users",
            "--batching",
            "diagonal",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("diagonal"));
}

#[test]
fn test_unknown_verbosity_is_config_error() {
    cmd()
        .args(["--verbosity", "loud", "verify"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("unknown verbosity"));
}

#[test]
fn test_malformed_url_is_setup_error() {
    cmd()
        .args(["verify", "--source", "not a url", "--source-table", "users"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Connection error"));
}
