//! Integration tests for the dues-ledger CLI.
//!
//! These tests run the actual binary against event-log fixtures and verify
//! the snapshot output.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;

/// Get path to test data file
fn test_data_path(filename: &str) -> String {
    format!("tests/data/{}", filename)
}

/// Run the binary against the given event log and return stdout
fn run_ledger(input_file: &str) -> String {
    let mut cmd = Command::cargo_bin("dues-ledger").unwrap();
    let assert = cmd
        .args(["-if", input_file])
        .assert()
        .success();
    String::from_utf8(assert.get_output().stdout.clone()).unwrap()
}

#[test]
fn test_basic_log_matches_expected_snapshot() {
    let output = run_ledger(&test_data_path("sample_basic.dsv"));
    let expected = fs::read_to_string(test_data_path("expected_basic.dsv")).unwrap();
    assert_eq!(output, expected);
}

#[test]
fn test_assertion_checkpoints_pass() {
    let output = run_ledger(&test_data_path("sample_assertions.dsv"));
    let expected = fs::read_to_string(test_data_path("expected_assertions.dsv")).unwrap();
    assert_eq!(output, expected);
}

#[test]
fn test_failing_assertion_aborts_run() {
    let mut cmd = Command::cargo_bin("dues-ledger").unwrap();
    cmd.args(["-if", &test_data_path("sample_failing_assertion.dsv")])
        .assert()
        .failure()
        .stdout(predicate::str::is_empty())
        .stderr(
            predicate::str::contains("hacker1")
                .and(predicate::str::contains("balance should have been settled")),
        );
}

#[test]
fn test_no_snapshot_file_written_on_failure() {
    let dir = tempfile::tempdir().unwrap();
    let out_path = dir.path().join("snapshot.dsv");

    let mut cmd = Command::cargo_bin("dues-ledger").unwrap();
    cmd.args([
        "-if",
        &test_data_path("sample_failing_assertion.dsv"),
        "-of",
        out_path.to_str().unwrap(),
    ])
    .assert()
    .failure();

    assert!(!out_path.exists());
}

#[test]
fn test_output_file_written_on_success() {
    let dir = tempfile::tempdir().unwrap();
    let out_path = dir.path().join("snapshot.dsv");

    let mut cmd = Command::cargo_bin("dues-ledger").unwrap();
    cmd.args([
        "-if",
        &test_data_path("sample_basic.dsv"),
        "-of",
        out_path.to_str().unwrap(),
    ])
    .assert()
    .success()
    .stdout(predicate::str::is_empty());

    let written = fs::read_to_string(&out_path).unwrap();
    let expected = fs::read_to_string(test_data_path("expected_basic.dsv")).unwrap();
    assert_eq!(written, expected);
}

#[test]
fn test_reads_stdin_by_default() {
    let mut cmd = Command::cargo_bin("dues-ledger").unwrap();
    cmd.write_stdin("2020-01-01;newMember;hacker1;\n")
        .assert()
        .success()
        .stdout("hacker1;0\n");
}

#[test]
fn test_missing_input_file_error() {
    let mut cmd = Command::cargo_bin("dues-ledger").unwrap();
    cmd.args(["-if", "nonexistent.dsv"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error"));
}

#[test]
fn test_unexpected_argument_error() {
    let mut cmd = Command::cargo_bin("dues-ledger").unwrap();
    cmd.arg("--bogus")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_unknown_event_kind_diagnostic() {
    let mut cmd = Command::cargo_bin("dues-ledger").unwrap();
    cmd.write_stdin("2020-01-01;timeTravel;;\n")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown event kind `timeTravel`"));
}
