//! End-to-end runs against the fixture binaries under a real gdb
//!
//! Ignored by default; run with `cargo test --test integration_tests -- --ignored`
//! on a machine with gdb and ptrace permission.

use assert_cmd::Command;
use serde_json::Value;

use checkprobe::marker::RUST_MARKER;

use super::common::scenarios::{STRING_TAGS, VECTOR_TAGS};

fn run_fixture(fixture: &str, variable: &str) -> (Vec<Value>, i32) {
    let logs = tempfile::tempdir().unwrap();
    let output = Command::cargo_bin("checkprobe")
        .unwrap()
        .arg("--log-file")
        .arg(logs.path().join("checkprobe.log"))
        .arg("--target")
        .arg(fixture)
        .args(["--marker", RUST_MARKER, "--variable", variable])
        .args(["--formatter", "builtin", "--format", "jsonl"])
        .output()
        .unwrap();

    let records = String::from_utf8(output.stdout)
        .unwrap()
        .lines()
        .filter_map(|line| serde_json::from_str::<Value>(line).ok())
        .filter(|line| line["type"] == "record")
        .collect();
    (records, output.status.code().unwrap_or(-1))
}

fn tags(records: &[Value]) -> Vec<&str> {
    records.iter().filter_map(|r| r["tag"].as_str()).collect()
}

#[test]
#[ignore = "requires gdb"]
fn test_vector_fixture_under_gdb() {
    let (records, code) = run_fixture(env!("CARGO_BIN_EXE_fixture-vector"), "v");
    assert_eq!(code, 0);
    assert_eq!(tags(&records), VECTOR_TAGS.to_vec());
    assert!(records.iter().all(|r| r["status"] == "ok"), "{records:?}");

    let after_assign = records[4]["value"].as_str().unwrap();
    for item in ["100", "200", "300", "400", "500"] {
        assert!(after_assign.contains(item), "{after_assign}");
    }
}

#[test]
#[ignore = "requires gdb"]
fn test_string_fixture_under_gdb() {
    let (records, code) = run_fixture(env!("CARGO_BIN_EXE_fixture-string"), "s");
    assert_eq!(code, 0);
    assert_eq!(tags(&records), STRING_TAGS.to_vec());
    assert!(records.iter().all(|r| r["status"] == "ok"), "{records:?}");
}

#[test]
#[ignore = "requires gdb"]
fn test_missing_variable_under_gdb() {
    let (records, code) = run_fixture(env!("CARGO_BIN_EXE_fixture-vector"), "not_a_variable");
    assert_eq!(code, 0);
    assert_eq!(records.len(), VECTOR_TAGS.len());
    assert!(records.iter().all(|r| r["status"] == "error"));
}

#[test]
#[ignore = "requires gdb"]
fn test_rerun_yields_same_tags() {
    let fixture = env!("CARGO_BIN_EXE_fixture-vector");
    let (first, _) = run_fixture(fixture, "v");
    let (second, _) = run_fixture(fixture, "v");
    assert_eq!(tags(&first), tags(&second));
}
