//! Integration tests for exit codes and expected-output checks
//!
//! Tests the flow: HarnessConfig -> App -> controller -> expected file

use std::path::PathBuf;

use checkprobe::app::exit_code;
use checkprobe::config::{ConfigOverrides, HarnessConfig, TomlConfig};
use checkprobe::debugger::mock::{MockStartError, ScriptBuilder, ScriptedAdapter};
use checkprobe::sink::{MemorySink, TextSink};
use checkprobe::App;

use super::common::scenarios::vector_script;

fn config(expect: Option<PathBuf>, update: bool) -> HarnessConfig {
    let cli = ConfigOverrides {
        target: Some(PathBuf::from("/tmp/test_binary")),
        marker: Some("BREAK_HERE".into()),
        variable: Some("v".into()),
        formatter: vec!["builtin".into()],
        prefix: Some("@@@ ".into()),
        expect,
        update,
        ..ConfigOverrides::default()
    };
    HarnessConfig::resolve(TomlConfig::default(), cli).unwrap()
}

#[tokio::test]
async fn test_exit_code_follows_target() {
    let app = App::new(config(None, false));
    let script = ScriptBuilder::new("f").checkpoint("a", "v", "1").exit_code(3).build();
    let mut sink = MemorySink::new();
    assert_eq!(app.run_with(ScriptedAdapter::new(script), &mut sink).await, 3);
}

#[tokio::test]
async fn test_setup_failure_exit_code() {
    let app = App::new(config(None, false));
    let script = ScriptBuilder::new("f")
        .build()
        .failing_with(MockStartError::AttachDenied("ptrace: Operation not permitted.".into()));
    let mut sink = MemorySink::new();
    assert_eq!(
        app.run_with(ScriptedAdapter::new(script), &mut sink).await,
        exit_code::SETUP
    );
}

#[tokio::test]
async fn test_fatal_mid_run_exit_code() {
    let app = App::new(config(None, false));
    let script = ScriptBuilder::new("f")
        .checkpoint("a", "v", "1")
        .unreadable_tag()
        .build();
    let mut sink = MemorySink::new();
    assert_eq!(
        app.run_with(ScriptedAdapter::new(script), &mut sink).await,
        exit_code::FATAL
    );
    assert_eq!(sink.tags(), vec!["a"]);
}

/// Update mode writes the record lines, and a second run matches them
#[tokio::test]
async fn test_update_then_compare() {
    let dir = tempfile::tempdir().unwrap();
    let expected = dir.path().join("expected.txt");

    let app = App::new(config(Some(expected.clone()), true));
    let mut sink = MemorySink::new();
    let code = app
        .run_with(ScriptedAdapter::new(vector_script().build()), &mut sink)
        .await;
    assert_eq!(code, 0);

    let written = std::fs::read_to_string(&expected).unwrap();
    assert_eq!(written.lines().count(), 20);
    assert!(written.starts_with("TAG: empty\nPRINT: std::vector of length 0, capacity 0\n"));

    let app = App::new(config(Some(expected), false));
    let mut sink = MemorySink::new();
    let code = app
        .run_with(ScriptedAdapter::new(vector_script().build()), &mut sink)
        .await;
    assert_eq!(code, 0);
}

#[tokio::test]
async fn test_wildcard_expected_output() {
    let dir = tempfile::tempdir().unwrap();
    let expected = dir.path().join("expected.txt");
    std::fs::write(
        &expected,
        "TAG: growing\n\nPRINT: std::vector of length 2, capacity=* = {1, 2}\n",
    )
    .unwrap();

    let app = App::new(config(Some(expected), false));
    let script = ScriptBuilder::new("f")
        .checkpoint("growing", "v", "std::vector of length 2, capacity=2 = {1, 2}")
        .build();
    let mut sink = TextSink::new(Vec::new(), "@@@ ");
    let code = app.run_with(ScriptedAdapter::new(script), &mut sink).await;
    assert_eq!(code, 0);

    let out = String::from_utf8(sink.into_inner()).unwrap();
    assert_eq!(
        out,
        "@@@ TAG: growing\n@@@ PRINT: std::vector of length 2, capacity=2 = {1, 2}\n"
    );
}

#[tokio::test]
async fn test_mismatch_exit_code() {
    let dir = tempfile::tempdir().unwrap();
    let expected = dir.path().join("expected.txt");
    std::fs::write(&expected, "TAG: a\nPRINT: 1\nTAG: b\nPRINT: 2\n").unwrap();

    let app = App::new(config(Some(expected), false));
    let script = ScriptBuilder::new("f").checkpoint("a", "v", "1").build();
    let mut sink = MemorySink::new();
    let code = app.run_with(ScriptedAdapter::new(script), &mut sink).await;
    assert_eq!(code, exit_code::MISMATCH);
}

#[tokio::test]
async fn test_missing_expected_file() {
    let dir = tempfile::tempdir().unwrap();
    let app = App::new(config(Some(dir.path().join("absent.txt")), false));
    let script = ScriptBuilder::new("f").checkpoint("a", "v", "1").build();
    let mut sink = MemorySink::new();
    let code = app.run_with(ScriptedAdapter::new(script), &mut sink).await;
    assert_eq!(code, exit_code::FATAL);
}
