//! The gdb adapter against a stand-in gdb speaking MI
//!
//! Tests the flow: GdbAdapter -> MI over pipes -> CheckpointController -> sink

use std::path::Path;
use std::time::Duration;

use checkprobe::controller::{CheckpointController, ControllerError, InspectionPlan};
use checkprobe::debugger::{ExitStatus, FormatterSource, GdbAdapter, TargetSpec};
use checkprobe::record::InspectionRecord;
use checkprobe::sink::MemorySink;
use checkprobe::RunSummary;

use super::common::fake_gdb::{commands, line, partial, raw, FakeGdb, HIT};
use super::common::scenarios::MARKER;

async fn run_against(
    gdb: &FakeGdb,
    dir: &Path,
) -> (Result<RunSummary, ControllerError>, MemorySink) {
    run_at_depth(gdb, dir, 1).await
}

async fn run_at_depth(
    gdb: &FakeGdb,
    dir: &Path,
    frame_depth: u32,
) -> (Result<RunSummary, ControllerError>, MemorySink) {
    let gdb_path = gdb.install(dir);
    let plan = InspectionPlan {
        // Only has to exist; the stand-in never runs it.
        target: TargetSpec::Launch {
            path: gdb_path.clone(),
            args: vec![],
        },
        formatter: FormatterSource::Builtin,
        marker: MARKER.to_string(),
        variable: "v".to_string(),
        frame_depth,
    };
    let adapter = GdbAdapter::with_path(gdb_path).with_timeout(Duration::from_secs(5));
    let mut controller = CheckpointController::new(adapter, plan);
    let mut sink = MemorySink::new();

    let result = tokio::time::timeout(Duration::from_secs(20), controller.run(&mut sink))
        .await
        .expect("run should not hang");
    (result, sink)
}

#[tokio::test]
async fn test_tags_and_values_over_mi() {
    let dir = tempfile::tempdir().unwrap();
    let gdb = FakeGdb::new().hit("first").hit("second");

    let (result, sink) = run_against(&gdb, dir.path()).await;
    let summary = result.unwrap();

    assert_eq!(summary.records, 2);
    assert_eq!(summary.exit, ExitStatus::Code { code: 0 });
    assert_eq!(
        sink.records,
        vec![
            (1, InspectionRecord::printed("first", "42")),
            (2, InspectionRecord::printed("second", "42")),
        ]
    );

    let sent = commands(dir.path());
    assert!(sent.contains(&"-gdb-set print elements unlimited".to_string()));
    assert!(sent.contains(&"-gdb-set print repeats unlimited".to_string()));
    assert!(sent.contains(&"-break-insert BREAK_HERE".to_string()));
    assert!(sent.contains(&"-stack-info-depth --thread 1 2".to_string()));
    assert_eq!(sent.last().map(String::as_str), Some("-gdb-exit"));
}

/// Bytes that are not UTF-8 are passed on, not treated as a lost session
#[tokio::test]
async fn test_invalid_utf8_output_keeps_session() {
    let dir = tempfile::tempdir().unwrap();
    let gdb = FakeGdb::new()
        .stop("first", vec![raw(r"bad \377 byte\n"), line(HIT)])
        .hit("second");

    let (result, sink) = run_against(&gdb, dir.path()).await;
    let summary = result.unwrap();

    assert_eq!(summary.records, 2);
    assert_eq!(sink.tags(), vec!["first", "second"]);
    assert_eq!(sink.target_output, vec!["bad \u{FFFD} byte"]);
}

/// A stop record glued to unterminated target output is still seen
#[tokio::test]
async fn test_stop_after_partial_output_line() {
    let dir = tempfile::tempdir().unwrap();
    let gdb = FakeGdb::new()
        .stop("first", vec![partial("progress: "), line(HIT)])
        .hit("second");

    let (result, sink) = run_against(&gdb, dir.path()).await;
    let summary = result.unwrap();

    assert_eq!(summary.records, 2);
    assert_eq!(sink.records[0].1, InspectionRecord::printed("first", "42"));
    assert_eq!(sink.target_output, vec!["progress: "]);
}

#[tokio::test]
async fn test_shallow_stack_is_frame_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let gdb = FakeGdb::new()
        .reply("-stack-info-depth", r#"^done,depth="1""#)
        .hit("first");

    let (result, sink) = run_against(&gdb, dir.path()).await;
    let summary = result.unwrap();

    assert_eq!(summary.failures, 1);
    assert_eq!(
        sink.records[0].1,
        InspectionRecord::error("first", "No frame at depth 1 (stack has 1)")
    );
    let sent = commands(dir.path());
    assert!(!sent.iter().any(|c| c.starts_with("-stack-list-variables")));
}

#[tokio::test]
async fn test_deepest_frame_depth_does_not_overflow() {
    let dir = tempfile::tempdir().unwrap();
    let gdb = FakeGdb::new().hit("first");

    let (result, sink) = run_at_depth(&gdb, dir.path(), u32::MAX).await;
    result.unwrap();

    assert_eq!(
        sink.records[0].1,
        InspectionRecord::error("first", "No frame at depth 4294967295 (stack has 3)")
    );
    let sent = commands(dir.path());
    assert!(sent.contains(&"-stack-info-depth --thread 1 4294967295".to_string()));
}

#[tokio::test]
async fn test_evaluation_error_is_format_failure() {
    let dir = tempfile::tempdir().unwrap();
    let gdb = FakeGdb::new()
        .reply(
            "-data-evaluate-expression",
            r#"^error,msg="Python Exception <class 'gdb.MemoryError'>: Cannot access memory""#,
        )
        .hit("first")
        .hit("second");

    let (result, sink) = run_against(&gdb, dir.path()).await;
    let summary = result.unwrap();

    assert_eq!(summary.records, 2);
    assert_eq!(summary.failures, 2);
    assert_eq!(
        sink.records[0].1,
        InspectionRecord::error(
            "first",
            "Python Exception <class 'gdb.MemoryError'>: Cannot access memory"
        )
    );
}

#[tokio::test]
async fn test_error_value_is_unreadable() {
    let dir = tempfile::tempdir().unwrap();
    let gdb = FakeGdb::new()
        .reply(
            "-data-evaluate-expression",
            r#"^done,value="<error: Cannot access memory at address 0x0>""#,
        )
        .hit("first");

    let (result, sink) = run_against(&gdb, dir.path()).await;
    result.unwrap();

    assert_eq!(
        sink.records[0].1,
        InspectionRecord::error(
            "first",
            "Value unreadable: <error: Cannot access memory at address 0x0>"
        )
    );
}

/// A fatal signal ends the run with the records so far and kills the target
#[tokio::test]
async fn test_signal_received_kills_target() {
    let dir = tempfile::tempdir().unwrap();
    let signal = r#"*stopped,reason="signal-received",signal-name="SIGSEGV",signal-meaning="Segmentation fault",thread-id="1""#;
    let gdb = FakeGdb::new().hit("first").stop("", vec![line(signal)]);

    let (result, sink) = run_against(&gdb, dir.path()).await;
    let summary = result.unwrap();

    assert_eq!(
        summary.exit,
        ExitStatus::Signalled {
            signal: "SIGSEGV".into()
        }
    );
    assert_eq!(sink.tags(), vec!["first"]);
    let sent = commands(dir.path());
    assert!(sent.contains(&"-interpreter-exec console kill".to_string()));
}

/// Stops that are not ours are continued without a record
#[tokio::test]
async fn test_foreign_stop_is_continued() {
    let dir = tempfile::tempdir().unwrap();
    let stepped = r#"*stopped,reason="end-stepping-range",thread-id="1""#;
    let gdb = FakeGdb::new().stop("", vec![line(stepped)]).hit("first");

    let (result, sink) = run_against(&gdb, dir.path()).await;
    let summary = result.unwrap();

    assert_eq!(summary.records, 1);
    assert_eq!(sink.tags(), vec!["first"]);
    let continues = commands(dir.path())
        .iter()
        .filter(|c| c.as_str() == "-exec-continue")
        .count();
    // one for the foreign stop, one to resume from "first"
    assert_eq!(continues, 2);
}
