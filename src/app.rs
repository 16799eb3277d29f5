use std::time::Duration;

use crate::config::{HarnessConfig, OutputFormat};
use crate::controller::{CheckpointController, ControllerError, RunSummary};
use crate::debugger::{DebuggerAdapter, ExitStatus, GdbAdapter};
use crate::expect::{self, ExpectError};
use crate::sink::{CapturingSink, JsonlSink, RecordSink, TextSink};

/// Process exit codes used by the harness itself
pub mod exit_code {
    /// Record lines differ from the expected output
    pub const MISMATCH: i32 = 1;
    /// Invalid command line or configuration
    pub const USAGE: i32 = 2;
    /// The target never ran: debugger, target, marker or formatter missing
    pub const SETUP: i32 = 125;
    /// The run was aborted after the target started
    pub const FATAL: i32 = 126;
    /// Added to the signal number when the target was killed by a signal
    pub const SIGNAL_BASE: i32 = 128;
}

/// Exit code mirroring how the target ended.
pub fn target_exit_code(status: &ExitStatus) -> i32 {
    match status {
        ExitStatus::Code { code } => *code,
        ExitStatus::Signalled { signal } => {
            exit_code::SIGNAL_BASE + signal_number(signal).unwrap_or(0)
        }
    }
}

#[cfg(unix)]
fn signal_number(name: &str) -> Option<i32> {
    let number = match name {
        "SIGHUP" => libc::SIGHUP,
        "SIGINT" => libc::SIGINT,
        "SIGQUIT" => libc::SIGQUIT,
        "SIGILL" => libc::SIGILL,
        "SIGTRAP" => libc::SIGTRAP,
        "SIGABRT" => libc::SIGABRT,
        "SIGBUS" => libc::SIGBUS,
        "SIGFPE" => libc::SIGFPE,
        "SIGKILL" => libc::SIGKILL,
        "SIGUSR1" => libc::SIGUSR1,
        "SIGSEGV" => libc::SIGSEGV,
        "SIGUSR2" => libc::SIGUSR2,
        "SIGPIPE" => libc::SIGPIPE,
        "SIGALRM" => libc::SIGALRM,
        "SIGTERM" => libc::SIGTERM,
        "SIGSYS" => libc::SIGSYS,
        _ => return None,
    };
    Some(number)
}

#[cfg(not(unix))]
fn signal_number(_name: &str) -> Option<i32> {
    None
}

/// One harness invocation: run the target, then check expectations.
pub struct App {
    config: HarnessConfig,
}

impl App {
    pub fn new(config: HarnessConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    fn gdb_adapter(&self) -> GdbAdapter {
        let adapter = match &self.config.gdb_path {
            Some(path) => GdbAdapter::with_path(path.clone()),
            None => GdbAdapter::new(),
        };
        adapter.with_timeout(Duration::from_millis(self.config.command_timeout_ms))
    }

    /// Run under gdb, writing to stdout. Returns the process exit code.
    pub async fn run(&self) -> i32 {
        let mut sink: Box<dyn RecordSink> = match self.config.output.format {
            OutputFormat::Text => Box::new(TextSink::stdout(self.config.output.prefix.clone())),
            OutputFormat::Jsonl => Box::new(JsonlSink::stdout()),
        };
        self.run_with(self.gdb_adapter(), sink.as_mut()).await
    }

    /// Run with any adapter and sink. Returns the process exit code.
    pub async fn run_with<A: DebuggerAdapter>(&self, adapter: A, sink: &mut dyn RecordSink) -> i32 {
        let mut controller = CheckpointController::new(adapter, self.config.plan());
        let mut capture = CapturingSink::new(sink);

        let outcome = controller.run(&mut capture).await;
        let lines = capture.into_lines();

        match outcome {
            Ok(summary) => self.finish_run(&summary, &lines),
            Err(err) => report_failure(&err),
        }
    }

    fn finish_run(&self, summary: &RunSummary, lines: &[String]) -> i32 {
        if !summary.exit.success() {
            eprintln!(
                "checkprobe: target ended with {} after {} checkpoint(s)",
                summary.exit, summary.records
            );
        }
        let code = target_exit_code(&summary.exit);

        let Some(expected_path) = &self.config.expect else {
            return code;
        };

        if self.config.update {
            return match expect::write_expected(expected_path, lines) {
                Ok(()) => {
                    eprintln!("checkprobe: updated {}", expected_path.display());
                    code
                }
                Err(e) => report_expect_error(&e),
            };
        }

        let expected = match expect::read_expected(expected_path) {
            Ok(expected) => expected,
            Err(e) => return report_expect_error(&e),
        };
        let mismatches = expect::compare_output(lines, &expected);
        if mismatches.is_empty() {
            return code;
        }

        tracing::info!(
            mismatches = mismatches.len(),
            expected = %expected_path.display(),
            "Output differs from expected"
        );
        eprintln!("checkprobe: output differs from {}", expected_path.display());
        for mismatch in &mismatches {
            eprintln!("{mismatch}");
        }
        exit_code::MISMATCH
    }
}

fn report_failure(err: &ControllerError) -> i32 {
    eprintln!("checkprobe: {err}");
    if err.is_setup() {
        exit_code::SETUP
    } else {
        exit_code::FATAL
    }
}

fn report_expect_error(err: &ExpectError) -> i32 {
    tracing::error!(error = %err, "Expected output unavailable");
    eprintln!("checkprobe: {err}");
    exit_code::FATAL
}
