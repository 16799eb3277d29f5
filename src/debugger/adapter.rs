use std::fmt;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::Serialize;

use crate::debugger::error::DebuggerError;

/// Which debugger backend an adapter drives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdapterKind {
    Gdb,
    Scripted,
}

impl AdapterKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdapterKind::Gdb => "gdb",
            AdapterKind::Scripted => "scripted",
        }
    }
}

impl fmt::Display for AdapterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The process to inspect
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetSpec {
    /// Launch an executable under the debugger
    Launch { path: PathBuf, args: Vec<String> },
    /// Attach to a process that is already running
    Attach { pid: u32 },
}

impl fmt::Display for TargetSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetSpec::Launch { path, .. } => write!(f, "{}", path.display()),
            TargetSpec::Attach { pid } => write!(f, "pid {pid}"),
        }
    }
}

/// Where the value-formatting layer comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatterSource {
    /// Whatever printers the debugger ships with
    Builtin,
    /// Printer scripts to load before the run
    Scripts(Vec<PathBuf>),
}

/// How the target ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExitStatus {
    Code { code: i32 },
    Signalled { signal: String },
}

impl ExitStatus {
    pub fn success(&self) -> bool {
        matches!(self, ExitStatus::Code { code: 0 })
    }
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitStatus::Code { code } => write!(f, "exit code {code}"),
            ExitStatus::Signalled { signal } => write!(f, "signal {signal}"),
        }
    }
}

/// The target is suspended on entry to the marker function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopContext {
    /// Increments on every stop; handles from older stops are stale.
    pub generation: u64,
    pub thread_id: u32,
}

/// Handle to one activation record, valid until the target resumes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameRef {
    pub generation: u64,
    pub thread_id: u32,
    pub depth: u32,
    pub function: Option<String>,
}

/// Opaque reference to a named value inside a frame, handed to the formatter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableHandle {
    pub frame: FrameRef,
    pub name: String,
}

/// Something the debugger reported while the target was running
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DebugEvent {
    Intercepted(StopContext),
    /// A line the target wrote to the shared terminal
    TargetOutput(String),
    Exited(ExitStatus),
}

/// Proof that the controller decided to let the target continue.
///
/// The only way to obtain one is to finish handling an interception, and the
/// only thing to do with it is hand it to [`DebuggerAdapter::resume`].
#[derive(Debug, PartialEq, Eq)]
#[must_use = "the target stays suspended until the resume token is used"]
pub struct Resume(());

impl Resume {
    pub(crate) fn new() -> Self {
        Resume(())
    }
}

/// Capability interface the checkpoint controller drives.
///
/// Implementations own the debugging session: it exists between `attach` and
/// `shutdown` and is never shared.
#[async_trait]
pub trait DebuggerAdapter: Send {
    fn kind(&self) -> AdapterKind;

    /// Create the session and bind it to the target.
    async fn attach(
        &mut self,
        target: &TargetSpec,
        formatter: &FormatterSource,
    ) -> Result<(), DebuggerError>;

    /// Stop the target on every entry to `marker`.
    async fn install_intercept(&mut self, marker: &str) -> Result<(), DebuggerError>;

    /// Let the target run until its first event.
    async fn start(&mut self) -> Result<(), DebuggerError>;

    /// Block until the next interception, output line, or exit.
    async fn next_event(&mut self) -> Result<DebugEvent, DebuggerError>;

    /// Read the tag argument from the marker's own frame.
    async fn read_tag(&mut self, stop: &StopContext) -> Result<String, DebuggerError>;

    /// Frame `depth` levels above the marker.
    async fn resolve_frame(
        &mut self,
        stop: &StopContext,
        depth: u32,
    ) -> Result<FrameRef, DebuggerError>;

    async fn resolve_variable(
        &mut self,
        frame: &FrameRef,
        name: &str,
    ) -> Result<VariableHandle, DebuggerError>;

    /// Render a value through the formatting layer.
    async fn format_value(&mut self, handle: &VariableHandle) -> Result<String, DebuggerError>;

    async fn resume(&mut self, token: Resume) -> Result<(), DebuggerError>;

    /// Tear the session down. Safe to call after the target exited.
    async fn shutdown(&mut self) -> Result<(), DebuggerError>;
}
