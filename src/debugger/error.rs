use std::io;

use crate::debugger::mi::MiParseError;

/// Errors raised by a debugger adapter.
///
/// The controller decides which of these are fatal and which are folded into a
/// single inspection record; the adapter only reports what went wrong.
#[derive(Debug, thiserror::Error)]
pub enum DebuggerError {
    #[error("Debugger binary not found: {0}")]
    BinaryNotFound(String),

    #[error("Failed to spawn debugger process")]
    ProcessSpawnFailed,

    #[error("Failed to capture debugger stdout")]
    StdoutCaptureFailed,

    #[error("Target not found: {0}")]
    TargetNotFound(String),

    #[error("Attach failed: {0}")]
    AttachFailed(String),

    #[error("Marker function not found: {0}")]
    MarkerNotFound(String),

    #[error("Formatter setup failed: {0}")]
    FormatterSetup(String),

    #[error("Tag unreadable: {0}")]
    TagUnreadable(String),

    #[error("No frame at depth {depth} (stack has {available})")]
    FrameNotFound { depth: u32, available: u32 },

    #[error("Stale frame handle from stop #{handle} (current stop #{current})")]
    StaleFrame { handle: u64, current: u64 },

    #[error("No symbol \"{name}\" in frame #{depth}")]
    VariableNotFound { name: String, depth: u32 },

    #[error("{0}")]
    FormatFailed(String),

    #[error("Value unreadable: {0}")]
    ValueUnreadable(String),

    #[error("Debugger command failed: {0}")]
    Command(String),

    #[error("Malformed debugger output: {0}")]
    Protocol(#[from] MiParseError),

    #[error("Timed out after {0}ms waiting for the debugger")]
    Timeout(u64),

    #[error("Debugger channel closed")]
    ChannelClosed,

    #[error("No active debugging session")]
    NoSession,

    #[error("Not supported: {0}")]
    NotSupported(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl DebuggerError {
    /// Whether this error is confined to the value being inspected at one
    /// checkpoint, as opposed to the debugging session itself.
    pub fn is_per_checkpoint(&self) -> bool {
        matches!(
            self,
            DebuggerError::FrameNotFound { .. }
                | DebuggerError::VariableNotFound { .. }
                | DebuggerError::FormatFailed(_)
                | DebuggerError::ValueUnreadable(_)
                | DebuggerError::Command(_)
        )
    }
}
