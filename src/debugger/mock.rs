//! Scripted debugger adapter for deterministic testing
//!
//! Implements [`DebuggerAdapter`] by replaying a fixed script of checkpoint
//! stops, target output and a final exit, without spawning a debugger. Every
//! call is captured so tests can assert on how the controller drove the
//! session.
//!
//! # Example
//! ```no_run
//! use checkprobe::debugger::mock::{ScriptBuilder, ScriptedAdapter};
//!
//! let script = ScriptBuilder::new("test_vector_int")
//!     .checkpoint("empty", "v", "std::vector of length 0, capacity 0")
//!     .checkpoint("push_back_one", "v", "std::vector of length 1, capacity 1 = {10}")
//!     .exit_code(0)
//!     .build();
//! let adapter = ScriptedAdapter::new(script);
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::debugger::adapter::{
    AdapterKind, DebugEvent, DebuggerAdapter, ExitStatus, FormatterSource, FrameRef, Resume,
    StopContext, TargetSpec, VariableHandle,
};
use crate::debugger::error::DebuggerError;

/// Type of error to simulate when binding to the target
#[derive(Clone, Debug)]
pub enum MockStartError {
    TargetNotFound(String),
    AttachDenied(String),
    FormatterSetup(String),
}

impl MockStartError {
    fn into_debugger_error(self) -> DebuggerError {
        match self {
            MockStartError::TargetNotFound(msg) => DebuggerError::TargetNotFound(msg),
            MockStartError::AttachDenied(msg) => DebuggerError::AttachFailed(msg),
            MockStartError::FormatterSetup(msg) => DebuggerError::FormatterSetup(msg),
        }
    }
}

/// What the formatting layer does with one variable
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScriptedValue {
    Text(String),
    FormatError(String),
    Unreadable(String),
    /// The debugger goes away while formatting
    SessionLost,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ScriptedFrame {
    pub function: String,
    pub variables: Vec<(String, ScriptedValue)>,
}

impl ScriptedFrame {
    pub fn new(function: impl Into<String>) -> Self {
        Self {
            function: function.into(),
            variables: Vec::new(),
        }
    }

    pub fn with_value(mut self, name: impl Into<String>, text: impl Into<String>) -> Self {
        self.variables
            .push((name.into(), ScriptedValue::Text(text.into())));
        self
    }

    pub fn with_format_error(mut self, name: impl Into<String>, msg: impl Into<String>) -> Self {
        self.variables
            .push((name.into(), ScriptedValue::FormatError(msg.into())));
        self
    }

    pub fn with_unreadable(mut self, name: impl Into<String>, msg: impl Into<String>) -> Self {
        self.variables
            .push((name.into(), ScriptedValue::Unreadable(msg.into())));
        self
    }

    fn lookup(&self, name: &str) -> Option<&ScriptedValue> {
        self.variables
            .iter()
            .find(|(var, _)| var == name)
            .map(|(_, value)| value)
    }
}

/// One stop on the marker. `frames[0]` is the marker itself.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScriptedStop {
    /// `None` simulates a marker whose argument cannot be read
    pub tag: Option<String>,
    pub frames: Vec<ScriptedFrame>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScriptStep {
    Stop(ScriptedStop),
    Output(String),
}

/// Configuration for scripted adapter behavior
#[derive(Clone, Debug)]
pub struct ScriptConfig {
    pub steps: Vec<ScriptStep>,
    /// How the target ends once the steps run out
    pub exit: ExitStatus,
    pub start_error: Option<MockStartError>,
    /// Makes `install_intercept` fail as if the marker symbol were missing
    pub missing_marker: bool,
}

impl Default for ScriptConfig {
    fn default() -> Self {
        Self {
            steps: Vec::new(),
            exit: ExitStatus::Code { code: 0 },
            start_error: None,
            missing_marker: false,
        }
    }
}

impl ScriptConfig {
    pub fn failing_with(mut self, error: MockStartError) -> Self {
        self.start_error = Some(error);
        self
    }

    pub fn without_marker(mut self) -> Self {
        self.missing_marker = true;
        self
    }
}

/// Builder for checkpoint scripts
pub struct ScriptBuilder {
    marker: String,
    caller: String,
    steps: Vec<ScriptStep>,
    exit: ExitStatus,
}

impl ScriptBuilder {
    /// `caller` names the function that calls the marker.
    pub fn new(caller: impl Into<String>) -> Self {
        Self {
            marker: "BREAK_HERE".to_string(),
            caller: caller.into(),
            steps: Vec::new(),
            exit: ExitStatus::Code { code: 0 },
        }
    }

    fn stop_with(mut self, tag: Option<&str>, caller: ScriptedFrame) -> Self {
        let frames = vec![
            ScriptedFrame::new(self.marker.clone()),
            caller,
            ScriptedFrame::new("main"),
        ];
        self.steps.push(ScriptStep::Stop(ScriptedStop {
            tag: tag.map(str::to_string),
            frames,
        }));
        self
    }

    /// A checkpoint where `var` formats to `text`.
    pub fn checkpoint(self, tag: &str, var: &str, text: &str) -> Self {
        let frame = ScriptedFrame::new(self.caller.clone()).with_value(var, text);
        self.stop_with(Some(tag), frame)
    }

    pub fn format_failure(self, tag: &str, var: &str, msg: &str) -> Self {
        let frame = ScriptedFrame::new(self.caller.clone()).with_format_error(var, msg);
        self.stop_with(Some(tag), frame)
    }

    pub fn unreadable(self, tag: &str, var: &str, msg: &str) -> Self {
        let frame = ScriptedFrame::new(self.caller.clone()).with_unreadable(var, msg);
        self.stop_with(Some(tag), frame)
    }

    /// A checkpoint where the debugger dies while formatting `var`.
    pub fn session_lost(self, tag: &str, var: &str) -> Self {
        let mut frame = ScriptedFrame::new(self.caller.clone());
        frame
            .variables
            .push((var.to_string(), ScriptedValue::SessionLost));
        self.stop_with(Some(tag), frame)
    }

    /// A checkpoint whose caller has no variables at all.
    pub fn missing_variable(self, tag: &str) -> Self {
        let frame = ScriptedFrame::new(self.caller.clone());
        self.stop_with(Some(tag), frame)
    }

    /// A marker call whose tag argument cannot be read.
    pub fn unreadable_tag(self) -> Self {
        let frame = ScriptedFrame::new(self.caller.clone());
        self.stop_with(None, frame)
    }

    pub fn output(mut self, line: &str) -> Self {
        self.steps.push(ScriptStep::Output(line.to_string()));
        self
    }

    pub fn exit_code(mut self, code: i32) -> Self {
        self.exit = ExitStatus::Code { code };
        self
    }

    pub fn signalled(mut self, signal: &str) -> Self {
        self.exit = ExitStatus::Signalled {
            signal: signal.to_string(),
        };
        self
    }

    pub fn build(self) -> ScriptConfig {
        ScriptConfig {
            steps: self.steps,
            exit: self.exit,
            ..ScriptConfig::default()
        }
    }
}

/// A call made on the scripted adapter, in order
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AdapterCall {
    Attach(String),
    InstallIntercept(String),
    Start,
    ReadTag { generation: u64 },
    ResolveFrame { generation: u64, depth: u32 },
    ResolveVariable { depth: u32, name: String },
    FormatValue { name: String },
    Resume { generation: u64 },
    Shutdown,
}

/// Shared view of captured calls that outlives the adapter
#[derive(Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<AdapterCall>>>);

impl CallLog {
    fn push(&self, call: AdapterCall) {
        self.0.lock().push(call);
    }

    pub fn calls(&self) -> Vec<AdapterCall> {
        self.0.lock().clone()
    }

    pub fn count(&self, pred: impl Fn(&AdapterCall) -> bool) -> usize {
        self.0.lock().iter().filter(|call| pred(call)).count()
    }
}

/// Scripted adapter for testing
pub struct ScriptedAdapter {
    config: ScriptConfig,
    cursor: usize,
    generation: u64,
    current: Option<ScriptedStop>,
    attached: bool,
    exited: bool,
    log: CallLog,
}

impl ScriptedAdapter {
    pub fn new(config: ScriptConfig) -> Self {
        Self {
            config,
            cursor: 0,
            generation: 0,
            current: None,
            attached: false,
            exited: false,
            log: CallLog::default(),
        }
    }

    /// Handle on the captured calls, usable after the adapter is moved.
    pub fn call_log(&self) -> CallLog {
        self.log.clone()
    }

    fn ensure_current(&self, generation: u64) -> Result<&ScriptedStop, DebuggerError> {
        match &self.current {
            Some(stop) if generation == self.generation => Ok(stop),
            _ => Err(DebuggerError::StaleFrame {
                handle: generation,
                current: self.generation,
            }),
        }
    }
}

#[async_trait]
impl DebuggerAdapter for ScriptedAdapter {
    fn kind(&self) -> AdapterKind {
        AdapterKind::Scripted
    }

    async fn attach(
        &mut self,
        target: &TargetSpec,
        _formatter: &FormatterSource,
    ) -> Result<(), DebuggerError> {
        self.log.push(AdapterCall::Attach(target.to_string()));
        if let Some(error) = self.config.start_error.clone() {
            return Err(error.into_debugger_error());
        }
        self.attached = true;
        Ok(())
    }

    async fn install_intercept(&mut self, marker: &str) -> Result<(), DebuggerError> {
        self.log.push(AdapterCall::InstallIntercept(marker.to_string()));
        if !self.attached {
            return Err(DebuggerError::NoSession);
        }
        if self.config.missing_marker {
            return Err(DebuggerError::MarkerNotFound(format!(
                "Function \"{marker}\" not defined."
            )));
        }
        Ok(())
    }

    async fn start(&mut self) -> Result<(), DebuggerError> {
        self.log.push(AdapterCall::Start);
        if !self.attached {
            return Err(DebuggerError::NoSession);
        }
        Ok(())
    }

    async fn next_event(&mut self) -> Result<DebugEvent, DebuggerError> {
        if self.exited {
            return Err(DebuggerError::ChannelClosed);
        }
        if self.current.is_some() {
            return Err(DebuggerError::NotSupported(
                "waiting for events while the target is suspended".to_string(),
            ));
        }

        let Some(step) = self.config.steps.get(self.cursor).cloned() else {
            self.exited = true;
            return Ok(DebugEvent::Exited(self.config.exit.clone()));
        };
        self.cursor += 1;

        match step {
            ScriptStep::Output(line) => Ok(DebugEvent::TargetOutput(line)),
            ScriptStep::Stop(stop) => {
                self.generation += 1;
                self.current = Some(stop);
                Ok(DebugEvent::Intercepted(StopContext {
                    generation: self.generation,
                    thread_id: 1,
                }))
            }
        }
    }

    async fn read_tag(&mut self, stop: &StopContext) -> Result<String, DebuggerError> {
        self.log.push(AdapterCall::ReadTag {
            generation: stop.generation,
        });
        let current = self.ensure_current(stop.generation)?;
        current.tag.clone().ok_or_else(|| {
            DebuggerError::TagUnreadable("marker argument is not a string: 0x0".to_string())
        })
    }

    async fn resolve_frame(
        &mut self,
        stop: &StopContext,
        depth: u32,
    ) -> Result<FrameRef, DebuggerError> {
        self.log.push(AdapterCall::ResolveFrame {
            generation: stop.generation,
            depth,
        });
        let current = self.ensure_current(stop.generation)?;
        let frame = current
            .frames
            .get(depth as usize)
            .ok_or(DebuggerError::FrameNotFound {
                depth,
                available: current.frames.len() as u32,
            })?;
        Ok(FrameRef {
            generation: stop.generation,
            thread_id: stop.thread_id,
            depth,
            function: Some(frame.function.clone()),
        })
    }

    async fn resolve_variable(
        &mut self,
        frame: &FrameRef,
        name: &str,
    ) -> Result<VariableHandle, DebuggerError> {
        self.log.push(AdapterCall::ResolveVariable {
            depth: frame.depth,
            name: name.to_string(),
        });
        let current = self.ensure_current(frame.generation)?;
        let found = current
            .frames
            .get(frame.depth as usize)
            .and_then(|f| f.lookup(name))
            .is_some();
        if !found {
            return Err(DebuggerError::VariableNotFound {
                name: name.to_string(),
                depth: frame.depth,
            });
        }
        Ok(VariableHandle {
            frame: frame.clone(),
            name: name.to_string(),
        })
    }

    async fn format_value(&mut self, handle: &VariableHandle) -> Result<String, DebuggerError> {
        self.log.push(AdapterCall::FormatValue {
            name: handle.name.clone(),
        });
        let current = self.ensure_current(handle.frame.generation)?;
        let value = current
            .frames
            .get(handle.frame.depth as usize)
            .and_then(|f| f.lookup(&handle.name))
            .ok_or_else(|| DebuggerError::VariableNotFound {
                name: handle.name.clone(),
                depth: handle.frame.depth,
            })?;
        match value {
            ScriptedValue::Text(text) => Ok(text.clone()),
            ScriptedValue::FormatError(msg) => Err(DebuggerError::FormatFailed(msg.clone())),
            ScriptedValue::Unreadable(msg) => Err(DebuggerError::ValueUnreadable(msg.clone())),
            ScriptedValue::SessionLost => Err(DebuggerError::ChannelClosed),
        }
    }

    async fn resume(&mut self, token: Resume) -> Result<(), DebuggerError> {
        drop(token);
        self.log.push(AdapterCall::Resume {
            generation: self.generation,
        });
        if self.current.take().is_none() {
            return Err(DebuggerError::NotSupported(
                "resume without a suspended target".to_string(),
            ));
        }
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<(), DebuggerError> {
        self.log.push(AdapterCall::Shutdown);
        self.attached = false;
        self.current = None;
        Ok(())
    }
}
