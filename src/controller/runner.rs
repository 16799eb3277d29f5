use crate::controller::session::SessionState;
use crate::debugger::{
    DebugEvent, DebuggerAdapter, DebuggerError, ExitStatus, FormatterSource, Resume, StopContext,
    TargetSpec,
};
use crate::record::InspectionRecord;
use crate::sink::{RecordSink, RunEnd};

#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    #[error("Setup failed: {0}")]
    Setup(#[source] DebuggerError),

    #[error("Checkpoint contract violated at {marker}: {source}")]
    ContractViolation {
        marker: String,
        #[source]
        source: DebuggerError,
    },

    #[error("Debugger failed mid-run: {0}")]
    Debugger(#[source] DebuggerError),

    #[error("Failed to write record: {0}")]
    Sink(#[from] std::io::Error),

    #[error("Invalid session transition: {from} -> {to}")]
    InvalidTransition {
        from: SessionState,
        to: SessionState,
    },
}

impl ControllerError {
    /// Whether the run failed before the target got to execute.
    pub fn is_setup(&self) -> bool {
        matches!(self, ControllerError::Setup(_))
    }
}

/// What to inspect and where
#[derive(Debug, Clone)]
pub struct InspectionPlan {
    pub target: TargetSpec,
    pub formatter: FormatterSource,
    pub marker: String,
    pub variable: String,
    /// Frames to ascend from the marker to reach the inspected scope
    pub frame_depth: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub records: u64,
    /// Records carrying an error outcome
    pub failures: u64,
    pub exit: ExitStatus,
}

/// Drives one target from attach to exit, emitting a record per marker call.
pub struct CheckpointController<A: DebuggerAdapter> {
    adapter: A,
    plan: InspectionPlan,
    state: SessionState,
    records: u64,
    failures: u64,
}

impl<A: DebuggerAdapter> CheckpointController<A> {
    pub fn new(adapter: A, plan: InspectionPlan) -> Self {
        Self {
            adapter,
            plan,
            state: SessionState::Idle,
            records: 0,
            failures: 0,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    fn transition(&mut self, next: SessionState) -> Result<(), ControllerError> {
        if !self.state.can_transition_to(next) {
            return Err(ControllerError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        tracing::trace!(from = %self.state, to = %next, "Session transition");
        self.state = next;
        Ok(())
    }

    /// Run the target to completion.
    ///
    /// Fatal errors tear the session down and are reported to the sink once.
    /// Records already emitted stay valid whatever happens afterwards.
    pub async fn run(&mut self, sink: &mut dyn RecordSink) -> Result<RunSummary, ControllerError> {
        if self.state != SessionState::Idle {
            return Err(ControllerError::InvalidTransition {
                from: self.state,
                to: SessionState::Attached,
            });
        }

        match self.drive(sink).await {
            Ok(exit) => {
                tracing::info!(
                    records = self.records,
                    failures = self.failures,
                    exit = %exit,
                    "Target exited"
                );
                sink.finish(&RunEnd::Exited(exit.clone()))?;
                Ok(RunSummary {
                    records: self.records,
                    failures: self.failures,
                    exit,
                })
            }
            Err(err) => {
                tracing::error!(error = %err, state = %self.state, "Checkpoint run aborted");
                self.teardown().await;
                if let Err(e) = sink.finish(&RunEnd::Aborted(err.to_string())) {
                    tracing::warn!(error = %e, "Failed to report aborted run");
                }
                Err(err)
            }
        }
    }

    async fn drive(&mut self, sink: &mut dyn RecordSink) -> Result<ExitStatus, ControllerError> {
        let plan = self.plan.clone();

        self.adapter
            .attach(&plan.target, &plan.formatter)
            .await
            .map_err(ControllerError::Setup)?;
        self.transition(SessionState::Attached)?;

        self.adapter
            .install_intercept(&plan.marker)
            .await
            .map_err(ControllerError::Setup)?;
        self.adapter.start().await.map_err(ControllerError::Setup)?;
        self.transition(SessionState::Running)?;

        tracing::info!(
            adapter = %self.adapter.kind(),
            target_spec = %plan.target,
            marker = %plan.marker,
            variable = %plan.variable,
            "Target running"
        );

        loop {
            let event = self
                .adapter
                .next_event()
                .await
                .map_err(ControllerError::Debugger)?;

            match event {
                DebugEvent::TargetOutput(line) => sink.target_output(&line)?,
                DebugEvent::Intercepted(stop) => {
                    self.transition(SessionState::Intercepted)?;
                    let token = self.on_intercept(&stop, sink).await?;
                    self.adapter
                        .resume(token)
                        .await
                        .map_err(ControllerError::Debugger)?;
                    self.transition(SessionState::Running)?;
                }
                DebugEvent::Exited(status) => {
                    self.transition(SessionState::Exited)?;
                    if let Err(e) = self.adapter.shutdown().await {
                        tracing::warn!(error = %e, "Debugger shutdown failed after exit");
                    }
                    return Ok(status);
                }
            }
        }
    }

    /// Handle one interception: read the tag, inspect the variable, emit the
    /// record. The only successful result is a [`Resume`].
    ///
    /// Lookup and formatting failures become an error record for this tag.
    /// An unreadable tag, or a failure of the debugging session itself, is
    /// fatal; in the latter case the record is still emitted first.
    pub async fn on_intercept(
        &mut self,
        stop: &StopContext,
        sink: &mut dyn RecordSink,
    ) -> Result<Resume, ControllerError> {
        let tag = self.adapter.read_tag(stop).await.map_err(|source| {
            ControllerError::ContractViolation {
                marker: self.plan.marker.clone(),
                source,
            }
        })?;

        let (record, fatal) = match self.inspect(stop).await {
            Ok(value) => (InspectionRecord::printed(&tag, value), None),
            Err(e) if e.is_per_checkpoint() => {
                tracing::debug!(tag = %tag, error = %e, "Checkpoint inspection failed");
                (InspectionRecord::error(&tag, e.to_string()), None)
            }
            Err(e) => (InspectionRecord::error(&tag, e.to_string()), Some(e)),
        };

        self.records += 1;
        if !record.is_ok() {
            self.failures += 1;
        }
        tracing::debug!(
            seq = self.records,
            tag = %tag,
            ok = record.is_ok(),
            generation = stop.generation,
            "Checkpoint captured"
        );
        sink.emit(self.records, &record)?;

        match fatal {
            Some(e) => Err(ControllerError::Debugger(e)),
            None => Ok(Resume::new()),
        }
    }

    async fn inspect(&mut self, stop: &StopContext) -> Result<String, DebuggerError> {
        let frame = self
            .adapter
            .resolve_frame(stop, self.plan.frame_depth)
            .await?;
        let handle = self
            .adapter
            .resolve_variable(&frame, &self.plan.variable)
            .await?;
        self.adapter.format_value(&handle).await
    }

    async fn teardown(&mut self) {
        if let Err(e) = self.adapter.shutdown().await {
            tracing::warn!(error = %e, "Debugger shutdown failed");
        }
        if !self.state.is_terminal() {
            self.state = SessionState::Exited;
        }
    }
}
