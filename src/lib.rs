pub mod app;
pub mod cli;
pub mod config;
pub mod controller;
pub mod debugger;
pub mod expect;
pub mod marker;
pub mod record;
pub mod sink;
pub mod util;

pub use app::App;
pub use config::{ConfigError, HarnessConfig};
pub use controller::{CheckpointController, ControllerError, InspectionPlan, RunSummary};
pub use debugger::{DebuggerAdapter, DebuggerError, GdbAdapter, ScriptedAdapter};
pub use record::{InspectionRecord, Outcome};
pub use sink::{JsonlSink, MemorySink, RecordSink, TextSink};
