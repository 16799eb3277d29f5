pub mod adapter;
pub mod error;
pub mod gdb;
pub mod mi;
pub mod mock;

pub use adapter::{
    AdapterKind, DebugEvent, DebuggerAdapter, ExitStatus, FormatterSource, FrameRef, Resume,
    StopContext, TargetSpec, VariableHandle,
};
pub use error::DebuggerError;
pub use gdb::GdbAdapter;
pub use mock::{ScriptBuilder, ScriptConfig, ScriptedAdapter};
