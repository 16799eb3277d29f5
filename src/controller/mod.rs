pub mod runner;
pub mod session;

pub use runner::{CheckpointController, ControllerError, InspectionPlan, RunSummary};
pub use session::SessionState;
