//! Run history and outcome reporting types.

pub mod entities;
pub mod outcome;

pub use entities::{CallEvent, CallEventState, ExecutionOutcome, Run, RunStatus};
pub use outcome::{OutcomeAck, OutcomeReport, ReportedOutcome, ToolFailure};
