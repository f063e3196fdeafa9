mod engine;
mod execution;
mod state;
mod step;
mod token;

pub use engine::{ReportAck, StepInvoker, WorkflowEngine, WorkflowError};
pub use execution::{Execution, ExecutionRecord, ExecutionStatus};
pub use state::{Sequencer, Transition};
pub use step::{
    FailureKind, MALWARE_STATUS_CLEAN, MALWARE_STATUS_KEY, StepOutcome, StepRecord, Workflow,
    WorkflowStep,
};
pub use token::{PendingStep, TokenError, TokenRegistry};
