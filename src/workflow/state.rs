use chrono::Utc;

use super::execution::{Execution, ExecutionStatus};
use super::step::{StepOutcome, WorkflowStep};

/// The result of resolving one step of an execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Run the step at this index next.
    Next(usize),
    /// The execution reached a terminal state.
    Complete(ExecutionStatus),
}

/// Advances an `Execution` through its fixed step list.
///
/// Pure sequencing logic, kept apart from the async engine: SUCCESS moves to
/// the next step (or completes the execution after the last one), FAILURE
/// halts permanently. Already-applied step effects are never rolled back, and
/// terminal executions never move again.
pub struct Sequencer;

impl Sequencer {
    /// Record the outcome of the current step and compute the transition,
    /// applying it to the execution in place.
    pub fn next(
        execution: &mut Execution,
        step_count: usize,
        step: &WorkflowStep,
        outcome: StepOutcome,
    ) -> Transition {
        if execution.status.is_terminal() {
            return Transition::Complete(execution.status);
        }

        execution
            .records
            .push(super::step::StepRecord::new(step, outcome.clone()));
        execution.updated_at = Utc::now();

        match outcome {
            StepOutcome::Success => {
                if execution.current_step + 1 < step_count {
                    execution.current_step += 1;
                    execution.status = ExecutionStatus::InProgress;
                    Transition::Next(execution.current_step)
                } else {
                    execution.status = ExecutionStatus::Succeeded;
                    Transition::Complete(ExecutionStatus::Succeeded)
                }
            }
            StepOutcome::Failure(kind) => {
                execution.status = ExecutionStatus::Failed;
                execution.failure = Some(kind);
                Transition::Complete(ExecutionStatus::Failed)
            }
        }
    }
}
