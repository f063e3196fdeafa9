use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::ObjectLabel;

/// Label applied to an object that passed the scan gate. No other path in the
/// pipeline ever writes this pair.
pub const MALWARE_STATUS_KEY: &str = "MalwareStatus";
pub const MALWARE_STATUS_CLEAN: &str = "Clean";

/// Why a step failed. Timeout is kept distinct from an explicit FAILURE
/// report, though both halt the execution the same way.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    /// The external decision step redeemed its token with FAILURE.
    Reported,
    /// The continuation token was not redeemed within the step timeout.
    Timeout,
    /// A storage operation backing a synchronous step failed.
    Storage(String),
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Reported => write!(f, "reported failure"),
            FailureKind::Timeout => write!(f, "step timed out"),
            FailureKind::Storage(msg) => write!(f, "storage failure: {msg}"),
        }
    }
}

/// The result of a resolved step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepOutcome {
    Success,
    Failure(FailureKind),
}

/// The closed set of step types an ingestion workflow is built from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkflowStep {
    /// Re-home the triggering object under the destination prefix.
    /// Synchronous, no external callback.
    Copy { destination_prefix: String },
    /// Invoke the external decision step with a continuation token and
    /// suspend the execution until the token is redeemed or the timeout
    /// elapses.
    Custom { timeout: Duration },
    /// Attach labels to the object. Synchronous.
    Tag { labels: Vec<ObjectLabel> },
}

impl WorkflowStep {
    pub fn name(&self) -> &'static str {
        match self {
            WorkflowStep::Copy { .. } => "COPY",
            WorkflowStep::Custom { .. } => "CUSTOM",
            WorkflowStep::Tag { .. } => "TAG",
        }
    }
}

impl fmt::Display for WorkflowStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// One resolved step inside an execution's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRecord {
    pub step: String,
    pub outcome: StepOutcome,
    pub finished_at: DateTime<Utc>,
}

impl StepRecord {
    pub fn new(step: &WorkflowStep, outcome: StepOutcome) -> Self {
        Self {
            step: step.name().to_string(),
            outcome,
            finished_at: Utc::now(),
        }
    }
}

/// The fixed, ordered list of steps applied to every uploaded object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workflow {
    pub id: String,
    pub steps: Vec<WorkflowStep>,
}

impl Workflow {
    pub fn new(id: impl Into<String>, steps: Vec<WorkflowStep>) -> Self {
        Self {
            id: id.into(),
            steps,
        }
    }

    /// The standard ingestion pipeline: copy into the canonical prefix, gate
    /// behind the external scan, then mark the survivor clean.
    pub fn ingestion(id: impl Into<String>, copy_prefix: &str, step_timeout: Duration) -> Self {
        Self::new(
            id,
            vec![
                WorkflowStep::Copy {
                    destination_prefix: copy_prefix.to_string(),
                },
                WorkflowStep::Custom {
                    timeout: step_timeout,
                },
                WorkflowStep::Tag {
                    labels: vec![ObjectLabel::new(MALWARE_STATUS_KEY, MALWARE_STATUS_CLEAN)],
                },
            ],
        )
    }
}
