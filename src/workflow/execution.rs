use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::step::{FailureKind, StepRecord};

/// Lifecycle status of a workflow execution. Terminal states are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Pending,
    InProgress,
    Succeeded,
    Failed,
}

impl ExecutionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ExecutionStatus::Succeeded | ExecutionStatus::Failed)
    }
}

/// One run of the workflow, scoped to a single uploaded object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Execution {
    pub workflow_id: String,
    pub id: String,
    /// Key the triggering upload arrived under.
    pub source_key: String,
    /// Current canonical key of the object; updated by the copy step.
    pub object_key: String,
    pub status: ExecutionStatus,
    /// Index of the step currently running or suspended.
    pub current_step: usize,
    pub records: Vec<StepRecord>,
    pub failure: Option<FailureKind>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Execution {
    pub fn new(workflow_id: impl Into<String>, source_key: impl Into<String>) -> Self {
        let source_key = source_key.into();
        let now = Utc::now();
        Self {
            workflow_id: workflow_id.into(),
            id: Uuid::new_v4().to_string(),
            object_key: source_key.clone(),
            source_key,
            status: ExecutionStatus::Pending,
            current_step: 0,
            records: Vec::new(),
            failure: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Structured record of an execution, appended to the audit log when the
/// execution reaches a terminal state and served by the status endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub workflow_id: String,
    pub execution_id: String,
    pub source_key: String,
    pub object_key: String,
    pub status: ExecutionStatus,
    pub steps: Vec<StepRecord>,
    pub failure: Option<FailureKind>,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub duration_ms: i64,
}

impl ExecutionRecord {
    pub fn from_execution(execution: &Execution) -> Self {
        let duration = execution.updated_at - execution.created_at;
        Self {
            workflow_id: execution.workflow_id.clone(),
            execution_id: execution.id.clone(),
            source_key: execution.source_key.clone(),
            object_key: execution.object_key.clone(),
            status: execution.status,
            steps: execution.records.clone(),
            failure: execution.failure.clone(),
            started_at: execution.created_at,
            updated_at: execution.updated_at,
            duration_ms: duration.num_milliseconds(),
        }
    }
}
