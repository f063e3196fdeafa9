//! Wire types for the step-invocation event and the status-report operation.
//!
//! All structs derive `Serialize` and `Deserialize`; field names follow the
//! camelCase JSON the workflow service emits and accepts.

use serde::{Deserialize, Serialize};

/// Verdict an external decision step redeems its token with. The closed set:
/// anything else is rejected at the parsing layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepStatus {
    Success,
    Failure,
}

/// Identity of the suspended execution a token belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionDetails {
    pub workflow_id: String,
    pub execution_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceMetadata {
    pub execution_details: ExecutionDetails,
}

/// Reference to the object the decision step should inspect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileLocation {
    pub key: String,
}

/// Event delivered to the external decision step when an execution suspends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepInvocationEvent {
    pub service_metadata: ServiceMetadata,
    /// Single-use continuation credential; redeeming it is the only way to
    /// advance the suspended execution.
    pub token: String,
    pub file_location: FileLocation,
}

impl StepInvocationEvent {
    pub fn new(workflow_id: &str, execution_id: &str, token: &str, key: &str) -> Self {
        Self {
            service_metadata: ServiceMetadata {
                execution_details: ExecutionDetails {
                    workflow_id: workflow_id.to_string(),
                    execution_id: execution_id.to_string(),
                },
            },
            token: token.to_string(),
            file_location: FileLocation {
                key: key.to_string(),
            },
        }
    }

    pub fn workflow_id(&self) -> &str {
        &self.service_metadata.execution_details.workflow_id
    }

    pub fn execution_id(&self) -> &str {
        &self.service_metadata.execution_details.execution_id
    }
}

/// Request body of the status-report operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub workflow_id: String,
    pub execution_id: String,
    pub token: String,
    pub status: StepStatus,
}

/// Response to a submitted status report: an HTTP-ish status code plus an
/// opaque echo of the engine's acknowledgement.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReportResponse {
    pub status_code: u16,
    pub body: serde_json::Value,
}
