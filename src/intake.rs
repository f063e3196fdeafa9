//! Intake side of the pipeline: accepted uploads land in the staging store
//! and trigger exactly one workflow execution each.

use std::sync::Arc;

use log::info;
use serde::{Deserialize, Serialize};

use crate::store::{StagingStore, StoreError};
use crate::workflow::WorkflowEngine;

/// What the uploader gets back for an accepted transfer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestReceipt {
    pub key: String,
    pub execution_id: String,
}

/// Terminates accepted transfer sessions. Authentication happens before this
/// point (the server's request guard); by the time `receive` runs, the upload
/// is trusted enough to enter staging.
pub struct IntakeEndpoint {
    store: Arc<dyn StagingStore>,
    engine: Arc<WorkflowEngine>,
}

impl IntakeEndpoint {
    pub fn new(store: Arc<dyn StagingStore>, engine: Arc<WorkflowEngine>) -> Self {
        Self { store, engine }
    }

    /// Write the uploaded bytes and start the workflow for them. A failed
    /// store write creates no execution.
    pub fn receive(&self, key: &str, bytes: &[u8]) -> Result<IngestReceipt, StoreError> {
        self.store.put(key, bytes)?;
        info!("intake: received {} ({} bytes)", key, bytes.len());
        let execution_id = self.engine.start(key);
        Ok(IngestReceipt {
            key: key.to_string(),
            execution_id,
        })
    }
}
