//! The scan decision step: inspect a staged object, then redeem the
//! continuation token with the verdict. Exactly one report per invocation,
//! no retries.

use std::sync::Arc;

use log::{error, info, warn};

use crate::store::StagingStore;
use crate::workflow::StepInvoker;

use super::client::StepStateSender;
use super::error::ScanError;
use super::types::{StatusReport, StatusReportResponse, StepInvocationEvent, StepStatus};

/// The EICAR anti-virus test string. Any content containing it is treated as
/// malicious; this is the default (and only out-of-the-box) signature.
pub const EICAR_TEST_SIGNATURE: &str =
    r"X5O!P%@AP[4\PZX54(P^)7CC)7}$EICAR-STANDARD-ANTIVIRUS-TEST-FILE!$H+H*";

/// Inspects staged objects against a byte-signature list and reports the
/// verdict through an injected [`StepStateSender`].
pub struct ScanHandler<S: StepStateSender> {
    sender: S,
    store: Arc<dyn StagingStore>,
    signatures: Vec<Vec<u8>>,
}

impl<S: StepStateSender> ScanHandler<S> {
    pub fn new(sender: S, store: Arc<dyn StagingStore>, signatures: &[String]) -> Self {
        Self {
            sender,
            store,
            signatures: signatures
                .iter()
                .filter(|s| !s.is_empty())
                .map(|s| s.as_bytes().to_vec())
                .collect(),
        }
    }

    /// Verdict for a byte buffer: FAILURE on any signature hit.
    pub fn verdict(&self, bytes: &[u8]) -> StepStatus {
        let hit = self
            .signatures
            .iter()
            .any(|sig| bytes.windows(sig.len()).any(|window| window == sig));
        if hit {
            StepStatus::Failure
        } else {
            StepStatus::Success
        }
    }

    /// Handle one invocation event: fetch the object, compute the verdict and
    /// redeem the token. An unreadable object is reported as FAILURE rather
    /// than left to the timeout; unscannable content never passes the gate.
    pub async fn handle(
        &self,
        event: &StepInvocationEvent,
    ) -> Result<StatusReportResponse, ScanError> {
        let status = match self.store.get(&event.file_location.key) {
            Ok(bytes) => self.verdict(&bytes),
            Err(err) => {
                warn!(
                    "execution {}: object {} unreadable ({err}), reporting FAILURE",
                    event.execution_id(),
                    event.file_location.key
                );
                StepStatus::Failure
            }
        };
        info!(
            "execution {}: scanned {}, verdict {status:?}",
            event.execution_id(),
            event.file_location.key
        );

        let report = StatusReport {
            workflow_id: event.workflow_id().to_string(),
            execution_id: event.execution_id().to_string(),
            token: event.token.clone(),
            status,
        };
        self.sender.send_report(&report).await
    }
}

/// Adapts a [`ScanHandler`] to the engine's [`StepInvoker`] seam by running
/// each invocation on its own task.
pub struct ScanDispatcher<S: StepStateSender + 'static> {
    handler: Arc<ScanHandler<S>>,
}

impl<S: StepStateSender + 'static> ScanDispatcher<S> {
    pub fn new(handler: Arc<ScanHandler<S>>) -> Self {
        Self { handler }
    }
}

impl<S: StepStateSender + 'static> StepInvoker for ScanDispatcher<S> {
    fn dispatch(&self, event: StepInvocationEvent) {
        let handler = Arc::clone(&self.handler);
        tokio::spawn(async move {
            if let Err(err) = handler.handle(&event).await {
                error!(
                    "execution {}: scan step failed to report: {err}",
                    event.execution_id()
                );
            }
        });
    }
}
