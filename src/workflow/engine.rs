use std::sync::{Arc, Mutex, RwLock};

use log::{info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::audit::AuditLog;
use crate::scanner::types::{StatusReport, StepInvocationEvent, StepStatus};
use crate::store::StagingStore;

use super::execution::{Execution, ExecutionRecord, ExecutionStatus};
use super::state::{Sequencer, Transition};
use super::step::{FailureKind, StepOutcome, Workflow, WorkflowStep};
use super::token::{TokenError, TokenRegistry};

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("unknown execution: {id}")]
    UnknownExecution { id: String },

    #[error("unknown or expired token")]
    UnknownToken,

    #[error("token already redeemed")]
    TokenAlreadyRedeemed,

    #[error("token does not belong to workflow {workflow_id} execution {execution_id}")]
    TokenMismatch {
        workflow_id: String,
        execution_id: String,
    },
}

impl WorkflowError {
    /// HTTP status a rejected status report maps to, shared by the HTTP route
    /// and the in-process sender so both surfaces reject identically.
    pub fn rejection_status(&self) -> u16 {
        match self {
            WorkflowError::UnknownExecution { .. } | WorkflowError::UnknownToken => 404,
            WorkflowError::TokenAlreadyRedeemed | WorkflowError::TokenMismatch { .. } => 409,
        }
    }
}

/// Delivery seam between the engine and the external decision step.
///
/// `dispatch` must not block: implementations hand the event off to a task or
/// a remote target and return. The engine stays suspended until the token
/// inside the event is redeemed or times out.
pub trait StepInvoker: Send + Sync {
    fn dispatch(&self, event: StepInvocationEvent);
}

/// Acknowledgement returned for an accepted status report. Echoed opaquely in
/// the report response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportAck {
    pub workflow_id: String,
    pub execution_id: String,
    pub status: ExecutionStatus,
}

struct EngineState {
    executions: std::collections::HashMap<String, Execution>,
    tokens: TokenRegistry,
}

/// Executes the fixed ingestion workflow, one independent execution per
/// uploaded object.
///
/// Synchronous steps (copy, tag) run against the staging store inline; the
/// custom step issues a continuation token, hands an invocation event to the
/// attached [`StepInvoker`] and suspends the execution. A tokio watchdog fails
/// the execution if the token outlives the step timeout.
pub struct WorkflowEngine {
    workflow: Workflow,
    store: Arc<dyn StagingStore>,
    audit: Option<Arc<AuditLog>>,
    invoker: RwLock<Option<Arc<dyn StepInvoker>>>,
    inner: Mutex<EngineState>,
}

impl WorkflowEngine {
    pub fn new(
        workflow: Workflow,
        store: Arc<dyn StagingStore>,
        audit: Option<Arc<AuditLog>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            workflow,
            store,
            audit,
            invoker: RwLock::new(None),
            inner: Mutex::new(EngineState {
                executions: std::collections::HashMap::new(),
                tokens: TokenRegistry::new(),
            }),
        })
    }

    /// Attach the custom-step target. Wired after construction because the
    /// scanner side holds a reference back to the engine; until an invoker is
    /// attached, custom steps sit suspended and fall to the timeout watchdog.
    pub fn set_invoker(&self, invoker: Arc<dyn StepInvoker>) {
        *self.invoker.write().expect("engine lock poisoned") = Some(invoker);
    }

    pub fn workflow_id(&self) -> &str {
        &self.workflow.id
    }

    /// Create one execution for an uploaded object and begin step 0.
    ///
    /// Must be called from within a tokio runtime; the custom step spawns its
    /// timeout watchdog on it.
    pub fn start(self: &Arc<Self>, object_key: &str) -> String {
        let execution = Execution::new(&self.workflow.id, object_key);
        let id = execution.id.clone();
        {
            let mut inner = self.inner.lock().expect("engine lock poisoned");
            inner.executions.insert(id.clone(), execution);
        }
        info!(
            "workflow {}: execution {id} started for object {object_key}",
            self.workflow.id
        );
        self.run_from(&id, 0);
        id
    }

    /// Redeem a continuation token with the reported status, advancing or
    /// failing the suspended execution. A rejected redemption alters nothing.
    pub fn report_step_outcome(
        self: &Arc<Self>,
        report: &StatusReport,
    ) -> Result<ReportAck, WorkflowError> {
        let step = {
            let mut inner = self.inner.lock().expect("engine lock poisoned");
            let pending = inner.tokens.peek(&report.token).map_err(token_error)?;
            if pending.execution_id != report.execution_id
                || self.workflow.id != report.workflow_id
            {
                return Err(WorkflowError::TokenMismatch {
                    workflow_id: report.workflow_id.clone(),
                    execution_id: report.execution_id.clone(),
                });
            }
            if !inner.executions.contains_key(&report.execution_id) {
                return Err(WorkflowError::UnknownExecution {
                    id: report.execution_id.clone(),
                });
            }
            let pending = inner.tokens.consume(&report.token).map_err(token_error)?;
            self.workflow.steps[pending.step].clone()
        };

        let outcome = match report.status {
            StepStatus::Success => StepOutcome::Success,
            StepStatus::Failure => StepOutcome::Failure(FailureKind::Reported),
        };
        if let Some(Transition::Next(next)) = self.apply(&report.execution_id, &step, outcome) {
            self.run_from(&report.execution_id, next);
        }

        let status =
            self.status_of(&report.execution_id)
                .ok_or_else(|| WorkflowError::UnknownExecution {
                    id: report.execution_id.clone(),
                })?;
        Ok(ReportAck {
            workflow_id: report.workflow_id.clone(),
            execution_id: report.execution_id.clone(),
            status,
        })
    }

    /// Snapshot of an execution, in-flight or terminal.
    pub fn execution_record(&self, id: &str) -> Option<ExecutionRecord> {
        let inner = self.inner.lock().expect("engine lock poisoned");
        inner.executions.get(id).map(ExecutionRecord::from_execution)
    }

    fn status_of(&self, id: &str) -> Option<ExecutionStatus> {
        let inner = self.inner.lock().expect("engine lock poisoned");
        inner.executions.get(id).map(|e| e.status)
    }

    /// Drive steps from `step_index` until the execution suspends or ends.
    fn run_from(self: &Arc<Self>, execution_id: &str, step_index: usize) {
        let mut index = step_index;
        loop {
            let Some(step) = self.workflow.steps.get(index).cloned() else {
                return;
            };
            match step {
                WorkflowStep::Copy {
                    ref destination_prefix,
                } => {
                    let Some(source) = self.object_key_of(execution_id) else {
                        return;
                    };
                    let destination = copy_destination(destination_prefix, &source);
                    let outcome = match self
                        .store
                        .get(&source)
                        .and_then(|bytes| self.store.put(&destination, &bytes))
                    {
                        Ok(()) => {
                            self.set_object_key(execution_id, &destination);
                            StepOutcome::Success
                        }
                        Err(err) => StepOutcome::Failure(FailureKind::Storage(err.to_string())),
                    };
                    match self.apply(execution_id, &step, outcome) {
                        Some(Transition::Next(next)) => index = next,
                        _ => return,
                    }
                }
                WorkflowStep::Tag { ref labels } => {
                    let Some(key) = self.object_key_of(execution_id) else {
                        return;
                    };
                    let outcome = match self.store.tag(&key, labels) {
                        Ok(()) => StepOutcome::Success,
                        Err(err) => StepOutcome::Failure(FailureKind::Storage(err.to_string())),
                    };
                    match self.apply(execution_id, &step, outcome) {
                        Some(Transition::Next(next)) => index = next,
                        _ => return,
                    }
                }
                WorkflowStep::Custom { timeout } => {
                    let event = {
                        let mut inner = self.inner.lock().expect("engine lock poisoned");
                        let Some(execution) = inner.executions.get(execution_id) else {
                            return;
                        };
                        let object_key = execution.object_key.clone();
                        let token = inner.tokens.issue(execution_id, index);
                        StepInvocationEvent::new(
                            &self.workflow.id,
                            execution_id,
                            &token,
                            &object_key,
                        )
                    };

                    let engine = Arc::clone(self);
                    let token = event.token.clone();
                    tokio::spawn(async move {
                        tokio::time::sleep(timeout).await;
                        engine.expire_token(&token);
                    });

                    let invoker = self
                        .invoker
                        .read()
                        .expect("engine lock poisoned")
                        .clone();
                    match invoker {
                        Some(invoker) => invoker.dispatch(event),
                        None => warn!(
                            "workflow {}: no step invoker attached, execution {execution_id} \
                             will time out",
                            self.workflow.id
                        ),
                    }
                    // Suspended until the token is redeemed or expires.
                    return;
                }
            }
        }
    }

    /// Fail the execution behind `token` if it is still pending.
    fn expire_token(self: &Arc<Self>, token: &str) {
        let pending = {
            let mut inner = self.inner.lock().expect("engine lock poisoned");
            // Already redeemed means there is nothing to expire.
            inner.tokens.consume(token).ok()
        };
        let Some(pending) = pending else {
            return;
        };
        warn!(
            "workflow {}: execution {} custom step timed out",
            self.workflow.id, pending.execution_id
        );
        let step = self.workflow.steps[pending.step].clone();
        self.apply(
            &pending.execution_id,
            &step,
            StepOutcome::Failure(FailureKind::Timeout),
        );
    }

    /// Resolve the current step and apply the transition. Emits the audit
    /// record when the execution just became terminal.
    fn apply(
        &self,
        execution_id: &str,
        step: &WorkflowStep,
        outcome: StepOutcome,
    ) -> Option<Transition> {
        let (transition, record) = {
            let mut inner = self.inner.lock().expect("engine lock poisoned");
            let execution = inner.executions.get_mut(execution_id)?;
            let was_terminal = execution.status.is_terminal();
            let transition =
                Sequencer::next(execution, self.workflow.steps.len(), step, outcome);
            let record = (!was_terminal && execution.status.is_terminal())
                .then(|| ExecutionRecord::from_execution(execution));
            (transition, record)
        };
        if let Some(record) = record {
            self.finalize(&record);
        }
        Some(transition)
    }

    fn finalize(&self, record: &ExecutionRecord) {
        match record.status {
            ExecutionStatus::Succeeded => info!(
                "workflow {}: execution {} succeeded, object {} tagged",
                record.workflow_id, record.execution_id, record.object_key
            ),
            _ => warn!(
                "workflow {}: execution {} failed: {}",
                record.workflow_id,
                record.execution_id,
                record
                    .failure
                    .as_ref()
                    .map(|kind| kind.to_string())
                    .unwrap_or_else(|| "unknown".to_string())
            ),
        }
        if let Some(audit) = &self.audit
            && let Err(err) = audit.append(record)
        {
            warn!("audit append failed for execution {}: {err}", record.execution_id);
        }
    }

    fn object_key_of(&self, execution_id: &str) -> Option<String> {
        let inner = self.inner.lock().expect("engine lock poisoned");
        inner
            .executions
            .get(execution_id)
            .map(|e| e.object_key.clone())
    }

    fn set_object_key(&self, execution_id: &str, key: &str) {
        let mut inner = self.inner.lock().expect("engine lock poisoned");
        if let Some(execution) = inner.executions.get_mut(execution_id) {
            execution.object_key = key.to_string();
        }
    }
}

fn token_error(err: TokenError) -> WorkflowError {
    match err {
        TokenError::Unknown => WorkflowError::UnknownToken,
        TokenError::AlreadySpent => WorkflowError::TokenAlreadyRedeemed,
    }
}

/// The copy step lands the object at `<prefix><basename>`.
fn copy_destination(prefix: &str, key: &str) -> String {
    let name = key.rsplit('/').next().unwrap_or(key);
    format!("{prefix}{name}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::workflow::step::{MALWARE_STATUS_CLEAN, MALWARE_STATUS_KEY};
    use std::time::Duration;

    #[derive(Default)]
    struct CapturingInvoker {
        events: Mutex<Vec<StepInvocationEvent>>,
    }

    impl CapturingInvoker {
        fn last_event(&self) -> StepInvocationEvent {
            self.events
                .lock()
                .unwrap()
                .last()
                .cloned()
                .expect("no event dispatched")
        }
    }

    impl StepInvoker for CapturingInvoker {
        fn dispatch(&self, event: StepInvocationEvent) {
            self.events.lock().unwrap().push(event);
        }
    }

    fn fixture() -> (
        Arc<MemoryStore>,
        Arc<WorkflowEngine>,
        Arc<CapturingInvoker>,
    ) {
        let store = Arc::new(MemoryStore::new());
        let workflow = Workflow::ingestion("w1", "incoming/", Duration::from_secs(60));
        let engine = WorkflowEngine::new(workflow, store.clone(), None);
        let invoker = Arc::new(CapturingInvoker::default());
        engine.set_invoker(invoker.clone());
        (store, engine, invoker)
    }

    fn report(engine: &Arc<WorkflowEngine>, event: &StepInvocationEvent, status: StepStatus) -> Result<ReportAck, WorkflowError> {
        engine.report_step_outcome(&StatusReport {
            workflow_id: event.service_metadata.execution_details.workflow_id.clone(),
            execution_id: event.service_metadata.execution_details.execution_id.clone(),
            token: event.token.clone(),
            status,
        })
    }

    #[tokio::test]
    async fn success_path_copies_scans_and_tags() {
        let (store, engine, invoker) = fixture();
        store.put("incoming/sample.txt", b"content").unwrap();

        let id = engine.start("incoming/sample.txt");
        let record = engine.execution_record(&id).unwrap();
        assert_eq!(record.status, ExecutionStatus::InProgress);
        assert_eq!(record.object_key, "incoming/sample.txt");

        let event = invoker.last_event();
        assert_eq!(event.service_metadata.execution_details.workflow_id, "w1");
        assert_eq!(event.service_metadata.execution_details.execution_id, id);
        assert_eq!(event.file_location.key, "incoming/sample.txt");

        let ack = report(&engine, &event, StepStatus::Success).unwrap();
        assert_eq!(ack.status, ExecutionStatus::Succeeded);

        let labels = store.tags("incoming/sample.txt").unwrap();
        assert_eq!(labels.len(), 1);
        assert_eq!(labels[0].key, MALWARE_STATUS_KEY);
        assert_eq!(labels[0].value, MALWARE_STATUS_CLEAN);

        let record = engine.execution_record(&id).unwrap();
        let steps: Vec<_> = record.steps.iter().map(|r| r.step.as_str()).collect();
        assert_eq!(steps, vec!["COPY", "CUSTOM", "TAG"]);
    }

    #[tokio::test]
    async fn copy_rehomes_object_under_prefix() {
        let (store, engine, invoker) = fixture();
        store.put("upload.bin", b"content").unwrap();

        let id = engine.start("upload.bin");
        let event = invoker.last_event();
        assert_eq!(event.file_location.key, "incoming/upload.bin");
        report(&engine, &event, StepStatus::Success).unwrap();

        assert_eq!(store.get("incoming/upload.bin").unwrap(), b"content");
        let record = engine.execution_record(&id).unwrap();
        assert_eq!(record.source_key, "upload.bin");
        assert_eq!(record.object_key, "incoming/upload.bin");
        assert_eq!(
            store.tags("incoming/upload.bin").unwrap(),
            vec![crate::store::ObjectLabel::new("MalwareStatus", "Clean")]
        );
    }

    #[tokio::test]
    async fn failure_report_leaves_object_untagged() {
        let (store, engine, invoker) = fixture();
        store.put("incoming/sample.txt", b"content").unwrap();

        let id = engine.start("incoming/sample.txt");
        let event = invoker.last_event();
        let ack = report(&engine, &event, StepStatus::Failure).unwrap();

        assert_eq!(ack.status, ExecutionStatus::Failed);
        assert!(store.tags("incoming/sample.txt").unwrap().is_empty());
        let record = engine.execution_record(&id).unwrap();
        assert_eq!(record.failure, Some(FailureKind::Reported));
        // The tag step never ran.
        assert_eq!(record.steps.len(), 2);
    }

    #[tokio::test]
    async fn duplicate_redemption_is_rejected_without_state_change() {
        let (store, engine, invoker) = fixture();
        store.put("incoming/sample.txt", b"content").unwrap();

        let id = engine.start("incoming/sample.txt");
        let event = invoker.last_event();
        report(&engine, &event, StepStatus::Success).unwrap();

        let err = report(&engine, &event, StepStatus::Failure).unwrap_err();
        assert!(matches!(err, WorkflowError::TokenAlreadyRedeemed));

        // First verdict stands.
        let record = engine.execution_record(&id).unwrap();
        assert_eq!(record.status, ExecutionStatus::Succeeded);
        assert!(!store.tags("incoming/sample.txt").unwrap().is_empty());
    }

    #[tokio::test]
    async fn mismatched_execution_id_does_not_consume_token() {
        let (store, engine, invoker) = fixture();
        store.put("incoming/sample.txt", b"content").unwrap();

        engine.start("incoming/sample.txt");
        let event = invoker.last_event();

        let err = engine
            .report_step_outcome(&StatusReport {
                workflow_id: "w1".into(),
                execution_id: "someone-else".into(),
                token: event.token.clone(),
                status: StepStatus::Success,
            })
            .unwrap_err();
        assert!(matches!(err, WorkflowError::TokenMismatch { .. }));

        // The token survives the rejected attempt.
        let ack = report(&engine, &event, StepStatus::Success).unwrap();
        assert_eq!(ack.status, ExecutionStatus::Succeeded);
    }

    #[tokio::test]
    async fn unknown_token_is_rejected() {
        let (_store, engine, _invoker) = fixture();
        let err = engine
            .report_step_outcome(&StatusReport {
                workflow_id: "w1".into(),
                execution_id: "e1".into(),
                token: "never-issued".into(),
                status: StepStatus::Success,
            })
            .unwrap_err();
        assert!(matches!(err, WorkflowError::UnknownToken));
    }

    #[tokio::test(start_paused = true)]
    async fn unredeemed_step_times_out_into_failed() {
        let (store, engine, _invoker) = fixture();
        store.put("incoming/sample.txt", b"content").unwrap();

        let id = engine.start("incoming/sample.txt");
        assert_eq!(
            engine.execution_record(&id).unwrap().status,
            ExecutionStatus::InProgress
        );

        tokio::time::sleep(Duration::from_secs(61)).await;

        let record = engine.execution_record(&id).unwrap();
        assert_eq!(record.status, ExecutionStatus::Failed);
        assert_eq!(record.failure, Some(FailureKind::Timeout));
        assert!(store.tags("incoming/sample.txt").unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn redemption_after_timeout_is_rejected() {
        let (store, engine, invoker) = fixture();
        store.put("incoming/sample.txt", b"content").unwrap();

        engine.start("incoming/sample.txt");
        let event = invoker.last_event();
        tokio::time::sleep(Duration::from_secs(61)).await;

        let err = report(&engine, &event, StepStatus::Success).unwrap_err();
        assert!(matches!(err, WorkflowError::TokenAlreadyRedeemed));
    }

    #[tokio::test]
    async fn executions_for_distinct_objects_are_independent() {
        let (store, engine, invoker) = fixture();
        store.put("a.txt", b"a").unwrap();
        store.put("b.txt", b"b").unwrap();

        let id_a = engine.start("a.txt");
        let event_a = invoker.last_event();
        let id_b = engine.start("b.txt");
        let event_b = invoker.last_event();

        report(&engine, &event_b, StepStatus::Failure).unwrap();
        report(&engine, &event_a, StepStatus::Success).unwrap();

        assert_eq!(
            engine.execution_record(&id_a).unwrap().status,
            ExecutionStatus::Succeeded
        );
        assert_eq!(
            engine.execution_record(&id_b).unwrap().status,
            ExecutionStatus::Failed
        );
        assert!(!store.tags("incoming/a.txt").unwrap().is_empty());
        assert!(store.tags("incoming/b.txt").unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_object_fails_the_copy_step() {
        let (_store, engine, invoker) = fixture();

        let id = engine.start("ghost.txt");
        let record = engine.execution_record(&id).unwrap();
        assert_eq!(record.status, ExecutionStatus::Failed);
        assert!(matches!(record.failure, Some(FailureKind::Storage(_))));
        // The custom step was never invoked.
        assert!(invoker.events.lock().unwrap().is_empty());
    }

    #[test]
    fn copy_destination_uses_basename() {
        assert_eq!(copy_destination("incoming/", "sample.txt"), "incoming/sample.txt");
        assert_eq!(
            copy_destination("incoming/", "incoming/sample.txt"),
            "incoming/sample.txt"
        );
        assert_eq!(copy_destination("incoming/", "a/b/c.bin"), "incoming/c.bin");
    }

    #[test]
    fn rejection_statuses() {
        assert_eq!(WorkflowError::UnknownToken.rejection_status(), 404);
        assert_eq!(WorkflowError::TokenAlreadyRedeemed.rejection_status(), 409);
    }
}
