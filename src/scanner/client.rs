use std::future::Future;
use std::sync::{Arc, Weak};
use std::time::Duration;

use reqwest::Client;
use serde_json::json;

use crate::workflow::WorkflowEngine;

use super::error::ScanError;
use super::types::{StatusReport, StatusReportResponse};

/// Route the status-report operation is served under.
pub const REPORT_PATH: &str = "/workflow-step-state";

/// Reporting seam between the scan handler and the workflow engine.
///
/// Constructed once at startup and shared by reference; the handler never
/// builds its own sender.
pub trait StepStateSender: Send + Sync {
    fn send_report(
        &self,
        report: &StatusReport,
    ) -> impl Future<Output = Result<StatusReportResponse, ScanError>> + Send;
}

/// Submits status reports to a remote engine over HTTP.
pub struct HttpStepStateClient {
    client: Client,
    base_url: String,
}

impl HttpStepStateClient {
    /// Create a client pointing at the engine's base URL
    /// (e.g. `http://127.0.0.1:8022`).
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()
            .expect("failed to build HTTP client");
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

impl StepStateSender for HttpStepStateClient {
    async fn send_report(
        &self,
        report: &StatusReport,
    ) -> Result<StatusReportResponse, ScanError> {
        let url = format!("{}{REPORT_PATH}", self.base_url.trim_end_matches('/'));
        let response = self.client.post(&url).json(report).send().await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(ScanError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json::<StatusReportResponse>().await?)
    }
}

/// Submits status reports straight to an engine in the same process.
///
/// Holds a `Weak` reference: the engine owns the scanner wiring, so a strong
/// reference here would keep both alive forever.
pub struct EngineStepStateSender {
    engine: Weak<WorkflowEngine>,
}

impl EngineStepStateSender {
    pub fn new(engine: &Arc<WorkflowEngine>) -> Self {
        Self {
            engine: Arc::downgrade(engine),
        }
    }
}

impl StepStateSender for EngineStepStateSender {
    async fn send_report(
        &self,
        report: &StatusReport,
    ) -> Result<StatusReportResponse, ScanError> {
        let engine = self.engine.upgrade().ok_or(ScanError::EngineGone)?;
        match engine.report_step_outcome(report) {
            Ok(ack) => Ok(StatusReportResponse {
                status_code: 200,
                body: json!(ack),
            }),
            Err(err) => Err(ScanError::Rejected {
                status: err.rejection_status(),
                message: err.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::types::StepStatus;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sample_report() -> StatusReport {
        StatusReport {
            workflow_id: "w1".into(),
            execution_id: "e1".into(),
            token: "t1".into(),
            status: StepStatus::Success,
        }
    }

    #[tokio::test]
    async fn posts_report_and_parses_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/workflow-step-state"))
            .and(body_json(json!({
                "workflowId": "w1",
                "executionId": "e1",
                "token": "t1",
                "status": "SUCCESS"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "statusCode": 200,
                "body": { "executionId": "e1", "status": "succeeded" }
            })))
            .mount(&server)
            .await;

        let client = HttpStepStateClient::new(server.uri());
        let response = client.send_report(&sample_report()).await.unwrap();
        assert_eq!(response.status_code, 200);
        assert_eq!(response.body["executionId"], "e1");
    }

    #[tokio::test]
    async fn rejection_surfaces_status_and_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/workflow-step-state"))
            .respond_with(ResponseTemplate::new(409).set_body_string("token already redeemed"))
            .mount(&server)
            .await;

        let client = HttpStepStateClient::new(server.uri());
        let err = client.send_report(&sample_report()).await.unwrap_err();
        match err {
            ScanError::Rejected { status, message } => {
                assert_eq!(status, 409);
                assert_eq!(message, "token already redeemed");
            }
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn engine_sender_reports_gone_after_drop() {
        use crate::store::MemoryStore;
        use crate::workflow::{Workflow, WorkflowEngine};

        let store = Arc::new(MemoryStore::new());
        let engine = WorkflowEngine::new(
            Workflow::ingestion("w1", "incoming/", Duration::from_secs(60)),
            store,
            None,
        );
        let sender = EngineStepStateSender::new(&engine);
        drop(engine);

        let err = sender.send_report(&sample_report()).await.unwrap_err();
        assert!(matches!(err, ScanError::EngineGone));
    }

    #[tokio::test]
    async fn engine_sender_maps_rejections() {
        use crate::store::MemoryStore;
        use crate::workflow::{Workflow, WorkflowEngine};

        let store = Arc::new(MemoryStore::new());
        let engine = WorkflowEngine::new(
            Workflow::ingestion("w1", "incoming/", Duration::from_secs(60)),
            store,
            None,
        );
        let sender = EngineStepStateSender::new(&engine);

        let err = sender.send_report(&sample_report()).await.unwrap_err();
        match err {
            ScanError::Rejected { status, .. } => assert_eq!(status, 404),
            other => panic!("expected rejection, got {other:?}"),
        }
    }
}
