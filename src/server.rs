//! Public HTTP surface: the intake endpoint, the status-report operation and
//! a read-only execution status view.

use std::path::PathBuf;
use std::sync::Arc;

use rocket::data::{Data, ToByteUnit};
use rocket::http::Status;
use rocket::request::{FromRequest, Outcome, Request};
use rocket::serde::json::Json;
use rocket::{Build, Rocket, State, get, post, put, routes};
use serde_json::json;

use crate::config::ServerConfig;
use crate::intake::{IngestReceipt, IntakeEndpoint};
use crate::scanner::types::{StatusReport, StatusReportResponse};
use crate::store::StoreError;
use crate::workflow::{ExecutionRecord, WorkflowEngine};

pub const INTAKE_TOKEN_HEADER: &str = "x-intake-token";

/// Collaborators the routes need, constructed once in `main` and managed by
/// rocket.
pub struct ServerContext {
    pub intake: Arc<IntakeEndpoint>,
    pub engine: Arc<WorkflowEngine>,
    pub intake_token: Option<String>,
    pub max_upload_bytes: u64,
}

/// Guard for the intake credential. Passes every request when no credential
/// is configured; otherwise the uploader must present the exact token.
pub struct IntakeAuth;

#[rocket::async_trait]
impl<'r> FromRequest<'r> for IntakeAuth {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, ()> {
        let Some(ctx) = req.rocket().state::<ServerContext>() else {
            return Outcome::Error((Status::InternalServerError, ()));
        };
        match &ctx.intake_token {
            None => Outcome::Success(IntakeAuth),
            Some(expected) => match req.headers().get_one(INTAKE_TOKEN_HEADER) {
                Some(got) if got == expected => Outcome::Success(IntakeAuth),
                _ => Outcome::Error((Status::Unauthorized, ())),
            },
        }
    }
}

#[put("/ingest/<key..>", data = "<upload>")]
async fn ingest(
    _auth: IntakeAuth,
    key: PathBuf,
    upload: Data<'_>,
    ctx: &State<ServerContext>,
) -> Result<Json<IngestReceipt>, (Status, String)> {
    let bytes = upload
        .open(ctx.max_upload_bytes.bytes())
        .into_bytes()
        .await
        .map_err(|err| (Status::InternalServerError, err.to_string()))?;
    if !bytes.is_complete() {
        return Err((Status::PayloadTooLarge, "upload exceeds size limit".into()));
    }

    let key = key.to_string_lossy().into_owned();
    match ctx.intake.receive(&key, &bytes) {
        Ok(receipt) => Ok(Json(receipt)),
        Err(err @ StoreError::InvalidKey { .. }) => Err((Status::BadRequest, err.to_string())),
        Err(err) => Err((Status::InternalServerError, err.to_string())),
    }
}

#[post("/workflow-step-state", format = "json", data = "<report>")]
fn report_step_state(
    report: Json<StatusReport>,
    ctx: &State<ServerContext>,
) -> Result<Json<StatusReportResponse>, (Status, String)> {
    match ctx.engine.report_step_outcome(&report) {
        Ok(ack) => Ok(Json(StatusReportResponse {
            status_code: 200,
            body: json!(ack),
        })),
        Err(err) => Err((Status::new(err.rejection_status()), err.to_string())),
    }
}

#[get("/executions/<id>")]
fn execution_status(id: &str, ctx: &State<ServerContext>) -> Option<Json<ExecutionRecord>> {
    ctx.engine.execution_record(id).map(Json)
}

/// Assemble the rocket instance. The bind address follows the configured
/// endpoint visibility.
pub fn build(ctx: ServerContext, server: &ServerConfig) -> Rocket<Build> {
    let figment = rocket::Config::figment()
        .merge(("address", server.visibility.bind_address()))
        .merge(("port", server.port));
    rocket::custom(figment)
        .manage(ctx)
        .mount("/", routes![ingest, report_step_state, execution_status])
}
