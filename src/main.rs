mod audit;
mod cli;
mod config;
mod demo;
mod error;
mod intake;
mod scanner;
mod server;
mod store;
mod ui;
mod workflow;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use log::info;

use crate::audit::AuditLog;
use crate::cli::{Cli, Command, StatusArg};
use crate::config::GatehouseConfig;
use crate::error::GatehouseError;
use crate::intake::{IngestReceipt, IntakeEndpoint};
use crate::scanner::{
    EngineStepStateSender, HttpStepStateClient, ScanDispatcher, ScanHandler, StatusReport,
    StepStateSender,
};
use crate::store::{FsStore, StagingStore};
use crate::ui::PipelineProgress;
use crate::workflow::{ExecutionRecord, WorkflowEngine, WorkflowError};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logger(cli.verbose);
    let config = GatehouseConfig::load(cli.config.as_deref())?;

    match cli.command {
        Command::Serve => serve(config).await?,
        Command::Demo => demo::run(&config).await?,
        Command::Upload {
            file,
            key,
            server,
            token,
        } => upload(file, key, &server, token).await?,
        Command::Report {
            workflow_id,
            execution_id,
            token,
            status,
            server,
        } => report(workflow_id, execution_id, token, status, &server).await?,
        Command::Status {
            execution_id,
            server,
        } => status(&execution_id, &server).await?,
    }
    Ok(())
}

fn init_logger(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default)).init();
}

/// Build the full dependency graph and run the server: storage, audit trail,
/// engine, scanner, intake, wired in that order.
async fn serve(config: GatehouseConfig) -> Result<()> {
    let store: Arc<dyn StagingStore> = Arc::new(FsStore::open(&config.storage.data_dir)?);

    let audit = Arc::new(AuditLog::open(
        &config.audit.dir,
        config.audit.retention_days,
    )?);
    audit.prune()?;

    let engine = WorkflowEngine::new(config.workflow.to_workflow(), store.clone(), Some(audit));
    let sender = EngineStepStateSender::new(&engine);
    let handler = Arc::new(ScanHandler::new(
        sender,
        store.clone(),
        &config.scanner.signatures,
    ));
    engine.set_invoker(Arc::new(ScanDispatcher::new(handler)));

    let intake = Arc::new(IntakeEndpoint::new(store, engine.clone()));

    info!(
        "workflow {} ready; intake on {}:{}",
        engine.workflow_id(),
        config.server.visibility.bind_address(),
        config.server.port
    );

    let ctx = server::ServerContext {
        intake,
        engine,
        intake_token: config.server.intake_token.clone(),
        max_upload_bytes: config.server.max_upload_bytes,
    };
    server::build(ctx, &config.server).launch().await?;
    Ok(())
}

/// Push a local file into a running server's intake endpoint and follow the
/// resulting execution until it settles.
async fn upload(
    file: PathBuf,
    key: Option<String>,
    server: &str,
    token: Option<String>,
) -> Result<(), GatehouseError> {
    let bytes = std::fs::read(&file)?;
    let key = key.unwrap_or_else(|| {
        file.file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload.bin".to_string())
    });

    let progress = PipelineProgress::start(&key);
    let client = reqwest::Client::new();
    let base = server.trim_end_matches('/');
    let mut request = client.put(format!("{base}/ingest/{key}")).body(bytes);
    if let Some(token) = token {
        request = request.header(server::INTAKE_TOKEN_HEADER, token);
    }

    let response = request.send().await?;
    if !response.status().is_success() {
        let status = response.status().as_u16();
        let message = response.text().await.unwrap_or_default();
        progress.fail(&format!("upload rejected (status {status})"));
        return Err(GatehouseError::UploadRejected { status, message });
    }
    let receipt = response.json::<IngestReceipt>().await?;

    progress.awaiting("awaiting scan verdict");
    let status_url = format!("{base}/executions/{}", receipt.execution_id);
    for _ in 0..240 {
        let response = client.get(&status_url).send().await?;
        if response.status().is_success() {
            let record = response.json::<ExecutionRecord>().await?;
            if record.status.is_terminal() {
                progress.finish(&record);
                return Ok(());
            }
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
    }

    progress.fail("gave up waiting for the execution to settle");
    Ok(())
}

/// Redeem a continuation token against a running server.
async fn report(
    workflow_id: String,
    execution_id: String,
    token: String,
    status: StatusArg,
    server: &str,
) -> Result<(), GatehouseError> {
    let client = HttpStepStateClient::new(server);
    let response = client
        .send_report(&StatusReport {
            workflow_id,
            execution_id,
            token,
            status: status.into(),
        })
        .await?;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

/// Fetch and print one execution's state from a running server.
async fn status(execution_id: &str, server: &str) -> Result<(), GatehouseError> {
    let url = format!(
        "{}/executions/{execution_id}",
        server.trim_end_matches('/')
    );
    let response = reqwest::get(&url).await?;
    if response.status() == reqwest::StatusCode::NOT_FOUND {
        return Err(GatehouseError::Workflow(WorkflowError::UnknownExecution {
            id: execution_id.to_string(),
        }));
    }
    let record = response.json::<ExecutionRecord>().await?;
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}
