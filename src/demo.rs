//! Built-in demonstration: the full pipeline, in process, against the
//! in-memory store. Uploads one clean file and one carrying the EICAR test
//! string, and prints both outcomes.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, bail};

use crate::config::GatehouseConfig;
use crate::intake::IntakeEndpoint;
use crate::scanner::{EICAR_TEST_SIGNATURE, EngineStepStateSender, ScanDispatcher, ScanHandler};
use crate::store::{MemoryStore, StagingStore};
use crate::ui::PipelineProgress;
use crate::workflow::WorkflowEngine;

pub async fn run(config: &GatehouseConfig) -> Result<()> {
    let store: Arc<dyn StagingStore> = Arc::new(MemoryStore::new());
    let engine = WorkflowEngine::new(config.workflow.to_workflow(), store.clone(), None);
    let sender = EngineStepStateSender::new(&engine);
    let handler = Arc::new(ScanHandler::new(
        sender,
        store.clone(),
        &config.scanner.signatures,
    ));
    engine.set_invoker(Arc::new(ScanDispatcher::new(handler)));
    let intake = IntakeEndpoint::new(store, engine.clone());

    run_one(
        &engine,
        &intake,
        "sample.txt",
        b"A perfectly ordinary text file.\n",
    )
    .await?;
    run_one(
        &engine,
        &intake,
        "suspicious.txt",
        EICAR_TEST_SIGNATURE.as_bytes(),
    )
    .await
}

async fn run_one(
    engine: &Arc<WorkflowEngine>,
    intake: &IntakeEndpoint,
    key: &str,
    bytes: &[u8],
) -> Result<()> {
    let progress = PipelineProgress::start(key);
    let receipt = match intake.receive(key, bytes) {
        Ok(receipt) => receipt,
        Err(err) => {
            progress.fail(&err.to_string());
            return Err(err.into());
        }
    };

    progress.awaiting("awaiting scan verdict");
    for _ in 0..100 {
        if let Some(record) = engine.execution_record(&receipt.execution_id)
            && record.status.is_terminal()
        {
            progress.finish(&record);
            return Ok(());
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    progress.fail("timed out waiting for the pipeline");
    bail!("demo execution {} did not finish", receipt.execution_id);
}
