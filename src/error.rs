use thiserror::Error;

use crate::scanner::ScanError;
use crate::store::StoreError;
use crate::workflow::WorkflowError;

#[derive(Debug, Error)]
pub enum GatehouseError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Workflow error: {0}")]
    Workflow(#[from] WorkflowError),

    #[error("Scan error: {0}")]
    Scan(#[from] ScanError),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Upload rejected (status {status}): {message}")]
    UploadRejected { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}
