//! Configuration loaded from `gatehouse.toml`.
//!
//! [`GatehouseConfig`] holds every tunable. Values missing from the file use
//! sensible defaults, so the pipeline runs with no file at all. The
//! `GATEHOUSE_INTAKE_TOKEN` environment variable takes precedence over the
//! file for the intake credential.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use serde::Deserialize;

use crate::workflow::Workflow;

const CONFIG_FILE: &str = "gatehouse.toml";
const INTAKE_TOKEN_ENV: &str = "GATEHOUSE_INTAKE_TOKEN";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GatehouseConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub workflow: WorkflowConfig,
    #[serde(default)]
    pub scanner: ScannerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub audit: AuditConfig,
}

/// Who can reach the intake endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// Bind every interface.
    Public,
    /// Loopback only.
    Local,
}

impl Visibility {
    pub fn bind_address(&self) -> &'static str {
        match self {
            Visibility::Public => "0.0.0.0",
            Visibility::Local => "127.0.0.1",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_visibility")]
    pub visibility: Visibility,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Shared intake credential. `None` disables the check (demo, trusted
    /// networks); the env var takes precedence over the file.
    #[serde(default)]
    pub intake_token: Option<String>,

    /// Upper bound on a single uploaded object.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,
}

fn default_visibility() -> Visibility {
    Visibility::Public
}

fn default_port() -> u16 {
    8022
}

fn default_max_upload_bytes() -> u64 {
    64 * 1024 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            visibility: default_visibility(),
            port: default_port(),
            intake_token: None,
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowConfig {
    #[serde(default = "default_workflow_id")]
    pub id: String,

    /// Canonical prefix the copy step re-homes uploads under.
    #[serde(default = "default_copy_prefix")]
    pub copy_prefix: String,

    /// How long the custom step waits for its token before failing.
    #[serde(default = "default_step_timeout_secs")]
    pub step_timeout_secs: u64,
}

fn default_workflow_id() -> String {
    "file-ingestion".to_string()
}

fn default_copy_prefix() -> String {
    "incoming/".to_string()
}

fn default_step_timeout_secs() -> u64 {
    60
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            id: default_workflow_id(),
            copy_prefix: default_copy_prefix(),
            step_timeout_secs: default_step_timeout_secs(),
        }
    }
}

impl WorkflowConfig {
    pub fn step_timeout(&self) -> Duration {
        Duration::from_secs(self.step_timeout_secs)
    }

    /// Build the workflow definition this configuration describes.
    pub fn to_workflow(&self) -> Workflow {
        Workflow::ingestion(&self.id, &self.copy_prefix, self.step_timeout())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScannerConfig {
    /// Byte signatures treated as malicious. Defaults to the EICAR test
    /// string.
    #[serde(default = "default_signatures")]
    pub signatures: Vec<String>,
}

fn default_signatures() -> Vec<String> {
    vec![crate::scanner::EICAR_TEST_SIGNATURE.to_string()]
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            signatures: default_signatures(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuditConfig {
    #[serde(default = "default_audit_dir")]
    pub dir: PathBuf,

    /// Audit files older than this many days are pruned at startup.
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

fn default_audit_dir() -> PathBuf {
    PathBuf::from("./audit")
}

fn default_retention_days() -> u32 {
    14
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            dir: default_audit_dir(),
            retention_days: default_retention_days(),
        }
    }
}

impl GatehouseConfig {
    /// Load configuration from `path`, or `gatehouse.toml` in the current
    /// directory. Uses defaults if the file does not exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path.unwrap_or(Path::new(CONFIG_FILE));
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            toml::from_str::<GatehouseConfig>(&contents)?
        } else {
            Self::default()
        };

        // Environment takes precedence over the file for the credential.
        if let Ok(token) = std::env::var(INTAKE_TOKEN_ENV)
            && !token.is_empty()
        {
            config.server.intake_token = Some(token);
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let config = GatehouseConfig::default();
        assert_eq!(config.server.visibility, Visibility::Public);
        assert_eq!(config.server.port, 8022);
        assert!(config.server.intake_token.is_none());
        assert_eq!(config.workflow.step_timeout_secs, 60);
        assert_eq!(config.workflow.copy_prefix, "incoming/");
        assert_eq!(config.audit.retention_days, 14);
        assert_eq!(config.scanner.signatures.len(), 1);
    }

    #[test]
    fn deserialize_partial_toml() {
        let toml_str = r#"
            [server]
            visibility = "local"
            port = 9000

            [workflow]
            step_timeout_secs = 5
        "#;
        let config: GatehouseConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.visibility, Visibility::Local);
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.max_upload_bytes, 64 * 1024 * 1024);
        assert_eq!(config.workflow.step_timeout_secs, 5);
        assert_eq!(config.workflow.id, "file-ingestion");
        assert_eq!(config.audit.retention_days, 14);
    }

    #[test]
    fn bind_addresses() {
        assert_eq!(Visibility::Public.bind_address(), "0.0.0.0");
        assert_eq!(Visibility::Local.bind_address(), "127.0.0.1");
    }

    #[test]
    fn workflow_config_builds_three_step_pipeline() {
        let workflow = WorkflowConfig::default().to_workflow();
        assert_eq!(workflow.id, "file-ingestion");
        assert_eq!(workflow.steps.len(), 3);
    }

    #[test]
    fn load_falls_back_to_defaults() {
        // No gatehouse.toml in the test working directory.
        let config = GatehouseConfig::load(Some(Path::new("does-not-exist.toml"))).unwrap();
        assert_eq!(config.workflow.step_timeout_secs, 60);
    }
}
