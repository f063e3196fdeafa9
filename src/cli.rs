//! clap-based command-line interface.
//!
//! Defines the [`Cli`] struct with subcommands [`Command`] (serve, demo,
//! upload, report, status) and global flags (--config, --verbose).

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::scanner::StepStatus;

/// gatehouse: file-ingestion pipeline with malware-scan gating.
#[derive(Debug, Parser)]
#[command(name = "gatehouse", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Path to the configuration file (default: gatehouse.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

/// Step verdict accepted on the command line, mapped to
/// [`StepStatus`](crate::scanner::StepStatus) internally.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum StatusArg {
    /// The object passed inspection.
    Success,
    /// The object failed inspection.
    Failure,
}

impl From<StatusArg> for StepStatus {
    fn from(arg: StatusArg) -> Self {
        match arg {
            StatusArg::Success => StepStatus::Success,
            StatusArg::Failure => StepStatus::Failure,
        }
    }
}

fn default_server() -> String {
    "http://127.0.0.1:8022".to_string()
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the intake endpoint and workflow engine.
    Serve,

    /// Run one pipeline execution end-to-end in process.
    Demo,

    /// Upload a local file to a running server.
    Upload {
        /// File to upload.
        file: PathBuf,

        /// Object key to store it under (default: the file name).
        #[arg(long)]
        key: Option<String>,

        /// Base URL of the server.
        #[arg(long, default_value_t = default_server())]
        server: String,

        /// Intake credential, if the server requires one.
        #[arg(long)]
        token: Option<String>,
    },

    /// Redeem a continuation token with a verdict against a running server.
    Report {
        #[arg(long)]
        workflow_id: String,

        #[arg(long)]
        execution_id: String,

        #[arg(long)]
        token: String,

        #[arg(long, value_enum)]
        status: StatusArg,

        /// Base URL of the server.
        #[arg(long, default_value_t = default_server())]
        server: String,
    },

    /// Show the state of an execution on a running server.
    Status {
        execution_id: String,

        /// Base URL of the server.
        #[arg(long, default_value_t = default_server())]
        server: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_parses_serve_subcommand() {
        let cli = Cli::parse_from(["gatehouse", "serve"]);
        assert!(matches!(cli.command, Command::Serve));
        assert!(!cli.verbose);
    }

    #[test]
    fn cli_parses_global_flags() {
        let cli = Cli::parse_from(["gatehouse", "--config", "other.toml", "--verbose", "demo"]);
        assert!(cli.verbose);
        assert_eq!(cli.config.unwrap(), PathBuf::from("other.toml"));
        assert!(matches!(cli.command, Command::Demo));
    }

    #[test]
    fn cli_parses_upload_subcommand() {
        let cli = Cli::parse_from([
            "gatehouse",
            "upload",
            "sample.txt",
            "--key",
            "incoming/sample.txt",
        ]);
        match cli.command {
            Command::Upload {
                file,
                key,
                server,
                token,
            } => {
                assert_eq!(file, PathBuf::from("sample.txt"));
                assert_eq!(key.unwrap(), "incoming/sample.txt");
                assert_eq!(server, "http://127.0.0.1:8022");
                assert!(token.is_none());
            }
            _ => panic!("expected Upload command"),
        }
    }

    #[test]
    fn cli_parses_report_subcommand() {
        let cli = Cli::parse_from([
            "gatehouse",
            "report",
            "--workflow-id",
            "w1",
            "--execution-id",
            "e1",
            "--token",
            "t1",
            "--status",
            "failure",
        ]);
        match cli.command {
            Command::Report { status, .. } => {
                assert!(matches!(StepStatus::from(status), StepStatus::Failure));
            }
            _ => panic!("expected Report command"),
        }
    }

    #[test]
    fn cli_verify() {
        Cli::command().debug_assert();
    }
}
