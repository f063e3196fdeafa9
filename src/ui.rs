//! Terminal output for the interactive subcommands: spinner and colored
//! status lines.
//!
//! Uses `indicatif` for the progress spinner and `console` for styling.

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::workflow::{ExecutionRecord, ExecutionStatus};

/// Visual progress indicator for a pipeline run in the terminal.
pub struct PipelineProgress {
    pb: ProgressBar,
    green: Style,
    red: Style,
    dim: Style,
}

impl PipelineProgress {
    /// Start the spinner for an upload.
    pub fn start(key: &str) -> Self {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .expect("invalid template"),
        );
        pb.set_message(format!("ingesting {key}"));
        pb.enable_steady_tick(std::time::Duration::from_millis(100));

        Self {
            pb,
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            dim: Style::new().dim(),
        }
    }

    /// Update the spinner with the step currently awaited.
    pub fn awaiting(&self, what: &str) {
        self.pb.set_message(what.to_string());
    }

    /// Finish the spinner and print the terminal outcome of an execution.
    pub fn finish(&self, record: &ExecutionRecord) {
        self.pb.finish_and_clear();
        match record.status {
            ExecutionStatus::Succeeded => {
                println!(
                    "{} {} tagged clean ({} steps, {}ms)",
                    self.green.apply_to("✔"),
                    record.object_key,
                    record.steps.len(),
                    record.duration_ms
                );
            }
            ExecutionStatus::Failed => {
                let reason = record
                    .failure
                    .as_ref()
                    .map(|kind| kind.to_string())
                    .unwrap_or_else(|| "unknown".to_string());
                println!(
                    "{} {} rejected: {}",
                    self.red.apply_to("✘"),
                    record.object_key,
                    reason
                );
            }
            _ => {
                println!(
                    "{} {} still in flight",
                    self.dim.apply_to("…"),
                    record.object_key
                );
            }
        }
        for step in &record.steps {
            let mark = match &step.outcome {
                crate::workflow::StepOutcome::Success => self.green.apply_to("ok").to_string(),
                crate::workflow::StepOutcome::Failure(kind) => {
                    self.red.apply_to(kind.to_string()).to_string()
                }
            };
            println!("  {} {}", self.dim.apply_to(&step.step), mark);
        }
    }

    /// Finish the spinner with a plain error line.
    pub fn fail(&self, message: &str) {
        self.pb.finish_and_clear();
        println!("{} {message}", self.red.apply_to("✘"));
    }
}
