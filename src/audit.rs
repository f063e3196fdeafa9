//! Append-only audit trail of terminal executions.
//!
//! One JSON line per execution, in a file per day. Files older than the
//! retention window are pruned at startup.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, Utc};
use log::info;

use crate::workflow::ExecutionRecord;

const FILE_PREFIX: &str = "audit-";
const FILE_SUFFIX: &str = ".jsonl";

pub struct AuditLog {
    dir: PathBuf,
    retention_days: u32,
}

impl AuditLog {
    /// Open (creating if needed) an audit directory with the given retention.
    pub fn open(dir: impl Into<PathBuf>, retention_days: u32) -> std::io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            retention_days,
        })
    }

    /// Append one execution record to today's file.
    pub fn append(&self, record: &ExecutionRecord) -> anyhow::Result<()> {
        let date = record.updated_at.date_naive();
        let path = self.dir.join(format!("{FILE_PREFIX}{date}{FILE_SUFFIX}"));
        let mut file = fs::OpenOptions::new().create(true).append(true).open(path)?;
        serde_json::to_writer(&mut file, record)?;
        file.write_all(b"\n")?;
        Ok(())
    }

    /// Delete audit files older than the retention window. Returns how many
    /// files were removed.
    pub fn prune(&self) -> std::io::Result<usize> {
        let cutoff = Utc::now().date_naive() - chrono::Duration::days(self.retention_days as i64);
        let mut removed = 0;
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let Some(date) = file_date(&entry.path()) else {
                continue;
            };
            if date < cutoff {
                fs::remove_file(entry.path())?;
                removed += 1;
            }
        }
        if removed > 0 {
            info!("pruned {removed} audit file(s) past {}-day retention", self.retention_days);
        }
        Ok(removed)
    }
}

/// Parse the date out of an `audit-YYYY-MM-DD.jsonl` file name.
fn file_date(path: &Path) -> Option<NaiveDate> {
    let name = path.file_name()?.to_str()?;
    let date = name.strip_prefix(FILE_PREFIX)?.strip_suffix(FILE_SUFFIX)?;
    date.parse().ok()
}
