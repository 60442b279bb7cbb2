//! JSONL run-event log for auditing a run after the fact.
//!
//! Each line carries:
//! - a monotonic sequence number
//! - an ISO 8601 timestamp with microsecond precision
//! - the run id shared by every line of one run

use crate::notify::ChannelOutcome;
use crate::report::types::ReportRow;
use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

pub struct RunEventLog {
    run_id: String,
    seq: AtomicU64,
    sink: Option<(Mutex<File>, PathBuf)>,
}

/// A single line of the event log.
#[derive(Debug, Serialize, Deserialize)]
pub struct RunEvent {
    pub seq: u64,
    pub ts: String,
    pub run_id: String,
    pub component: String,
    pub event: Value,
}

impl RunEventLog {
    /// A log that records nothing; used when `--event-log` is not given.
    pub fn disabled(run_id: &str) -> Self {
        Self {
            run_id: run_id.to_string(),
            seq: AtomicU64::new(0),
            sink: None,
        }
    }

    /// Appends to `path`, creating it and its directory if needed.
    pub fn create(run_id: &str, path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create event log directory: {}", parent.display())
            })?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open event log: {}", path.display()))?;

        Ok(Self {
            run_id: run_id.to_string(),
            seq: AtomicU64::new(0),
            sink: Some((Mutex::new(file), path.to_path_buf())),
        })
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn path(&self) -> Option<&Path> {
        self.sink.as_ref().map(|(_, path)| path.as_path())
    }

    fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Writes one event. Thread-safe; write errors are dropped.
    pub fn log(&self, component: &str, event: impl Serialize) {
        let Some((file, _)) = &self.sink else {
            return;
        };
        let entry = RunEvent {
            seq: self.next_seq(),
            ts: Utc::now().format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string(),
            run_id: self.run_id.clone(),
            component: component.to_string(),
            event: serde_json::to_value(event).unwrap_or(Value::Null),
        };

        if let Ok(mut file) = file.lock() {
            if let Ok(line) = serde_json::to_string(&entry) {
                let _ = writeln!(file, "{}", line);
                let _ = file.flush();
            }
        }
    }

    pub fn log_transition(&self, from: &str, to: &str) {
        self.log(
            "Run",
            serde_json::json!({
                "type": "StateTransition",
                "from": from,
                "to": to
            }),
        );
    }

    /// Logs one account's row. Rows never carry credentials.
    pub fn log_account(&self, row: &ReportRow) {
        self.log(
            "Scraper",
            serde_json::json!({
                "type": "AccountOutcome",
                "row": row
            }),
        );
    }

    pub fn log_report(&self, path: Option<&Path>, error: Option<&str>) {
        self.log(
            "Report",
            serde_json::json!({
                "type": "ReportWritten",
                "path": path.map(|p| p.display().to_string()),
                "error": error
            }),
        );
    }

    pub fn log_channel(&self, outcome: &ChannelOutcome) {
        self.log(
            "Notify",
            serde_json::json!({
                "type": "ChannelOutcome",
                "outcome": outcome
            }),
        );
    }

    pub fn log_finished(&self, state: &str, failures: usize) {
        self.log(
            "Run",
            serde_json::json!({
                "type": "RunFinished",
                "state": state,
                "account_failures": failures
            }),
        );
    }
}

#[cfg(test)]
#[path = "tests/run_log_tests.rs"]
mod tests;
