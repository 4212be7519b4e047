//! Per-run JSONL writer.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::Utc;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use tracing::warn;
use uuid::Uuid;

use crate::model::{EventRecord, EventType, RunSummary};

fn short_run_id() -> String {
    let id: String = Uuid::new_v4().simple().to_string().chars().take(8).collect();
    format!("run_{id}")
}

/// Writes one run's events and final summary under `<base>/runs/<run_id>/`.
pub struct RunLogger {
    run_id: String,
    run_dir: PathBuf,
    events_path: PathBuf,
    summary_path: PathBuf,
    started: Instant,
    sink: Mutex<Option<File>>,
}

impl RunLogger {
    pub fn new(base_dir: &Path) -> std::io::Result<Self> {
        Self::with_run_id(base_dir, &short_run_id())
    }

    pub fn with_run_id(base_dir: &Path, run_id: &str) -> std::io::Result<Self> {
        let run_dir = base_dir.join("runs").join(run_id);
        fs::create_dir_all(&run_dir)?;
        let events_path = run_dir.join("events.jsonl");
        let sink = OpenOptions::new().create(true).append(true).open(&events_path)?;
        Ok(RunLogger {
            run_id: run_id.to_string(),
            summary_path: run_dir.join("summary.json"),
            events_path,
            run_dir,
            started: Instant::now(),
            sink: Mutex::new(Some(sink)),
        })
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    /// Append one event. Infallible at the call site; a failed write is
    /// reported through `tracing` and the run continues.
    pub fn event(&self, event_type: EventType, payload: Value) {
        let record = EventRecord {
            timestamp: Utc::now(),
            run_id: self.run_id.clone(),
            event_type,
            payload,
        };
        let mut guard = self.sink.lock();
        let Some(file) = guard.as_mut() else {
            warn!(run_id = %self.run_id, ?event_type, "event log closed, dropping event");
            return;
        };
        match serde_json::to_string(&record) {
            Ok(line) => {
                if let Err(err) = writeln!(file, "{line}").and_then(|_| file.flush()) {
                    warn!(run_id = %self.run_id, %err, "failed to append run event");
                }
            }
            Err(err) => warn!(run_id = %self.run_id, %err, "failed to encode run event"),
        }
    }

    /// Read back every well-formed event line; malformed lines are skipped.
    pub fn read_events(&self) -> Vec<EventRecord> {
        let Ok(file) = File::open(&self.events_path) else {
            return Vec::new();
        };
        BufReader::new(file)
            .lines()
            .map_while(Result::ok)
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| serde_json::from_str(&line).ok())
            .collect()
    }

    /// Aggregate the event stream into `summary.json` and return it. `extra`
    /// fields are flattened into the summary object.
    pub fn summarize(&self, status: &str, extra: Map<String, Value>) -> RunSummary {
        let events = self.read_events();
        let error_events: Vec<EventRecord> = events
            .iter()
            .filter(|e| e.event_type.is_error())
            .cloned()
            .collect();
        let last_errors = error_events
            .iter()
            .rev()
            .take(5)
            .rev()
            .cloned()
            .collect::<Vec<_>>();

        let summary = RunSummary {
            run_id: self.run_id.clone(),
            status: status.to_string(),
            elapsed_ms: self.started.elapsed().as_millis() as u64,
            events: events.len(),
            errors: error_events.len(),
            error_events: last_errors,
            finished_at: Utc::now(),
            extra,
        };
        match serde_json::to_vec_pretty(&summary) {
            Ok(bytes) => {
                if let Err(err) = fs::write(&self.summary_path, bytes) {
                    warn!(run_id = %self.run_id, %err, "failed to write run summary");
                }
            }
            Err(err) => warn!(run_id = %self.run_id, %err, "failed to encode run summary"),
        }
        summary
    }
}
