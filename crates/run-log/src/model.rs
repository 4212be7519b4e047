//! Event log records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Closed vocabulary of run events.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    RunStart,
    RetrievalResult,
    TrajectoryStart,
    StepStart,
    StepDone,
    StepError,
    GuardFailed,
    StepSkipped,
    TrajectoryDone,
    TaskMemorySummary,
    RuntimeArtifacts,
    ReplayFailed,
    HoldOpen,
    RunFailed,
}

impl EventType {
    /// Events counted as errors in the run summary.
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            EventType::StepError | EventType::GuardFailed | EventType::RunFailed
        )
    }
}

/// One line of `events.jsonl`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EventRecord {
    pub timestamp: DateTime<Utc>,
    pub run_id: String,
    pub event_type: EventType,
    pub payload: Value,
}

/// Contents of `summary.json`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    pub status: String,
    pub elapsed_ms: u64,
    pub events: usize,
    pub errors: usize,
    pub error_events: Vec<EventRecord>,
    pub finished_at: DateTime<Utc>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
