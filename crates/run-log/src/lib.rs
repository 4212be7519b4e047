//! Structured run event log
//!
//! One JSONL record per event under `runs/<run_id>/events.jsonl`, plus a
//! `summary.json` written when the run finishes. Appends never fail the
//! caller: a write problem degrades to a `tracing` warning, because logging
//! must not abort an execution.

pub mod logger;
pub mod model;

pub use logger::RunLogger;
pub use model::{EventRecord, EventType, RunSummary};
