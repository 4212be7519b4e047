//! Replay-first run orchestration
//!
//! Glues the retriever, the executor and the store into one entry point:
//! retrieve and replay the best stored trajectory, fall back to explicit
//! exploration steps, persist only what succeeded, and always leave a run
//! log behind.

pub mod orchestrator;
pub mod request;

pub use orchestrator::{MemoryOrchestrator, OrchestratorError, RunOutcome, SurfaceProvider};
pub use request::{RunMode, RunRequest};
