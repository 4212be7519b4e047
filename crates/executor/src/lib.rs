//! Trajectory executor
//!
//! The sequential state machine that replays a trajectory against a live
//! automation surface: template rendering, action dispatch through the
//! registry, `save_as` variable propagation, best-effort page-memory
//! bookkeeping, guard evaluation and optional-step degradation.

pub mod actions;
pub mod errors;
pub mod executor;
pub mod output;
pub mod page_memory;
pub mod registry;
pub mod runtime;
pub mod template;

pub use errors::ExecError;
pub use executor::{HumanHandoff, ReplayReport, StdinHandoff, TrajectoryExecutor, HUMAN_HANDOFF_ACTION};
pub use output::ActionOutput;
pub use page_memory::TaskMemory;
pub use registry::{ActionContext, ActionHandler, ActionRegistry};
pub use runtime::{Artifacts, RuntimeState};
pub use template::{render_step, render_string, render_value, TemplateError};
