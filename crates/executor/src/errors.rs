//! Executor error taxonomy.

use thiserror::Error;

use amw_automation::SurfaceError;

use crate::template::TemplateError;

/// Step execution failures.
///
/// `Validation`, `UnsupportedAction` and `Template` are always step-fatal.
/// `Surface`, `Guard` and `Io` degrade to a logged skip when the step is
/// optional. Nothing here is process-fatal: the executor converts every
/// failure into a structured replay report.
#[derive(Debug, Error)]
pub enum ExecError {
    /// Malformed step input, caught before dispatch.
    #[error("validation failed: {0}")]
    Validation(String),

    /// No handler registered for the step's action name.
    #[error("unsupported action '{0}'; register it in the action registry")]
    UnsupportedAction(String),

    /// A `{{token}}` did not resolve.
    #[error(transparent)]
    Template(#[from] TemplateError),

    /// The automation surface failed the underlying operation.
    #[error(transparent)]
    Surface(#[from] SurfaceError),

    /// A post-condition guard did not hold.
    #[error("guard failed for step {step_id}")]
    Guard { step_id: String },

    /// Local filesystem failure inside a content action.
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for ExecError {
    fn from(err: std::io::Error) -> Self {
        ExecError::Io(err.to_string())
    }
}

impl ExecError {
    /// Whether an optional step may absorb this failure as a skip. Rendering
    /// happens before dispatch, so an unresolved template is malformed input
    /// rather than a runtime failure of the step.
    pub fn degradable(&self) -> bool {
        !matches!(
            self,
            ExecError::Validation(_) | ExecError::UnsupportedAction(_) | ExecError::Template(_)
        )
    }
}
