//! Error kinds an automation surface may raise.

use thiserror::Error;

/// Surface-specific failure. Any operation may fail with any of these; the
/// executor treats the whole family as one error class when deciding
/// optional-step degradation and best-effort bookkeeping.
#[derive(Clone, Debug, Error)]
pub enum SurfaceError {
    /// Operation exceeded its timeout.
    #[error("surface timeout: {0}")]
    Timeout(String),

    /// Selector or text anchor resolved to nothing.
    #[error("selector not found: {0}")]
    SelectorNotFound(String),

    /// Element exists but cannot be interacted with.
    #[error("element not interactable: {0}")]
    NotInteractable(String),

    /// Navigation failed or the page never reached the requested state.
    #[error("navigation failed: {0}")]
    Navigation(String),

    /// In-page script evaluation failed.
    #[error("script evaluation failed: {0}")]
    Script(String),

    /// Transport or process error between the core and the browser.
    #[error("surface I/O error: {0}")]
    Io(String),

    /// The browser session is gone.
    #[error("session closed: {0}")]
    SessionClosed(String),

    /// The surface does not implement this operation.
    #[error("operation not supported by this surface: {0}")]
    Unsupported(String),

    /// Anything else.
    #[error("surface internal error: {0}")]
    Internal(String),
}

impl SurfaceError {
    /// Whether a retry at a higher layer could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SurfaceError::Timeout(_) | SurfaceError::NotInteractable(_) | SurfaceError::Io(_)
        )
    }
}
