//! The Automation Surface trait.

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::SurfaceError;
use crate::types::{Capture, ClickTextOptions, LoadState, ScreenshotRequest, Snapshot};

/// Async capability interface over a live browser session.
///
/// Every operation is a true suspension point; the executor awaits each call
/// to completion before the next step begins. Timeouts are passed through;
/// there is no mid-call preemption.
#[async_trait]
pub trait AutomationSurface: Send + Sync {
    /// Navigate to a URL and wait for the initial load. Returns the settled
    /// URL, which may differ from the request after redirects.
    async fn open(&self, url: &str, timeout_ms: u64) -> Result<String, SurfaceError>;

    /// Click the element matching a selector.
    async fn click(&self, selector: &str, timeout_ms: u64) -> Result<(), SurfaceError>;

    /// Clear and set an input's value.
    async fn fill(&self, selector: &str, value: &str, timeout_ms: u64) -> Result<(), SurfaceError>;

    /// Type text with key events (no clearing).
    async fn type_text(&self, selector: &str, text: &str, timeout_ms: u64)
        -> Result<(), SurfaceError>;

    /// Press a key or key combination.
    async fn press(&self, key: &str, timeout_ms: u64) -> Result<(), SurfaceError>;

    /// Sleep for a fixed duration.
    async fn wait_ms(&self, ms: u64) -> Result<(), SurfaceError>;

    /// Wait for a page load state.
    async fn wait_load(&self, state: LoadState, timeout_ms: u64) -> Result<(), SurfaceError>;

    /// Capture page structure; `interactive` additionally resolves the
    /// `@ref` table for follow-up targeting.
    async fn snapshot(&self, interactive: bool) -> Result<Snapshot, SurfaceError>;

    /// Current page URL.
    async fn current_url(&self) -> Result<String, SurfaceError>;

    /// Evaluate a script in page context and return its JSON value.
    async fn evaluate(
        &self,
        script: &str,
        arg: Option<Value>,
        timeout_ms: u64,
    ) -> Result<Value, SurfaceError>;

    /// Capture a screenshot per the request.
    async fn screenshot(&self, request: &ScreenshotRequest) -> Result<Capture, SurfaceError>;

    /// Close the session. Idempotent.
    async fn close(&self) -> Result<(), SurfaceError>;

    // --- extended operations -------------------------------------------
    // Optional; minimal surfaces keep the Unsupported defaults.

    /// Click an element located by its visible text.
    async fn click_text(&self, text: &str, opts: &ClickTextOptions) -> Result<(), SurfaceError> {
        let _ = (text, opts);
        Err(SurfaceError::Unsupported("click_text".to_string()))
    }

    /// Inner text of the element matching a selector.
    async fn get_text(&self, selector: &str, timeout_ms: u64) -> Result<String, SurfaceError> {
        let _ = (selector, timeout_ms);
        Err(SurfaceError::Unsupported("get_text".to_string()))
    }

    /// Attribute value of the element matching a selector.
    async fn get_attribute(
        &self,
        selector: &str,
        attr: &str,
        timeout_ms: u64,
    ) -> Result<String, SurfaceError> {
        let _ = (selector, attr, timeout_ms);
        Err(SurfaceError::Unsupported("get_attribute".to_string()))
    }

    /// Insert text at the current focus without key events.
    async fn insert_text(&self, text: &str, timeout_ms: u64) -> Result<(), SurfaceError> {
        let _ = (text, timeout_ms);
        Err(SurfaceError::Unsupported("insert_text".to_string()))
    }

    /// Attach a local file to a file input.
    async fn set_input_files(
        &self,
        selector: &str,
        path: &str,
        timeout_ms: u64,
    ) -> Result<Value, SurfaceError> {
        let _ = (selector, path, timeout_ms);
        Err(SurfaceError::Unsupported("set_input_files".to_string()))
    }

    /// Download the original resource behind an element (e.g. the full-size
    /// image an `<img>` points at) instead of rasterizing the viewport.
    async fn download_original(
        &self,
        selector: &str,
        path: &str,
        attr: Option<&str>,
        timeout_ms: u64,
    ) -> Result<Capture, SurfaceError> {
        let _ = (selector, path, attr, timeout_ms);
        Err(SurfaceError::Unsupported("download_original".to_string()))
    }
}
