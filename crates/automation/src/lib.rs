//! Automation Surface - the abstract browser capability interface
//!
//! The core never drives a browser directly; it calls this trait. Concrete
//! bindings (CDP, WebDriver, a recording harness) live outside the
//! workspace. Extended content operations default to `Unsupported` so a
//! minimal surface only has to implement the core set.

pub mod errors;
pub mod surface;
pub mod types;

pub use errors::SurfaceError;
pub use surface::AutomationSurface;
pub use types::{Capture, Clip, ClickTextOptions, LoadState, ScreenshotRequest, Snapshot};
