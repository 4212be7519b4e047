//! Surface provider seam for the CLI.
//!
//! The core drives any [`AutomationSurface`]; wiring a concrete browser
//! binding (CDP, WebDriver, a recording harness) happens here. Without one
//! configured, session-requiring commands fail with a clear error instead of
//! pretending to drive a browser.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use amw_automation::{AutomationSurface, SurfaceError};
use amw_orchestrator::{RunRequest, SurfaceProvider};

/// Provider used until a browser binding is linked in. Carries the
/// configured binary name so the error tells the operator what was expected.
pub struct UnboundSurfaceProvider {
    binary: String,
}

impl UnboundSurfaceProvider {
    pub fn new(binary: &str) -> Self {
        UnboundSurfaceProvider {
            binary: binary.to_string(),
        }
    }
}

#[async_trait]
impl SurfaceProvider for UnboundSurfaceProvider {
    async fn connect(
        &self,
        request: &RunRequest,
    ) -> Result<Arc<dyn AutomationSurface>, SurfaceError> {
        warn!(
            session = %request.session,
            profile = %request.profile,
            "no automation surface binding is linked into this build"
        );
        Err(SurfaceError::Unsupported(format!(
            "no automation surface binding for '{}'; link a surface implementation \
             into the CLI to run browser sessions",
            self.binary
        )))
    }
}
