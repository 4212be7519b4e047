//! Navigation and wait actions.

use async_trait::async_trait;

use amw_automation::LoadState;

use crate::actions::param_str;
use crate::errors::ExecError;
use crate::output::ActionOutput;
use crate::registry::{ActionContext, ActionHandler};

/// `open` - navigate to `target`.
pub struct OpenAction;

#[async_trait]
impl ActionHandler for OpenAction {
    async fn run(&self, ctx: ActionContext<'_>) -> Result<ActionOutput, ExecError> {
        let url = ctx.step.target.trim();
        if url.is_empty() {
            return Err(ExecError::Validation("open requires a url in step.target".to_string()));
        }
        let settled = ctx.surface.open(url, ctx.step.timeout_ms).await?;
        Ok(ActionOutput::Navigation { url: settled })
    }
}

/// `get_url` - read the current page URL.
pub struct GetUrlAction;

#[async_trait]
impl ActionHandler for GetUrlAction {
    async fn run(&self, ctx: ActionContext<'_>) -> Result<ActionOutput, ExecError> {
        let url = ctx.surface.current_url().await?;
        Ok(ActionOutput::CurrentUrl { url })
    }
}

/// `wait` - either a load-state wait (`target` is a load state name) or a
/// fixed sleep in milliseconds (from value, target or `params.ms`; default
/// 1000).
pub struct WaitAction;

#[async_trait]
impl ActionHandler for WaitAction {
    async fn run(&self, ctx: ActionContext<'_>) -> Result<ActionOutput, ExecError> {
        if let Some(state) = LoadState::parse(&ctx.step.target) {
            ctx.surface.wait_load(state, ctx.step.timeout_ms).await?;
            return Ok(ActionOutput::Wait {
                waited_ms: None,
                state: Some(state.as_str().to_string()),
            });
        }
        let raw = [
            ctx.step.value.trim(),
            ctx.step.target.trim(),
            &param_str(ctx.step, "ms"),
        ]
        .into_iter()
        .find(|v| !v.is_empty())
        .unwrap_or("")
        .to_string();
        let ms: u64 = raw.parse().unwrap_or(1000);
        ctx.surface.wait_ms(ms).await?;
        Ok(ActionOutput::Wait {
            waited_ms: Some(ms),
            state: None,
        })
    }
}
