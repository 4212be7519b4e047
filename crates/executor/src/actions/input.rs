//! Pointer and keyboard actions.

use async_trait::async_trait;

use amw_automation::ClickTextOptions;

use crate::actions::{first_non_empty, param_bool, param_str};
use crate::errors::ExecError;
use crate::output::ActionOutput;
use crate::registry::{ActionContext, ActionHandler};

fn require_target(ctx: &ActionContext<'_>, action: &str) -> Result<String, ExecError> {
    let target = ctx.step.target.trim().to_string();
    if target.is_empty() {
        return Err(ExecError::Validation(format!(
            "{action} requires a selector in step.target"
        )));
    }
    Ok(target)
}

/// `click` - click the element matching `target`.
pub struct ClickAction;

#[async_trait]
impl ActionHandler for ClickAction {
    async fn run(&self, ctx: ActionContext<'_>) -> Result<ActionOutput, ExecError> {
        let target = require_target(&ctx, "click")?;
        ctx.surface.click(&target, ctx.step.timeout_ms).await?;
        Ok(ActionOutput::Interaction { action: "click".to_string() })
    }
}

/// `click_text` - click an element located by visible text (value, target or
/// `params.text`), with `params.exact` / `params.index` refinements.
pub struct ClickTextAction;

#[async_trait]
impl ActionHandler for ClickTextAction {
    async fn run(&self, ctx: ActionContext<'_>) -> Result<ActionOutput, ExecError> {
        let text = first_non_empty(&[
            &ctx.step.value,
            &ctx.step.target,
            &param_str(ctx.step, "text"),
        ]);
        if text.is_empty() {
            return Err(ExecError::Validation(
                "click_text requires text in step.value/target/params.text".to_string(),
            ));
        }
        let opts = ClickTextOptions {
            exact: param_bool(ctx.step, "exact"),
            index: param_str(ctx.step, "index").parse().unwrap_or(0),
            timeout_ms: ctx.step.timeout_ms,
        };
        ctx.surface.click_text(&text, &opts).await?;
        Ok(ActionOutput::Interaction { action: "click_text".to_string() })
    }
}

/// `fill` - clear and set the input matching `target` to `value`.
pub struct FillAction;

#[async_trait]
impl ActionHandler for FillAction {
    async fn run(&self, ctx: ActionContext<'_>) -> Result<ActionOutput, ExecError> {
        let target = require_target(&ctx, "fill")?;
        ctx.surface.fill(&target, &ctx.step.value, ctx.step.timeout_ms).await?;
        Ok(ActionOutput::Interaction { action: "fill".to_string() })
    }
}

/// `type` - type `value` into `target` with key events.
pub struct TypeAction;

#[async_trait]
impl ActionHandler for TypeAction {
    async fn run(&self, ctx: ActionContext<'_>) -> Result<ActionOutput, ExecError> {
        let target = require_target(&ctx, "type")?;
        ctx.surface.type_text(&target, &ctx.step.value, ctx.step.timeout_ms).await?;
        Ok(ActionOutput::Interaction { action: "type".to_string() })
    }
}

/// `press` - press the key named by `target` (or `value`).
pub struct PressAction;

#[async_trait]
impl ActionHandler for PressAction {
    async fn run(&self, ctx: ActionContext<'_>) -> Result<ActionOutput, ExecError> {
        let key = first_non_empty(&[&ctx.step.target, &ctx.step.value]);
        if key.is_empty() {
            return Err(ExecError::Validation(
                "press requires a key in step.target or step.value".to_string(),
            ));
        }
        ctx.surface.press(&key, ctx.step.timeout_ms).await?;
        Ok(ActionOutput::Interaction { action: "press".to_string() })
    }
}
