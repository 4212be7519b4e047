//! Page capture and script actions.

use async_trait::async_trait;

use amw_automation::ScreenshotRequest;

use crate::actions::{first_non_empty, param_bool, param_str, resolve_clip};
use crate::errors::ExecError;
use crate::output::ActionOutput;
use crate::registry::{ActionContext, ActionHandler};

/// `snapshot` - capture page structure; an interactive token in
/// `params.interactive`, value or target requests the `@ref` table.
pub struct SnapshotAction;

#[async_trait]
impl ActionHandler for SnapshotAction {
    async fn run(&self, ctx: ActionContext<'_>) -> Result<ActionOutput, ExecError> {
        let token = first_non_empty(&[
            &param_str(ctx.step, "interactive"),
            &ctx.step.value,
            &ctx.step.target,
        ])
        .to_lowercase();
        let interactive = matches!(token.as_str(), "1" | "true" | "i" | "interactive");
        let snapshot = ctx.surface.snapshot(interactive).await?;
        Ok(ActionOutput::Snapshot {
            ref_count: snapshot.refs.len(),
            tree: snapshot.tree,
        })
    }
}

/// `screenshot` - rasterize the page, an element or a clip region to a file.
pub struct ScreenshotAction;

#[async_trait]
impl ActionHandler for ScreenshotAction {
    async fn run(&self, ctx: ActionContext<'_>) -> Result<ActionOutput, ExecError> {
        let request = ScreenshotRequest {
            path: first_non_empty(&[
                &ctx.step.target,
                &ctx.step.value,
                &param_str(ctx.step, "path"),
            ]),
            selector: param_str(ctx.step, "selector"),
            clip: resolve_clip(ctx.step),
            full_page: param_bool(ctx.step, "full_page"),
            timeout_ms: ctx.step.timeout_ms,
        };
        let capture = ctx.surface.screenshot(&request).await?;
        ctx.runtime.artifacts.record(&capture.path);
        Ok(ActionOutput::Capture {
            path: capture.path,
            url: capture.url,
            source: capture.source,
        })
    }
}

/// `eval_js` - evaluate a script (value or `params.script`) in page context.
pub struct EvalJsAction;

#[async_trait]
impl ActionHandler for EvalJsAction {
    async fn run(&self, ctx: ActionContext<'_>) -> Result<ActionOutput, ExecError> {
        let script = first_non_empty(&[&ctx.step.value, &param_str(ctx.step, "script")]);
        if script.is_empty() {
            return Err(ExecError::Validation(
                "eval_js requires JavaScript in step.value or params.script".to_string(),
            ));
        }
        let arg = ctx.step.params.get("arg").cloned();
        let value = ctx.surface.evaluate(&script, arg, ctx.step.timeout_ms).await?;
        Ok(ActionOutput::Value { value })
    }
}
