//! Clipboard-style content actions. The clipboard lives in the
//! `vars.__clipboard` subtree so it propagates between steps like any other
//! runtime variable.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;

use amw_automation::ScreenshotRequest;

use crate::actions::{
    first_non_empty, param_bool, param_str, resolve_clip, text_from_step_or_var,
    value_to_plain_string,
};
use crate::errors::ExecError;
use crate::output::ActionOutput;
use crate::registry::{ActionContext, ActionHandler};

const CLIPBOARD_TEXT: &str = "__clipboard.text";
const CLIPBOARD_IMAGE_PATH: &str = "__clipboard.image_path";
const CLIPBOARD_IMAGE_URL: &str = "__clipboard.image_url";

/// `copy_text` - extract text from an element (or take it from value,
/// `params.from_var` or the last result) into the clipboard.
pub struct CopyTextAction;

#[async_trait]
impl ActionHandler for CopyTextAction {
    async fn run(&self, ctx: ActionContext<'_>) -> Result<ActionOutput, ExecError> {
        let target = ctx.step.target.trim();
        let text = if !target.is_empty() {
            let attr = param_str(ctx.step, "attr");
            if !attr.is_empty() {
                ctx.surface.get_attribute(target, &attr, ctx.step.timeout_ms).await?
            } else {
                let mut text = ctx.surface.get_text(target, ctx.step.timeout_ms).await?;
                if text.is_empty() {
                    // input elements expose their content as the value attr
                    let value = ctx
                        .surface
                        .get_attribute(target, "value", ctx.step.timeout_ms)
                        .await?;
                    if !value.is_empty() {
                        text = value;
                    }
                }
                text
            }
        } else if !ctx.step.value.is_empty() {
            ctx.step.value.clone()
        } else {
            let from_var = param_str(ctx.step, "from_var");
            if !from_var.is_empty() {
                value_to_plain_string(ctx.runtime.get_var(&from_var))
            } else {
                value_to_plain_string(ctx.runtime.last_result.as_ref())
            }
        };
        ctx.runtime.set_var(CLIPBOARD_TEXT, Value::String(text.clone()));
        Ok(ActionOutput::text(text))
    }
}

/// `paste_text` - fill `target` (or insert at focus) with the value,
/// `params.from_var` or the clipboard text.
pub struct PasteTextAction;

#[async_trait]
impl ActionHandler for PasteTextAction {
    async fn run(&self, ctx: ActionContext<'_>) -> Result<ActionOutput, ExecError> {
        let text = text_from_step_or_var(ctx.step, ctx.runtime, CLIPBOARD_TEXT);
        let target = ctx.step.target.trim();
        if !target.is_empty() {
            ctx.surface.fill(target, &text, ctx.step.timeout_ms).await?;
        } else {
            ctx.surface.insert_text(&text, ctx.step.timeout_ms).await?;
        }
        Ok(ActionOutput::text(text))
    }
}

/// `copy_image` - capture an element or clip region into an image file; with
/// `params.original` (or `params.mode = "original"`) download the original
/// resource instead of rasterizing.
pub struct CopyImageAction;

#[async_trait]
impl ActionHandler for CopyImageAction {
    async fn run(&self, ctx: ActionContext<'_>) -> Result<ActionOutput, ExecError> {
        let selector = first_non_empty(&[&param_str(ctx.step, "selector"), &ctx.step.target]);
        let output_path = first_non_empty(&[&param_str(ctx.step, "path"), &ctx.step.value]);
        let clip = resolve_clip(ctx.step);
        let wants_original = param_bool(ctx.step, "original")
            || param_str(ctx.step, "mode").to_lowercase() == "original";

        if selector.is_empty() && clip.is_none() {
            return Err(ExecError::Validation(
                "copy_image requires selector (target/params.selector) or clip (params.clip/x/y/width/height)"
                    .to_string(),
            ));
        }

        let capture = if wants_original && !selector.is_empty() {
            let attr = param_str(ctx.step, "attr");
            let attr = (!attr.is_empty()).then_some(attr.as_str());
            ctx.surface
                .download_original(&selector, &output_path, attr, ctx.step.timeout_ms)
                .await?
        } else {
            let path = if output_path.is_empty() {
                format!("./artifacts/copied_image_{}.png", Utc::now().timestamp_millis())
            } else {
                output_path
            };
            ctx.surface
                .screenshot(&ScreenshotRequest {
                    path,
                    selector,
                    clip,
                    full_page: false,
                    timeout_ms: ctx.step.timeout_ms,
                })
                .await?
        };

        ctx.runtime.set_var(CLIPBOARD_IMAGE_PATH, Value::String(capture.path.clone()));
        if let Some(url) = &capture.url {
            ctx.runtime.set_var(CLIPBOARD_IMAGE_URL, Value::String(url.clone()));
        }
        ctx.runtime.artifacts.record(&capture.path);
        Ok(ActionOutput::Capture {
            path: capture.path,
            url: capture.url,
            source: capture.source,
        })
    }
}

/// `copy_image_original` - always download the original resource behind an
/// element.
pub struct CopyImageOriginalAction;

#[async_trait]
impl ActionHandler for CopyImageOriginalAction {
    async fn run(&self, ctx: ActionContext<'_>) -> Result<ActionOutput, ExecError> {
        let selector = first_non_empty(&[&param_str(ctx.step, "selector"), &ctx.step.target]);
        if selector.is_empty() {
            return Err(ExecError::Validation(
                "copy_image_original requires selector in target or params.selector".to_string(),
            ));
        }
        let output_path = first_non_empty(&[&param_str(ctx.step, "path"), &ctx.step.value]);
        let attr = param_str(ctx.step, "attr");
        let attr = (!attr.is_empty()).then_some(attr.as_str());
        let capture = ctx
            .surface
            .download_original(&selector, &output_path, attr, ctx.step.timeout_ms)
            .await?;
        ctx.runtime.set_var(CLIPBOARD_IMAGE_PATH, Value::String(capture.path.clone()));
        if let Some(url) = &capture.url {
            ctx.runtime.set_var(CLIPBOARD_IMAGE_URL, Value::String(url.clone()));
        }
        ctx.runtime.artifacts.record(&capture.path);
        Ok(ActionOutput::Capture {
            path: capture.path,
            url: capture.url,
            source: capture.source,
        })
    }
}

/// `paste_image` - attach an image file (value, `params.from_var` or the
/// clipboard image) to the file input matching `target`.
pub struct PasteImageAction;

#[async_trait]
impl ActionHandler for PasteImageAction {
    async fn run(&self, ctx: ActionContext<'_>) -> Result<ActionOutput, ExecError> {
        let selector = first_non_empty(&[&ctx.step.target, &param_str(ctx.step, "selector")]);
        if selector.is_empty() {
            return Err(ExecError::Validation(
                "paste_image requires a file input selector".to_string(),
            ));
        }
        let image_path = text_from_step_or_var(ctx.step, ctx.runtime, CLIPBOARD_IMAGE_PATH);
        if image_path.is_empty() {
            return Err(ExecError::Validation("paste_image has no source path".to_string()));
        }
        let result = ctx
            .surface
            .set_input_files(&selector, &image_path, ctx.step.timeout_ms)
            .await?;
        Ok(ActionOutput::Value { value: result })
    }
}
