//! Built-in actions, grouped by family.

mod capture;
mod clipboard;
mod input;
mod nav;
mod report;

use std::path::PathBuf;
use std::sync::Arc;

use serde_json::Value;

use amw_automation::Clip;
use amw_trajectory::Step;

use crate::errors::ExecError;
use crate::registry::ActionRegistry;
use crate::runtime::RuntimeState;

pub use capture::{EvalJsAction, ScreenshotAction, SnapshotAction};
pub use clipboard::{
    CopyImageAction, CopyImageOriginalAction, CopyTextAction, PasteImageAction, PasteTextAction,
};
pub use input::{ClickAction, ClickTextAction, FillAction, PressAction, TypeAction};
pub use nav::{GetUrlAction, OpenAction, WaitAction};
pub use report::{
    AppendMarkdownSectionAction, AssertFileAction, AssertMarkdownAction, WriteMarkdownAction,
};

/// Wire the complete built-in set into a registry.
pub fn register_defaults(registry: &mut ActionRegistry) {
    registry.register("open", Arc::new(OpenAction));
    registry.register("get_url", Arc::new(GetUrlAction));
    registry.register("wait", Arc::new(WaitAction));
    registry.register("click", Arc::new(ClickAction));
    registry.register("click_text", Arc::new(ClickTextAction));
    registry.register("fill", Arc::new(FillAction));
    registry.register("type", Arc::new(TypeAction));
    registry.register("press", Arc::new(PressAction));
    registry.register("snapshot", Arc::new(SnapshotAction));
    registry.register("screenshot", Arc::new(ScreenshotAction));
    registry.register("eval_js", Arc::new(EvalJsAction));
    registry.register("copy_text", Arc::new(CopyTextAction));
    registry.register("paste_text", Arc::new(PasteTextAction));
    registry.register("copy_image", Arc::new(CopyImageAction));
    registry.register("copy_image_original", Arc::new(CopyImageOriginalAction));
    registry.register("paste_image", Arc::new(PasteImageAction));
    registry.register("write_markdown", Arc::new(WriteMarkdownAction));
    registry.register("append_markdown_section", Arc::new(AppendMarkdownSectionAction));
    registry.register("assert_file", Arc::new(AssertFileAction));
    registry.register("assert_markdown", Arc::new(AssertMarkdownAction));
}

/// String value of a param, trimmed; empty when absent or not a string.
pub(crate) fn param_str(step: &Step, key: &str) -> String {
    match step.params.get(key) {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

pub(crate) fn param_bool(step: &Step, key: &str) -> bool {
    match step.params.get(key) {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => {
            matches!(s.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on")
        }
        _ => false,
    }
}

/// First non-empty candidate, trimmed.
pub(crate) fn first_non_empty(candidates: &[&str]) -> String {
    candidates
        .iter()
        .map(|c| c.trim())
        .find(|c| !c.is_empty())
        .unwrap_or("")
        .to_string()
}

/// A clip rectangle from `params.clip` or flat `x`/`y`/`width`/`height`.
pub(crate) fn resolve_clip(step: &Step) -> Option<Clip> {
    let number = |value: Option<&Value>| value.and_then(Value::as_f64).filter(|v| v.is_finite());
    if let Some(Value::Object(raw)) = step.params.get("clip") {
        if let (Some(x), Some(y), Some(width), Some(height)) = (
            number(raw.get("x")),
            number(raw.get("y")),
            number(raw.get("width")),
            number(raw.get("height")),
        ) {
            return Some(Clip { x, y, width, height });
        }
    }
    if let (Some(x), Some(y), Some(width), Some(height)) = (
        number(step.params.get("x")),
        number(step.params.get("y")),
        number(step.params.get("width")),
        number(step.params.get("height")),
    ) {
        return Some(Clip { x, y, width, height });
    }
    None
}

/// Plain-string form of a runtime value for text actions: strings verbatim,
/// scalars via display, missing values empty.
pub(crate) fn value_to_plain_string(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(other) => serde_json::to_string(other).unwrap_or_default(),
    }
}

/// Text for paste/copy fallbacks: explicit value, then `params.from_var`,
/// then the supplied default lookup.
pub(crate) fn text_from_step_or_var(
    step: &Step,
    runtime: &RuntimeState,
    fallback_var: &str,
) -> String {
    if !step.value.is_empty() {
        return step.value.clone();
    }
    let from_var = param_str(step, "from_var");
    if !from_var.is_empty() {
        return value_to_plain_string(runtime.get_var(&from_var));
    }
    value_to_plain_string(runtime.get_var(fallback_var))
}

/// Absolute form of a user-supplied path, without touching the filesystem.
pub(crate) fn absolutize(path: &str) -> Result<PathBuf, ExecError> {
    let trimmed = path.trim();
    let candidate = PathBuf::from(trimmed);
    if candidate.is_absolute() {
        Ok(candidate)
    } else {
        Ok(std::env::current_dir()?.join(candidate))
    }
}
