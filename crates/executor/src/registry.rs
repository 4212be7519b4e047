//! Action registry: string tag to typed handler dispatch.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use amw_automation::AutomationSurface;
use amw_trajectory::Step;

use crate::actions;
use crate::errors::ExecError;
use crate::output::ActionOutput;
use crate::runtime::RuntimeState;

/// Everything a handler may touch: the surface, the mutable runtime state,
/// and the rendered step it is executing.
pub struct ActionContext<'a> {
    pub surface: &'a dyn AutomationSurface,
    pub runtime: &'a mut RuntimeState,
    pub step: &'a Step,
}

/// One registered action. Handlers validate required fields and fail fast
/// with a descriptive error, record produced artifacts into
/// `runtime.artifacts`, and return a family-tagged output.
#[async_trait]
pub trait ActionHandler: Send + Sync {
    async fn run(&self, ctx: ActionContext<'_>) -> Result<ActionOutput, ExecError>;
}

/// Name -> handler table. Unknown names are a checked
/// `ExecError::UnsupportedAction`, never a crash.
#[derive(Clone, Default)]
pub struct ActionRegistry {
    handlers: HashMap<String, Arc<dyn ActionHandler>>,
}

impl ActionRegistry {
    /// An empty registry; callers register everything themselves.
    pub fn new() -> Self {
        ActionRegistry::default()
    }

    /// The built-in action set.
    pub fn with_defaults() -> Self {
        let mut registry = ActionRegistry::new();
        actions::register_defaults(&mut registry);
        registry
    }

    pub fn register(&mut self, name: &str, handler: Arc<dyn ActionHandler>) {
        self.handlers.insert(name.to_string(), handler);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ActionHandler>> {
        self.handlers.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_covers_required_actions() {
        let registry = ActionRegistry::with_defaults();
        for name in [
            "open",
            "click",
            "click_text",
            "fill",
            "type",
            "press",
            "wait",
            "snapshot",
            "screenshot",
            "get_url",
            "eval_js",
            "copy_text",
            "paste_text",
            "copy_image",
            "copy_image_original",
            "paste_image",
            "write_markdown",
            "append_markdown_section",
            "assert_file",
            "assert_markdown",
        ] {
            assert!(registry.contains(name), "missing builtin action {name}");
        }
        assert!(!registry.contains("teleport"));
    }
}
