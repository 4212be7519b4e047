//! `{{token}}` template rendering against runtime state.
//!
//! The grammar is token lookup only: a `vars.` / `context.` / `env.` prefix
//! picks the tree, a bare token reads `vars`. An unresolved token is a hard
//! error; there is no silent empty-string fallback.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;
use thiserror::Error;

use amw_trajectory::Step;

use crate::runtime::RuntimeState;

/// A `{{token}}` failed to resolve to a defined value.
#[derive(Clone, Debug, Error, PartialEq)]
#[error("template variable not found: {token}")]
pub struct TemplateError {
    pub token: String,
}

fn token_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\{\{\s*([^{}]+?)\s*\}\}").expect("static pattern"))
}

fn resolve_token(token: &str, runtime: &RuntimeState) -> Option<Value> {
    if let Some(path) = token.strip_prefix("vars.") {
        return runtime.get_var(path).cloned();
    }
    if let Some(path) = token.strip_prefix("context.") {
        return runtime.get_context(path).cloned();
    }
    if let Some(key) = token.strip_prefix("env.") {
        return runtime.get_env(key);
    }
    runtime.get_var(token).cloned()
}

fn stringify(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        other => serde_json::to_string(other).ok(),
    }
}

/// Replace every `{{token}}` in `input`.
pub fn render_string(input: &str, runtime: &RuntimeState) -> Result<String, TemplateError> {
    let pattern = token_pattern();
    let mut output = String::with_capacity(input.len());
    let mut cursor = 0;
    for captures in pattern.captures_iter(input) {
        let whole = captures.get(0).expect("match group 0");
        let token = captures.get(1).expect("match group 1").as_str();
        output.push_str(&input[cursor..whole.start()]);
        let resolved = resolve_token(token, runtime)
            .as_ref()
            .and_then(stringify)
            .ok_or_else(|| TemplateError {
                token: token.to_string(),
            })?;
        output.push_str(&resolved);
        cursor = whole.end();
    }
    output.push_str(&input[cursor..]);
    Ok(output)
}

/// Recursively render every string inside a JSON value.
pub fn render_value(value: &Value, runtime: &RuntimeState) -> Result<Value, TemplateError> {
    match value {
        Value::String(s) => Ok(Value::String(render_string(s, runtime)?)),
        Value::Array(items) => items
            .iter()
            .map(|item| render_value(item, runtime))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Value::Object(map) => {
            let mut rendered = serde_json::Map::with_capacity(map.len());
            for (key, item) in map {
                rendered.insert(key.clone(), render_value(item, runtime)?);
            }
            Ok(Value::Object(rendered))
        }
        other => Ok(other.clone()),
    }
}

/// Render a per-invocation clone of a step: every string field, the params
/// tree, and guard values. The stored step is never mutated.
pub fn render_step(step: &Step, runtime: &RuntimeState) -> Result<Step, TemplateError> {
    let mut rendered = step.clone();
    rendered.id = render_string(&step.id, runtime)?;
    rendered.action = render_string(&step.action, runtime)?;
    rendered.target = render_string(&step.target, runtime)?;
    rendered.value = render_string(&step.value, runtime)?;
    rendered.save_as = render_string(&step.save_as, runtime)?;
    rendered.notes = render_string(&step.notes, runtime)?;
    let params = render_value(&Value::Object(step.params.clone()), runtime)?;
    rendered.params = match params {
        Value::Object(map) => map,
        _ => serde_json::Map::new(),
    };
    for guard in &mut rendered.guards {
        guard.value = render_string(&guard.value, runtime)?;
    }
    Ok(rendered)
}
