//! Per-execution runtime state.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::{Map, Value};

/// Files produced during a run. Append-only.
#[derive(Clone, Debug, Default, Serialize)]
pub struct Artifacts {
    pub generated_files: Vec<String>,
}

impl Artifacts {
    /// Record a generated file path once.
    pub fn record(&mut self, path: &str) {
        if !self.generated_files.iter().any(|p| p == path) {
            self.generated_files.push(path.to_string());
        }
    }
}

/// Mutable state threaded through one replay and discarded at its end.
///
/// `vars` is the only subtree handlers may write; `context` and `env` are
/// read-only. No ambient globals: everything a handler can see arrives
/// through a reference to this struct.
pub struct RuntimeState {
    vars: Value,
    context: Value,
    env: HashMap<String, String>,
    pub last_result: Option<Value>,
    pub artifacts: Artifacts,
}

impl RuntimeState {
    /// Fresh state with the process environment captured once.
    pub fn new(initial_vars: Map<String, Value>, context: Map<String, Value>) -> Self {
        Self::with_env(initial_vars, context, std::env::vars().collect())
    }

    /// Fresh state with an explicit environment (tests, sandboxed runs).
    pub fn with_env(
        initial_vars: Map<String, Value>,
        context: Map<String, Value>,
        env: HashMap<String, String>,
    ) -> Self {
        RuntimeState {
            vars: Value::Object(initial_vars),
            context: Value::Object(context),
            env,
            last_result: None,
            artifacts: Artifacts::default(),
        }
    }

    pub fn vars(&self) -> &Value {
        &self.vars
    }

    pub fn context(&self) -> &Value {
        &self.context
    }

    /// Dot-path lookup in `vars`.
    pub fn get_var(&self, path: &str) -> Option<&Value> {
        value_at_path(&self.vars, path)
    }

    /// Dot-path lookup in `context`.
    pub fn get_context(&self, path: &str) -> Option<&Value> {
        value_at_path(&self.context, path)
    }

    /// Environment lookup. Environment keys are flat; dotted paths never
    /// match.
    pub fn get_env(&self, key: &str) -> Option<Value> {
        if key.contains('.') {
            return None;
        }
        self.env.get(key).map(|v| Value::String(v.clone()))
    }

    /// Dot-path write into `vars`, creating intermediate objects. A non-
    /// object intermediate value is replaced, as the path asserts structure.
    pub fn set_var(&mut self, path: &str, value: Value) {
        if path.is_empty() {
            return;
        }
        let mut cursor = &mut self.vars;
        let parts: Vec<&str> = path.split('.').collect();
        for part in &parts[..parts.len() - 1] {
            let map = match cursor {
                Value::Object(map) => map,
                _ => return,
            };
            let entry = map
                .entry(part.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !entry.is_object() {
                *entry = Value::Object(Map::new());
            }
            cursor = entry;
        }
        if let Value::Object(map) = cursor {
            map.insert(parts[parts.len() - 1].to_string(), value);
        }
    }
}

/// Walk a dotted path through nested JSON objects.
pub(crate) fn value_at_path<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return None;
    }
    let mut cursor = root;
    for part in path.split('.') {
        cursor = cursor.get(part)?;
    }
    Some(cursor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn empty_state() -> RuntimeState {
        RuntimeState::with_env(Map::new(), Map::new(), HashMap::new())
    }

    #[test]
    fn set_var_creates_intermediate_objects() {
        let mut state = empty_state();
        state.set_var("a.b.c", json!(1));
        assert_eq!(state.get_var("a.b.c"), Some(&json!(1)));
        state.set_var("a.b.d", json!("x"));
        assert_eq!(state.get_var("a.b.c"), Some(&json!(1)));
        assert_eq!(state.get_var("a.b.d"), Some(&json!("x")));
    }

    #[test]
    fn set_var_replaces_non_object_intermediates() {
        let mut state = empty_state();
        state.set_var("a", json!("scalar"));
        state.set_var("a.b", json!(2));
        assert_eq!(state.get_var("a.b"), Some(&json!(2)));
    }

    #[test]
    fn env_lookup_is_flat() {
        let mut env = HashMap::new();
        env.insert("HOME_DIR".to_string(), "/home/x".to_string());
        let state = RuntimeState::with_env(Map::new(), Map::new(), env);
        assert_eq!(state.get_env("HOME_DIR"), Some(json!("/home/x")));
        assert_eq!(state.get_env("HOME_DIR.len"), None);
        assert_eq!(state.get_env("MISSING"), None);
    }

    #[test]
    fn artifacts_deduplicate() {
        let mut artifacts = Artifacts::default();
        artifacts.record("/tmp/a.png");
        artifacts.record("/tmp/a.png");
        artifacts.record("/tmp/b.png");
        assert_eq!(artifacts.generated_files.len(), 2);
    }
}
