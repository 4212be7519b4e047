//! Discriminated results produced by action handlers.

use serde::Serialize;
use serde_json::Value;

/// What an action produced, tagged by family. Common optional fields
/// (`path`, `url`) get uniform accessors so `save_as` and logging never
/// inspect variants.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionOutput {
    /// Navigation-family result.
    Navigation { url: String },
    /// Plain interaction with no produced value (click, fill, press...).
    Interaction { action: String },
    /// Wait-family result.
    Wait {
        #[serde(skip_serializing_if = "Option::is_none")]
        waited_ms: Option<u64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        state: Option<String>,
    },
    /// Page-structure capture.
    Snapshot { tree: String, ref_count: usize },
    /// Artifact-producing capture (screenshot, original download).
    Capture {
        path: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        url: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        source: Option<String>,
    },
    /// Text-family result (copy/paste text, extraction).
    Text { text: String, chars: usize },
    /// Current page URL.
    CurrentUrl { url: String },
    /// Markdown report writers.
    Report {
        path: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        items: Option<usize>,
        appended: bool,
    },
    /// Assertion-family result.
    Assertion {
        path: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        size: Option<u64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        link_count: Option<usize>,
    },
    /// Raw script value from evaluate-class actions.
    Value { value: Value },
}

impl ActionOutput {
    pub fn text(text: String) -> Self {
        let chars = text.chars().count();
        ActionOutput::Text { text, chars }
    }

    /// Filesystem artifact this output points at, if any.
    pub fn artifact_path(&self) -> Option<&str> {
        match self {
            ActionOutput::Capture { path, .. }
            | ActionOutput::Report { path, .. }
            | ActionOutput::Assertion { path, .. } => Some(path),
            _ => None,
        }
    }

    /// URL associated with this output, if any.
    pub fn url(&self) -> Option<&str> {
        match self {
            ActionOutput::Navigation { url }
            | ActionOutput::CurrentUrl { url }
            | ActionOutput::Capture { url: Some(url), .. } => Some(url),
            _ => None,
        }
    }

    /// Full serialized form, used for `last_result` and the event log.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// The canonical value `save_as` stores: text for text outputs, the
    /// artifact path for captures, the raw value for script results, and
    /// the serialized object for everything else.
    pub fn to_var_value(&self) -> Value {
        match self {
            ActionOutput::Text { text, .. } => Value::String(text.clone()),
            ActionOutput::Capture { path, .. } => Value::String(path.clone()),
            ActionOutput::Value { value } => value.clone(),
            other => other.to_value(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tagged_serialization() {
        let output = ActionOutput::Navigation {
            url: "https://x.io".to_string(),
        };
        assert_eq!(output.to_value(), json!({ "kind": "navigation", "url": "https://x.io" }));
    }

    #[test]
    fn save_as_values_per_family() {
        assert_eq!(ActionOutput::text("done".to_string()).to_var_value(), json!("done"));
        let capture = ActionOutput::Capture {
            path: "/tmp/shot.png".to_string(),
            url: None,
            source: None,
        };
        assert_eq!(capture.to_var_value(), json!("/tmp/shot.png"));
        let value = ActionOutput::Value { value: json!([1, 2]) };
        assert_eq!(value.to_var_value(), json!([1, 2]));
        let nav = ActionOutput::Navigation { url: "u".to_string() };
        assert_eq!(nav.to_var_value(), json!({ "kind": "navigation", "url": "u" }));
    }

    #[test]
    fn common_accessors() {
        let capture = ActionOutput::Capture {
            path: "/tmp/a.png".to_string(),
            url: Some("https://img".to_string()),
            source: None,
        };
        assert_eq!(capture.artifact_path(), Some("/tmp/a.png"));
        assert_eq!(capture.url(), Some("https://img"));
        assert_eq!(ActionOutput::Interaction { action: "click".to_string() }.artifact_path(), None);
    }
}
