//! Validation of authored steps files before they touch a browser.
//!
//! A steps payload is either a bare JSON array of steps or an object with a
//! `steps` array plus optional authoring extras: a one-line `amw_match_line`
//! carrying the fixed `amw` anchor token, and a `branches` map capped at two
//! entries.

use serde_json::Value;

use crate::model::Step;

/// Fixed anchor token expected inside `amw_match_line`.
pub const MATCH_LINE_ANCHOR: &str = "amw";

/// Maximum number of entries allowed in a `branches` map.
pub const MAX_BRANCHES: usize = 2;

#[derive(Clone, Debug, Default, serde::Serialize)]
pub struct ValidationReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub step_count: usize,
}

impl ValidationReport {
    pub fn ok(&self) -> bool {
        self.errors.is_empty()
    }
}

fn step_list(payload: &Value) -> Option<&Vec<Value>> {
    match payload {
        Value::Array(items) => Some(items),
        Value::Object(map) => match map.get("steps") {
            Some(Value::Array(items)) => Some(items),
            _ => None,
        },
        _ => None,
    }
}

/// Extract and normalize the steps from a payload. Returns `None` when the
/// payload has no steps array at all.
pub fn parse_steps(payload: &Value) -> Option<Vec<Step>> {
    step_list(payload).map(|items| {
        items
            .iter()
            .enumerate()
            .map(|(i, raw)| Step::from_value(raw, i))
            .collect()
    })
}

/// Structural checks for an authored steps payload. Errors block execution,
/// warnings are advisory.
pub fn validate_steps_payload(payload: &Value) -> ValidationReport {
    let mut report = ValidationReport::default();

    let Some(steps) = step_list(payload) else {
        report
            .errors
            .push("steps file must be a JSON array or object with 'steps'".to_string());
        return report;
    };
    report.step_count = steps.len();

    if let Value::Object(map) = payload {
        match map.get("amw_match_line") {
            None => report
                .warnings
                .push("missing amw_match_line (recommended for grep-first retrieval)".to_string()),
            Some(raw) => {
                let line = raw.as_str().map(str::to_string).unwrap_or_else(|| raw.to_string());
                if line.contains('\n') || line.contains('\r') {
                    report
                        .errors
                        .push("amw_match_line must be one physical line".to_string());
                }
                if !line.contains(MATCH_LINE_ANCHOR) {
                    report.warnings.push(format!(
                        "amw_match_line should include anchor token '{MATCH_LINE_ANCHOR}'"
                    ));
                }
            }
        }
        if let Some(Value::Object(branches)) = map.get("branches") {
            if branches.len() > MAX_BRANCHES {
                report.errors.push(format!(
                    "branch count {} exceeds max-{} policy",
                    branches.len(),
                    MAX_BRANCHES
                ));
            }
        }
    }

    for (i, raw) in steps.iter().enumerate() {
        let at = format!("step[{i}]");
        let Value::Object(step) = raw else {
            report.errors.push(format!("{at} must be an object"));
            continue;
        };

        let action = step
            .get("action")
            .and_then(Value::as_str)
            .unwrap_or("")
            .trim()
            .to_string();
        if action.is_empty() {
            report.errors.push(format!("{at} missing action"));
        }

        let field = |key: &str| -> String {
            step.get(key)
                .and_then(Value::as_str)
                .unwrap_or("")
                .trim()
                .to_string()
        };
        let param = |key: &str| -> String {
            step.get("params")
                .and_then(|p| p.get(key))
                .and_then(Value::as_str)
                .unwrap_or("")
                .trim()
                .to_string()
        };

        match action.as_str() {
            "eval_js" => {
                if field("value").is_empty() && param("script").is_empty() {
                    report
                        .errors
                        .push(format!("{at} eval_js requires step.value or params.script"));
                }
            }
            "copy_image_original" => {
                if field("target").is_empty() && param("selector").is_empty() {
                    report.errors.push(format!(
                        "{at} copy_image_original requires selector (target or params.selector)"
                    ));
                }
            }
            "assert_file" => {
                if field("target").is_empty() && field("value").is_empty() && param("path").is_empty() {
                    report
                        .errors
                        .push(format!("{at} assert_file requires path in target/value/params.path"));
                }
            }
            _ => {}
        }

        if let Some(timeout) = step.get("timeout_ms") {
            let valid = timeout.as_f64().map(|v| v.is_finite() && v >= 0.0).unwrap_or(false);
            if !valid {
                report
                    .warnings
                    .push(format!("{at} timeout_ms should be a non-negative number"));
            }
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bare_array_is_valid() {
        let report = validate_steps_payload(&json!([{ "action": "open", "target": "https://x.io" }]));
        assert!(report.ok());
        assert_eq!(report.step_count, 1);
        // Bare arrays cannot carry a match line, so no warning either.
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn missing_steps_is_an_error() {
        let report = validate_steps_payload(&json!({ "foo": 1 }));
        assert!(!report.ok());
    }

    #[test]
    fn match_line_must_be_single_line_with_anchor() {
        let report = validate_steps_payload(&json!({
            "steps": [{ "action": "open" }],
            "amw_match_line": "two\nlines"
        }));
        assert!(!report.ok());

        let report = validate_steps_payload(&json!({
            "steps": [{ "action": "open" }],
            "amw_match_line": "checkout flow, no anchor"
        }));
        assert!(report.ok());
        assert!(report.warnings.iter().any(|w| w.contains("anchor token")));

        let report = validate_steps_payload(&json!({
            "steps": [{ "action": "open" }],
            "amw_match_line": "amw: checkout flow on example.com"
        }));
        assert!(report.ok());
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn branches_capped_at_two() {
        let report = validate_steps_payload(&json!({
            "steps": [{ "action": "open" }],
            "amw_match_line": "amw ok",
            "branches": { "a": [], "b": [], "c": [] }
        }));
        assert!(report.errors.iter().any(|e| e.contains("max-2")));
    }

    #[test]
    fn per_action_requirements() {
        let report = validate_steps_payload(&json!([
            { "action": "eval_js" },
            { "action": "copy_image_original" },
            { "action": "assert_file" },
            { "action": "" }
        ]));
        assert_eq!(report.errors.len(), 4);
    }

    #[test]
    fn parse_steps_handles_both_shapes() {
        let from_array = parse_steps(&json!([{ "action": "open" }])).unwrap();
        let from_doc = parse_steps(&json!({ "steps": [{ "action": "open" }] })).unwrap();
        assert_eq!(from_array, from_doc);
        assert!(parse_steps(&json!({ "nope": true })).is_none());
    }
}
