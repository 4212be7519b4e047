//! Canonical trajectory shapes and their normalization.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::normalize::{domain_from_site_or_url, normalize_text, tokenize};

/// Default per-step timeout applied when the author did not set one.
pub const DEFAULT_STEP_TIMEOUT_MS: u64 = 30_000;

/// Post-condition categories checked after a step executes.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardKind {
    UrlContains,
    UrlMatches,
    SnapshotContains,
    /// Anything this build does not understand. Never passes.
    #[serde(other)]
    Unknown,
}

impl GuardKind {
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "url_contains" => GuardKind::UrlContains,
            "url_matches" => GuardKind::UrlMatches,
            "snapshot_contains" => GuardKind::SnapshotContains,
            _ => GuardKind::Unknown,
        }
    }
}

/// A post-condition checked after a step executes. An empty guard list on a
/// step always passes.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Guard {
    pub kind: GuardKind,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub negate: bool,
}

impl Guard {
    /// Coerce a loosely-typed JSON object into a canonical guard.
    pub fn from_value(raw: &Value) -> Self {
        Guard {
            kind: GuardKind::parse(&coerce_string(raw.get("kind"))),
            value: coerce_string(raw.get("value")).trim().to_string(),
            negate: coerce_bool(raw.get("negate")),
        }
    }
}

/// One atomic automation instruction plus guards and metadata.
///
/// Immutable once normalized; the executor renders a per-invocation clone
/// just before dispatch and never mutates the stored form.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Step {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub target: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub params: Map<String, Value>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub guards: Vec<Guard>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub save_as: String,
    #[serde(default)]
    pub notes: String,
}

fn default_timeout_ms() -> u64 {
    DEFAULT_STEP_TIMEOUT_MS
}

impl Default for Step {
    fn default() -> Self {
        Step {
            id: String::new(),
            action: String::new(),
            target: String::new(),
            value: String::new(),
            params: Map::new(),
            timeout_ms: DEFAULT_STEP_TIMEOUT_MS,
            optional: false,
            guards: Vec::new(),
            save_as: String::new(),
            notes: String::new(),
        }
    }
}

impl Step {
    /// Coerce a loosely-typed JSON object into a canonical step. `index` is
    /// the zero-based position used for the fallback id.
    pub fn from_value(raw: &Value, index: usize) -> Self {
        let params = match raw.get("params") {
            Some(Value::Object(map)) => map.clone(),
            _ => Map::new(),
        };
        let guards = match raw.get("guards") {
            Some(Value::Array(items)) => items.iter().map(Guard::from_value).collect(),
            _ => Vec::new(),
        };
        Step {
            id: coerce_string(raw.get("id")),
            action: coerce_string(raw.get("action")).trim().to_string(),
            target: coerce_string(raw.get("target")),
            value: coerce_string(raw.get("value")),
            params,
            timeout_ms: coerce_u64(raw.get("timeout_ms"), DEFAULT_STEP_TIMEOUT_MS),
            optional: coerce_bool(raw.get("optional")),
            guards,
            save_as: coerce_string(raw.get("save_as")).trim().to_string(),
            notes: coerce_string(raw.get("notes")),
        }
        .normalized(index)
    }

    /// Apply the canonical defaults. Idempotent: normalizing a normalized
    /// step returns an identical step.
    pub fn normalized(mut self, index: usize) -> Self {
        if self.id.trim().is_empty() {
            self.id = format!("step_{}", index + 1);
        }
        self.action = self.action.trim().to_string();
        self.save_as = self.save_as.trim().to_string();
        for guard in &mut self.guards {
            guard.value = guard.value.trim().to_string();
        }
        self
    }

    /// The `save_as` convention: the dedicated field wins, `params.save_as`
    /// is the authoring-compatible fallback.
    pub fn save_as_path(&self) -> Option<&str> {
        if !self.save_as.is_empty() {
            return Some(self.save_as.as_str());
        }
        match self.params.get("save_as") {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim()),
            _ => None,
        }
    }
}

/// A named, versioned sequence of steps solving a (site, task_type, intent)
/// request. Created by recording a successful run or explicit authoring;
/// never deleted by the core.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    pub trajectory_id: String,
    pub site: String,
    pub task_type: String,
    pub intent: String,
    pub intent_signature: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub steps: Vec<Step>,
}

fn default_version() -> u32 {
    1
}

/// Inputs for building a normalized trajectory.
#[derive(Clone, Debug, Default)]
pub struct TrajectoryDraft {
    pub trajectory_id: String,
    pub site: String,
    pub task_type: String,
    pub intent: String,
    pub steps: Vec<Step>,
    pub keywords: Vec<String>,
    pub version: u32,
    pub metadata: Map<String, Value>,
}

impl TrajectoryDraft {
    pub fn new(trajectory_id: &str, site: &str, task_type: &str, intent: &str) -> Self {
        TrajectoryDraft {
            trajectory_id: trajectory_id.to_string(),
            site: site.to_string(),
            task_type: task_type.to_string(),
            intent: intent.to_string(),
            version: 1,
            ..TrajectoryDraft::default()
        }
    }

    pub fn with_steps(mut self, steps: Vec<Step>) -> Self {
        self.steps = steps;
        self
    }

    pub fn with_keywords(mut self, keywords: Vec<String>) -> Self {
        self.keywords = keywords;
        self
    }

    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Build the canonical trajectory: bare-domain site, deterministic
    /// intent signature, deduplicated normalized keyword union, normalized
    /// steps, fresh timestamps.
    pub fn build(self) -> Trajectory {
        let site = domain_from_site_or_url(&self.site);
        let intent_tokens = tokenize(&self.intent);
        let intent_signature = intent_tokens.join(" ");

        let mut keywords: Vec<String> = Vec::new();
        let candidates = self
            .keywords
            .iter()
            .cloned()
            .chain(intent_tokens)
            .chain([site.clone(), self.task_type.clone()]);
        for candidate in candidates {
            let normalized = normalize_text(&candidate);
            if !normalized.is_empty() && !keywords.contains(&normalized) {
                keywords.push(normalized);
            }
        }

        let now = Utc::now();
        Trajectory {
            trajectory_id: self.trajectory_id,
            site,
            task_type: self.task_type,
            intent: self.intent,
            intent_signature,
            keywords,
            version: self.version.max(1),
            metadata: self.metadata,
            created_at: now,
            updated_at: now,
            steps: self
                .steps
                .into_iter()
                .enumerate()
                .map(|(i, s)| s.normalized(i))
                .collect(),
        }
    }
}

/// Aggregated outcome statistics for one trajectory.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageStats {
    pub usage_count: u64,
    pub success_rate: f64,
    pub avg_latency_ms: f64,
}

fn coerce_string(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

fn coerce_bool(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => {
            matches!(s.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on")
        }
        Some(Value::Number(n)) => n.as_f64().map(|v| v != 0.0).unwrap_or(false),
        _ => false,
    }
}

fn coerce_u64(value: Option<&Value>, default: u64) -> u64 {
    match value {
        Some(Value::Number(n)) => n.as_u64().or_else(|| n.as_f64().map(|v| v.max(0.0) as u64)).unwrap_or(default),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(default),
        _ => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn step_from_value_applies_defaults() {
        let step = Step::from_value(&json!({ "action": " open ", "target": "https://a.io" }), 0);
        assert_eq!(step.id, "step_1");
        assert_eq!(step.action, "open");
        assert_eq!(step.timeout_ms, DEFAULT_STEP_TIMEOUT_MS);
        assert!(!step.optional);
        assert!(step.guards.is_empty());
        assert!(step.params.is_empty());
    }

    #[test]
    fn step_from_value_coerces_loose_types() {
        let step = Step::from_value(
            &json!({
                "id": 7,
                "action": "wait",
                "value": 1500,
                "timeout_ms": "5000",
                "optional": "yes",
                "guards": [{ "kind": "url_contains", "value": " results " }]
            }),
            3,
        );
        assert_eq!(step.id, "7");
        assert_eq!(step.value, "1500");
        assert_eq!(step.timeout_ms, 5000);
        assert!(step.optional);
        assert_eq!(step.guards[0].kind, GuardKind::UrlContains);
        assert_eq!(step.guards[0].value, "results");
        assert!(!step.guards[0].negate);
    }

    #[test]
    fn normalization_is_idempotent() {
        let step = Step::from_value(
            &json!({ "action": "click", "guards": [{ "kind": "url_matches", "value": "x" }] }),
            4,
        );
        let again = step.clone().normalized(4);
        assert_eq!(step, again);
    }

    #[test]
    fn unknown_guard_kind_maps_to_unknown() {
        let guard = Guard::from_value(&json!({ "kind": "dom_stable", "value": "x" }));
        assert_eq!(guard.kind, GuardKind::Unknown);
    }

    #[test]
    fn draft_builds_signature_and_keywords() {
        let traj = TrajectoryDraft::new("t1", "https://Example.com/search", "search", "Find a Widget")
            .with_keywords(vec!["Widget ".to_string()])
            .build();
        assert_eq!(traj.site, "example.com");
        assert_eq!(traj.intent_signature, "find a widget");
        assert_eq!(traj.keywords, vec!["widget", "find", "a", "example.com", "search"]);
        assert_eq!(traj.version, 1);
    }

    #[test]
    fn keyword_derivation_is_deterministic() {
        let a = TrajectoryDraft::new("t1", "x.io", "search", "find widget").build();
        let b = TrajectoryDraft::new("t2", "x.io", "search", "find widget").build();
        assert_eq!(a.intent_signature, b.intent_signature);
        assert_eq!(a.keywords, b.keywords);
    }

    #[test]
    fn save_as_field_wins_over_params() {
        let mut step = Step {
            save_as: "answer".to_string(),
            ..Step::default()
        };
        step.params.insert("save_as".to_string(), json!("other"));
        assert_eq!(step.save_as_path(), Some("answer"));
        step.save_as.clear();
        assert_eq!(step.save_as_path(), Some("other"));
        step.params.remove("save_as");
        assert_eq!(step.save_as_path(), None);
    }

    #[test]
    fn trajectory_round_trips_through_json() {
        let traj = TrajectoryDraft::new("t1", "x.io", "search", "find widget")
            .with_steps(vec![Step::from_value(&json!({ "action": "open", "target": "https://x.io" }), 0)])
            .build();
        let text = serde_json::to_string(&traj).unwrap();
        let back: Trajectory = serde_json::from_str(&text).unwrap();
        assert_eq!(traj, back);
    }
}
