//! The replay state machine.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Map, Value};
use tracing::debug;

use amw_automation::AutomationSurface;
use amw_run_log::{EventType, RunLogger};
use amw_trajectory::{GuardKind, Step, Trajectory};

use crate::errors::ExecError;
use crate::output::ActionOutput;
use crate::page_memory::TaskMemory;
use crate::registry::{ActionContext, ActionRegistry};
use crate::runtime::RuntimeState;
use crate::template::render_step;

/// Reserved action name the executor intercepts before registry dispatch.
pub const HUMAN_HANDOFF_ACTION: &str = "human_handoff";

const DEFAULT_HANDOFF_MESSAGE: &str =
    "Human handoff required. Complete action and press Enter.";

/// Actions whose completion implies the page under the current URL was
/// touched.
const VISIT_IMPLYING_ACTIONS: [&str; 5] = ["click", "fill", "type", "press", "wait"];

/// Blocks the run until a human confirms they completed a manual step.
#[async_trait]
pub trait HumanHandoff: Send + Sync {
    async fn acknowledge(&self, message: &str) -> Result<(), ExecError>;
}

/// Prompt on stdout, resume on the next stdin line.
pub struct StdinHandoff;

#[async_trait]
impl HumanHandoff for StdinHandoff {
    async fn acknowledge(&self, message: &str) -> Result<(), ExecError> {
        use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
        let mut stdout = tokio::io::stdout();
        stdout
            .write_all(format!("{message}\nPress Enter to continue...").as_bytes())
            .await?;
        stdout.flush().await?;
        let mut line = String::new();
        BufReader::new(tokio::io::stdin()).read_line(&mut line).await?;
        Ok(())
    }
}

/// Outcome of one replay attempt. Never an `Err`: failures are data.
#[derive(Clone, Debug, serde::Serialize)]
pub struct ReplayReport {
    pub success: bool,
    pub reason: String,
    pub executed_steps: u32,
    pub latency_ms: u64,
    pub failed_step_id: String,
}

impl ReplayReport {
    fn ok(executed_steps: u32, started: Instant) -> Self {
        ReplayReport {
            success: true,
            reason: "ok".to_string(),
            executed_steps,
            latency_ms: started.elapsed().as_millis() as u64,
            failed_step_id: String::new(),
        }
    }

    fn failed(reason: String, executed_steps: u32, started: Instant, step_id: &str) -> Self {
        ReplayReport {
            success: false,
            reason,
            executed_steps,
            latency_ms: started.elapsed().as_millis() as u64,
            failed_step_id: step_id.to_string(),
        }
    }
}

/// Sequential step interpreter over one trajectory.
///
/// One trajectory at a time per instance; `vars`, page memory and artifacts
/// accumulate across steps and are discarded with the executor. Step order
/// is the stored order, always.
pub struct TrajectoryExecutor {
    surface: Arc<dyn AutomationSurface>,
    logger: Arc<RunLogger>,
    registry: ActionRegistry,
    handoff: Arc<dyn HumanHandoff>,
    pub task_memory: TaskMemory,
    pub runtime: RuntimeState,
}

impl TrajectoryExecutor {
    pub fn new(surface: Arc<dyn AutomationSurface>, logger: Arc<RunLogger>) -> Self {
        TrajectoryExecutor {
            surface,
            logger,
            registry: ActionRegistry::with_defaults(),
            handoff: Arc::new(StdinHandoff),
            task_memory: TaskMemory::new(),
            runtime: RuntimeState::new(Map::new(), Map::new()),
        }
    }

    pub fn with_registry(mut self, registry: ActionRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_handoff(mut self, handoff: Arc<dyn HumanHandoff>) -> Self {
        self.handoff = handoff;
        self
    }

    pub fn with_vars(mut self, vars: Map<String, Value>) -> Self {
        let context = match self.runtime.context() {
            Value::Object(map) => map.clone(),
            _ => Map::new(),
        };
        self.runtime = RuntimeState::new(vars, context);
        self
    }

    pub fn with_context(mut self, context: Map<String, Value>) -> Self {
        let vars = match self.runtime.vars() {
            Value::Object(map) => map.clone(),
            _ => Map::new(),
        };
        self.runtime = RuntimeState::new(vars, context);
        self
    }

    /// Replay every step in order. Returns a report, never panics; the event
    /// log carries the step-by-step detail.
    pub async fn replay(&mut self, trajectory: &Trajectory) -> ReplayReport {
        let started = Instant::now();
        let mut executed_steps: u32 = 0;
        self.logger.event(
            EventType::TrajectoryStart,
            json!({
                "trajectory_id": trajectory.trajectory_id,
                "site": trajectory.site,
                "task_type": trajectory.task_type,
                "version": trajectory.version,
            }),
        );

        for step in &trajectory.steps {
            let rendered = match render_step(step, &self.runtime) {
                Ok(rendered) => rendered,
                Err(err) => {
                    // render failure is malformed input, fatal even on
                    // optional steps
                    self.logger.event(EventType::StepStart, json!({ "step": step }));
                    let err = ExecError::Template(err);
                    self.logger.event(
                        EventType::StepError,
                        json!({ "step_id": step.id, "action": step.action, "error": err.to_string() }),
                    );
                    return ReplayReport::failed(err.to_string(), executed_steps, started, &step.id);
                }
            };
            self.logger.event(EventType::StepStart, json!({ "step": rendered }));

            if rendered.action == HUMAN_HANDOFF_ACTION {
                let message = if rendered.value.is_empty() {
                    DEFAULT_HANDOFF_MESSAGE
                } else {
                    rendered.value.as_str()
                };
                if let Err(err) = self.handoff.acknowledge(message).await {
                    if self.absorb(&rendered, &err) {
                        continue;
                    }
                    return ReplayReport::failed(
                        err.to_string(),
                        executed_steps,
                        started,
                        &rendered.id,
                    );
                }
                self.logger.event(
                    EventType::StepDone,
                    json!({ "step_id": rendered.id, "action": HUMAN_HANDOFF_ACTION }),
                );
                executed_steps += 1;
                continue;
            }

            let output = match self.dispatch(&rendered).await {
                Ok(output) => output,
                Err(err) => {
                    if self.absorb(&rendered, &err) {
                        continue;
                    }
                    return ReplayReport::failed(
                        err.to_string(),
                        executed_steps,
                        started,
                        &rendered.id,
                    );
                }
            };

            self.runtime.last_result = Some(output.to_value());
            if let Some(path) = rendered.save_as_path() {
                self.runtime.set_var(path, output.to_var_value());
            }
            executed_steps += 1;
            self.record_visit(&rendered, &output).await;

            match self.check_guards(&rendered).await {
                Ok(true) => {}
                Ok(false) => {
                    let reason = format!("guard failed for step {}", rendered.id);
                    self.logger.event(
                        EventType::GuardFailed,
                        json!({ "step_id": rendered.id, "guards": rendered.guards }),
                    );
                    if rendered.optional {
                        self.logger.event(
                            EventType::StepSkipped,
                            json!({ "step_id": rendered.id, "reason": reason }),
                        );
                        continue;
                    }
                    return ReplayReport::failed(reason, executed_steps, started, &rendered.id);
                }
                Err(err) => {
                    if self.absorb(&rendered, &err) {
                        continue;
                    }
                    return ReplayReport::failed(
                        err.to_string(),
                        executed_steps,
                        started,
                        &rendered.id,
                    );
                }
            }

            self.logger.event(
                EventType::StepDone,
                json!({ "step_id": rendered.id, "result": output.to_value() }),
            );
        }

        let report = ReplayReport::ok(executed_steps, started);
        self.logger.event(
            EventType::TrajectoryDone,
            json!({
                "trajectory_id": trajectory.trajectory_id,
                "latency_ms": report.latency_ms,
            }),
        );
        self.logger.event(
            EventType::TaskMemorySummary,
            json!({ "summary": self.task_memory.summary() }),
        );
        self.logger.event(
            EventType::RuntimeArtifacts,
            json!({ "artifacts": self.runtime.artifacts }),
        );
        report
    }

    async fn dispatch(&mut self, step: &Step) -> Result<ActionOutput, ExecError> {
        let handler = self
            .registry
            .get(&step.action)
            .ok_or_else(|| ExecError::UnsupportedAction(step.action.clone()))?;
        handler
            .run(ActionContext {
                surface: self.surface.as_ref(),
                runtime: &mut self.runtime,
                step,
            })
            .await
    }

    /// Log the error and decide whether this step may be skipped. Emits
    /// `step_skipped` when it can.
    fn absorb(&self, step: &Step, err: &ExecError) -> bool {
        let message = err.to_string();
        self.logger.event(
            EventType::StepError,
            json!({ "step_id": step.id, "action": step.action, "error": message }),
        );
        if step.optional && err.degradable() {
            self.logger.event(
                EventType::StepSkipped,
                json!({ "step_id": step.id, "reason": message }),
            );
            return true;
        }
        false
    }

    /// Best-effort page bookkeeping after a successful step. Surface
    /// failures here never affect the replay.
    async fn record_visit(&mut self, step: &Step, output: &ActionOutput) {
        if step.action == "open" {
            let url = output.url().unwrap_or(step.target.as_str());
            if !url.is_empty() {
                self.task_memory.record_visit(url, "");
            }
            return;
        }
        if VISIT_IMPLYING_ACTIONS.contains(&step.action.as_str()) {
            match self.surface.current_url().await {
                Ok(url) if !url.is_empty() => self.task_memory.record_visit(&url, ""),
                Ok(_) => {}
                Err(err) => debug!(step_id = %step.id, %err, "visit bookkeeping skipped"),
            }
        }
    }

    /// Evaluate a step's guard chain. Empty chain passes; unknown kinds
    /// never pass; an invalid `url_matches` pattern is a validation error.
    async fn check_guards(&self, step: &Step) -> Result<bool, ExecError> {
        for guard in &step.guards {
            let mut passed = match guard.kind {
                GuardKind::UrlContains => {
                    self.surface.current_url().await?.contains(&guard.value)
                }
                GuardKind::UrlMatches => {
                    let pattern = Regex::new(&guard.value).map_err(|err| {
                        ExecError::Validation(format!(
                            "invalid guard pattern '{}': {err}",
                            guard.value
                        ))
                    })?;
                    pattern.is_match(&self.surface.current_url().await?)
                }
                GuardKind::SnapshotContains => {
                    self.surface.snapshot(false).await?.tree.contains(&guard.value)
                }
                GuardKind::Unknown => false,
            };
            if guard.negate {
                passed = !passed;
            }
            if !passed {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use parking_lot::Mutex;
    use serde_json::json;

    use amw_automation::{Capture, LoadState, ScreenshotRequest, Snapshot, SurfaceError};
    use amw_trajectory::TrajectoryDraft;

    use super::*;
    use crate::registry::ActionHandler;

    #[derive(Default)]
    struct FakeSurface {
        calls: Mutex<Vec<String>>,
        url: Mutex<String>,
        snapshot_tree: String,
        fail_selector: Option<String>,
    }

    impl FakeSurface {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().clone()
        }

        fn record(&self, call: String) {
            self.calls.lock().push(call);
        }

        fn check(&self, selector: &str) -> Result<(), SurfaceError> {
            if self.fail_selector.as_deref() == Some(selector) {
                return Err(SurfaceError::SelectorNotFound(selector.to_string()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl AutomationSurface for FakeSurface {
        async fn open(&self, url: &str, _timeout_ms: u64) -> Result<String, SurfaceError> {
            self.record(format!("open {url}"));
            *self.url.lock() = url.to_string();
            Ok(url.to_string())
        }

        async fn click(&self, selector: &str, _timeout_ms: u64) -> Result<(), SurfaceError> {
            self.check(selector)?;
            self.record(format!("click {selector}"));
            Ok(())
        }

        async fn fill(
            &self,
            selector: &str,
            value: &str,
            _timeout_ms: u64,
        ) -> Result<(), SurfaceError> {
            self.check(selector)?;
            self.record(format!("fill {selector}={value}"));
            Ok(())
        }

        async fn type_text(
            &self,
            selector: &str,
            text: &str,
            _timeout_ms: u64,
        ) -> Result<(), SurfaceError> {
            self.check(selector)?;
            self.record(format!("type {selector}={text}"));
            Ok(())
        }

        async fn press(&self, key: &str, _timeout_ms: u64) -> Result<(), SurfaceError> {
            self.record(format!("press {key}"));
            Ok(())
        }

        async fn wait_ms(&self, ms: u64) -> Result<(), SurfaceError> {
            self.record(format!("wait {ms}"));
            Ok(())
        }

        async fn wait_load(&self, state: LoadState, _timeout_ms: u64) -> Result<(), SurfaceError> {
            self.record(format!("wait_load {}", state.as_str()));
            Ok(())
        }

        async fn snapshot(&self, _interactive: bool) -> Result<Snapshot, SurfaceError> {
            Ok(Snapshot {
                tree: self.snapshot_tree.clone(),
                refs: HashMap::new(),
            })
        }

        async fn current_url(&self) -> Result<String, SurfaceError> {
            Ok(self.url.lock().clone())
        }

        async fn evaluate(
            &self,
            _script: &str,
            _arg: Option<Value>,
            _timeout_ms: u64,
        ) -> Result<Value, SurfaceError> {
            Ok(json!({ "evaluated": true }))
        }

        async fn screenshot(&self, request: &ScreenshotRequest) -> Result<Capture, SurfaceError> {
            Ok(Capture {
                path: request.path.clone(),
                url: None,
                source: None,
            })
        }

        async fn close(&self) -> Result<(), SurfaceError> {
            Ok(())
        }
    }

    struct ProduceAction;

    #[async_trait]
    impl ActionHandler for ProduceAction {
        async fn run(&self, _ctx: ActionContext<'_>) -> Result<ActionOutput, ExecError> {
            Ok(ActionOutput::text("42".to_string()))
        }
    }

    struct RecordingHandoff {
        messages: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl HumanHandoff for RecordingHandoff {
        async fn acknowledge(&self, message: &str) -> Result<(), ExecError> {
            self.messages.lock().push(message.to_string());
            Ok(())
        }
    }

    fn trajectory(steps: Value) -> Trajectory {
        let steps = steps
            .as_array()
            .unwrap()
            .iter()
            .enumerate()
            .map(|(i, raw)| Step::from_value(raw, i))
            .collect();
        TrajectoryDraft::new("t1", "x.io", "search", "find widgets")
            .with_steps(steps)
            .build()
    }

    fn executor(surface: Arc<FakeSurface>, dir: &std::path::Path) -> TrajectoryExecutor {
        let logger = Arc::new(RunLogger::new(dir).unwrap());
        TrajectoryExecutor::new(surface, logger)
    }

    fn event_types(exec: &TrajectoryExecutor) -> Vec<EventType> {
        exec.logger.read_events().iter().map(|e| e.event_type).collect()
    }

    #[tokio::test]
    async fn replays_steps_in_order_and_reports_success() {
        let dir = tempfile::tempdir().unwrap();
        let surface = Arc::new(FakeSurface::default());
        let mut exec = executor(surface.clone(), dir.path());
        let traj = trajectory(json!([
            { "action": "open", "target": "https://x.io/search" },
            { "action": "fill", "target": "#q", "value": "widgets" },
            { "action": "press", "target": "Enter" }
        ]));

        let report = exec.replay(&traj).await;
        assert!(report.success);
        assert_eq!(report.reason, "ok");
        assert_eq!(report.executed_steps, 3);
        assert!(report.failed_step_id.is_empty());
        assert_eq!(
            surface.calls(),
            vec!["open https://x.io/search", "fill #q=widgets", "press Enter"]
        );

        let types = event_types(&exec);
        assert_eq!(types[0], EventType::TrajectoryStart);
        assert!(types.contains(&EventType::TaskMemorySummary));
        assert!(types.contains(&EventType::RuntimeArtifacts));
        assert_eq!(*types.iter().rev().nth(2).unwrap(), EventType::TrajectoryDone);
    }

    #[tokio::test]
    async fn save_as_feeds_later_templates() {
        let dir = tempfile::tempdir().unwrap();
        let surface = Arc::new(FakeSurface::default());
        let mut registry = ActionRegistry::with_defaults();
        registry.register("produce", Arc::new(ProduceAction));
        let mut exec = executor(surface.clone(), dir.path()).with_registry(registry);

        let traj = trajectory(json!([
            { "action": "produce", "save_as": "answer" },
            { "action": "fill", "target": "#q", "value": "{{answer}}" }
        ]));
        let report = exec.replay(&traj).await;
        assert!(report.success);
        assert_eq!(exec.runtime.get_var("answer"), Some(&json!("42")));
        assert!(surface.calls().iter().any(|c| c == "fill #q=42"));
    }

    #[tokio::test]
    async fn optional_step_failure_degrades_to_skip() {
        let dir = tempfile::tempdir().unwrap();
        let surface = Arc::new(FakeSurface {
            fail_selector: Some("#banner".to_string()),
            ..FakeSurface::default()
        });
        let mut exec = executor(surface.clone(), dir.path());
        let traj = trajectory(json!([
            { "action": "open", "target": "https://x.io" },
            { "action": "click", "target": "#banner", "optional": true },
            { "action": "press", "target": "Enter" }
        ]));

        let report = exec.replay(&traj).await;
        assert!(report.success);
        assert_eq!(report.executed_steps, 2);
        let types = event_types(&exec);
        assert!(types.contains(&EventType::StepError));
        assert!(types.contains(&EventType::StepSkipped));
    }

    #[tokio::test]
    async fn required_step_failure_stops_the_replay() {
        let dir = tempfile::tempdir().unwrap();
        let surface = Arc::new(FakeSurface {
            fail_selector: Some("#submit".to_string()),
            ..FakeSurface::default()
        });
        let mut exec = executor(surface.clone(), dir.path());
        let traj = trajectory(json!([
            { "action": "open", "target": "https://x.io" },
            { "id": "submit_step", "action": "click", "target": "#submit" },
            { "action": "press", "target": "Enter" }
        ]));

        let report = exec.replay(&traj).await;
        assert!(!report.success);
        assert_eq!(report.failed_step_id, "submit_step");
        assert_eq!(report.executed_steps, 1);
        assert!(report.reason.contains("selector not found"));
        assert!(!surface.calls().iter().any(|c| c.starts_with("press")));
    }

    #[tokio::test]
    async fn unsupported_action_is_fatal_even_when_optional() {
        let dir = tempfile::tempdir().unwrap();
        let surface = Arc::new(FakeSurface::default());
        let mut exec = executor(surface, dir.path());
        let traj = trajectory(json!([
            { "id": "bad", "action": "teleport", "optional": true }
        ]));

        let report = exec.replay(&traj).await;
        assert!(!report.success);
        assert_eq!(report.failed_step_id, "bad");
        assert!(report.reason.contains("unsupported action"));
    }

    #[tokio::test]
    async fn negated_guard_fails_on_match() {
        let dir = tempfile::tempdir().unwrap();
        let surface = Arc::new(FakeSurface::default());
        let mut exec = executor(surface, dir.path());
        let traj = trajectory(json!([
            {
                "id": "nav",
                "action": "open",
                "target": "https://x.io/login",
                "guards": [{ "kind": "url_contains", "value": "login", "negate": true }]
            }
        ]));

        let report = exec.replay(&traj).await;
        assert!(!report.success);
        assert_eq!(report.failed_step_id, "nav");
        // the guarded step itself did run
        assert_eq!(report.executed_steps, 1);
        assert!(event_types(&exec).contains(&EventType::GuardFailed));
    }

    #[tokio::test]
    async fn guards_pass_against_snapshot_and_url() {
        let dir = tempfile::tempdir().unwrap();
        let surface = Arc::new(FakeSurface {
            snapshot_tree: "list > item 'Widget deluxe'".to_string(),
            ..FakeSurface::default()
        });
        let mut exec = executor(surface, dir.path());
        let traj = trajectory(json!([
            {
                "action": "open",
                "target": "https://x.io/results?q=widgets",
                "guards": [
                    { "kind": "url_matches", "value": "results\\?q=" },
                    { "kind": "snapshot_contains", "value": "Widget deluxe" }
                ]
            }
        ]));

        let report = exec.replay(&traj).await;
        assert!(report.success, "{}", report.reason);
    }

    #[tokio::test]
    async fn unknown_guard_kind_never_passes() {
        let dir = tempfile::tempdir().unwrap();
        let surface = Arc::new(FakeSurface::default());
        let mut exec = executor(surface, dir.path());
        let traj = trajectory(json!([
            {
                "action": "open",
                "target": "https://x.io",
                "guards": [{ "kind": "dom_stable", "value": "x" }]
            }
        ]));

        let report = exec.replay(&traj).await;
        assert!(!report.success);
    }

    #[tokio::test]
    async fn handoff_step_waits_for_the_human() {
        let dir = tempfile::tempdir().unwrap();
        let surface = Arc::new(FakeSurface::default());
        let handoff = Arc::new(RecordingHandoff {
            messages: Mutex::new(Vec::new()),
        });
        let mut exec = executor(surface, dir.path()).with_handoff(handoff.clone());
        let traj = trajectory(json!([
            { "action": "human_handoff", "value": "Solve the captcha" },
            { "action": "press", "target": "Enter" }
        ]));

        let report = exec.replay(&traj).await;
        assert!(report.success);
        assert_eq!(report.executed_steps, 2);
        assert_eq!(handoff.messages.lock().as_slice(), ["Solve the captcha"]);
    }

    #[tokio::test]
    async fn unresolved_template_fails_the_required_step() {
        let dir = tempfile::tempdir().unwrap();
        let surface = Arc::new(FakeSurface::default());
        let mut exec = executor(surface, dir.path());
        let traj = trajectory(json!([
            { "id": "templated", "action": "fill", "target": "#q", "value": "{{missing}}" }
        ]));

        let report = exec.replay(&traj).await;
        assert!(!report.success);
        assert_eq!(report.failed_step_id, "templated");
        assert!(report.reason.contains("template variable not found"));
    }

    #[tokio::test]
    async fn optional_step_cannot_absorb_a_template_error() {
        let dir = tempfile::tempdir().unwrap();
        let surface = Arc::new(FakeSurface::default());
        let mut exec = executor(surface.clone(), dir.path());
        let traj = trajectory(json!([
            {
                "id": "templated",
                "action": "fill",
                "target": "#q",
                "value": "{{missing}}",
                "optional": true
            },
            { "action": "press", "target": "Enter" }
        ]));

        let report = exec.replay(&traj).await;
        assert!(!report.success);
        assert_eq!(report.failed_step_id, "templated");
        assert_eq!(report.executed_steps, 0);
        assert!(surface.calls().is_empty());
        let types = event_types(&exec);
        assert!(types.contains(&EventType::StepError));
        assert!(!types.contains(&EventType::StepSkipped));
    }

    #[tokio::test]
    async fn page_memory_collects_opened_urls() {
        let dir = tempfile::tempdir().unwrap();
        let surface = Arc::new(FakeSurface::default());
        let mut exec = executor(surface, dir.path());
        let traj = trajectory(json!([
            { "action": "open", "target": "https://x.io/a" },
            { "action": "open", "target": "https://x.io/b" },
            { "action": "press", "target": "Enter" }
        ]));

        let report = exec.replay(&traj).await;
        assert!(report.success);
        let pages: Vec<&str> = exec.task_memory.pages().iter().map(|p| p.url.as_str()).collect();
        assert_eq!(pages, ["https://x.io/a", "https://x.io/b"]);
        // press re-visits the current page
        assert_eq!(exec.task_memory.pages()[1].visited_count, 2);
    }
}
