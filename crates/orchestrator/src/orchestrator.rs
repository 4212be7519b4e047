//! The replay-first run loop.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::debug;

use amw_automation::{AutomationSurface, SurfaceError};
use amw_executor::{ReplayReport, TrajectoryExecutor};
use amw_memory::{HybridRetriever, MemoryStore, RetrievalHit, RetrievalQuery, StoreError};
use amw_run_log::{EventType, RunLogger, RunSummary};
use amw_trajectory::{domain_from_site_or_url, short_id, Step, Trajectory, TrajectoryDraft};

use crate::request::{RunMode, RunRequest};

/// Run-level failures. Step-level failures are data inside [`RunOutcome`],
/// not errors.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Surface(#[from] SurfaceError),

    #[error("run log error: {0}")]
    Io(#[from] std::io::Error),
}

/// Produces a connected automation surface for a request. The one seam
/// between the core and a concrete browser binding.
#[async_trait]
pub trait SurfaceProvider: Send + Sync {
    async fn connect(
        &self,
        request: &RunRequest,
    ) -> Result<Arc<dyn AutomationSurface>, SurfaceError>;
}

/// Final result of one orchestrated run.
#[derive(Clone, Debug, Serialize)]
pub struct RunOutcome {
    pub success: bool,
    pub mode: RunMode,
    pub result: ReplayReport,
    pub selected_trajectory_id: String,
    pub summary: RunSummary,
}

/// Replay-first task runner over one memory store.
pub struct MemoryOrchestrator {
    store: Arc<MemoryStore>,
    data_dir: PathBuf,
    provider: Arc<dyn SurfaceProvider>,
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

fn hit_payload(hit: &RetrievalHit) -> Value {
    json!({
        "trajectory_id": hit.trajectory.trajectory_id,
        "score": round4(hit.score),
        "detail": {
            "site_match": round4(hit.detail.site_match),
            "task_match": round4(hit.detail.task_match),
            "lexical": round4(hit.detail.lexical),
            "semantic_lite": round4(hit.detail.semantic_lite),
            "reliability": round4(hit.detail.reliability),
        },
    })
}

fn summary_extra(mode: RunMode, fields: &[(&str, Value)]) -> Map<String, Value> {
    let mut extra = Map::new();
    extra.insert("mode".to_string(), json!(mode.as_str()));
    for (key, value) in fields {
        extra.insert((*key).to_string(), value.clone());
    }
    extra
}

impl MemoryOrchestrator {
    pub fn new(store: Arc<MemoryStore>, data_dir: PathBuf, provider: Arc<dyn SurfaceProvider>) -> Self {
        MemoryOrchestrator {
            store,
            data_dir,
            provider,
        }
    }

    /// Run one request: replay the best stored trajectory unless disabled,
    /// otherwise execute the fallback steps, persisting them only on
    /// success. The session is held open and closed regardless of outcome.
    pub async fn run(
        &self,
        request: &RunRequest,
        fallback_steps: Vec<Step>,
    ) -> Result<RunOutcome, OrchestratorError> {
        let logger = Arc::new(RunLogger::new(&self.data_dir)?);
        let surface = self.provider.connect(request).await?;

        let mut context = Map::new();
        context.insert("site".to_string(), json!(request.site));
        context.insert("task_type".to_string(), json!(request.task_type));
        context.insert("intent".to_string(), json!(request.intent));
        let mut executor = TrajectoryExecutor::new(surface.clone(), logger.clone())
            .with_vars(request.vars.clone())
            .with_context(context);

        logger.event(EventType::RunStart, json!({ "request": request }));
        let outcome = self
            .execute(request, fallback_steps, &mut executor, &logger)
            .await;

        if request.hold_open_ms > 0 {
            logger.event(
                EventType::HoldOpen,
                json!({ "hold_open_ms": request.hold_open_ms }),
            );
            tokio::time::sleep(Duration::from_millis(request.hold_open_ms)).await;
        }
        if let Err(err) = surface.close().await {
            debug!(%err, "surface close failed");
        }
        outcome
    }

    async fn execute(
        &self,
        request: &RunRequest,
        fallback_steps: Vec<Step>,
        executor: &mut TrajectoryExecutor,
        logger: &RunLogger,
    ) -> Result<RunOutcome, OrchestratorError> {
        if request.disable_replay {
            debug!("replay disabled by request");
        } else {
            let hits = HybridRetriever::new(&self.store).search(&RetrievalQuery::new(
                &request.site,
                &request.task_type,
                &request.intent,
            ))?;
            logger.event(
                EventType::RetrievalResult,
                json!({ "hits": hits.iter().map(hit_payload).collect::<Vec<_>>() }),
            );

            if let Some(hit) = hits.first() {
                let result = executor.replay(&hit.trajectory).await;
                self.store.record_result(
                    &hit.trajectory.trajectory_id,
                    result.success,
                    result.latency_ms,
                )?;
                if result.success {
                    let summary = logger.summarize(
                        "success",
                        summary_extra(
                            RunMode::Replay,
                            &[
                                ("trajectory_id", json!(hit.trajectory.trajectory_id)),
                                ("executed_steps", json!(result.executed_steps)),
                            ],
                        ),
                    );
                    return Ok(RunOutcome {
                        success: true,
                        mode: RunMode::Replay,
                        selected_trajectory_id: hit.trajectory.trajectory_id.clone(),
                        result,
                        summary,
                    });
                }
                logger.event(
                    EventType::ReplayFailed,
                    json!({
                        "trajectory_id": hit.trajectory.trajectory_id,
                        "reason": result.reason,
                    }),
                );
            }
        }

        if fallback_steps.is_empty() {
            let reason = "no successful replay and no fallback steps provided";
            logger.event(EventType::RunFailed, json!({ "reason": reason }));
            let summary = logger.summarize(
                "failed",
                summary_extra(RunMode::None, &[("reason", json!(reason))]),
            );
            return Ok(RunOutcome {
                success: false,
                mode: RunMode::None,
                result: ReplayReport {
                    success: false,
                    reason: reason.to_string(),
                    executed_steps: 0,
                    latency_ms: 0,
                    failed_step_id: String::new(),
                },
                selected_trajectory_id: String::new(),
                summary,
            });
        }

        let fallback = build_fallback_trajectory(request, fallback_steps);
        let result = executor.replay(&fallback).await;
        if result.success {
            self.store.save(&fallback)?;
            self.store
                .record_result(&fallback.trajectory_id, true, result.latency_ms)?;
            let summary = logger.summarize(
                "success",
                summary_extra(
                    RunMode::Explore,
                    &[
                        ("trajectory_id", json!(fallback.trajectory_id)),
                        ("executed_steps", json!(result.executed_steps)),
                    ],
                ),
            );
            return Ok(RunOutcome {
                success: true,
                mode: RunMode::Explore,
                selected_trajectory_id: fallback.trajectory_id,
                result,
                summary,
            });
        }

        logger.event(
            EventType::RunFailed,
            json!({
                "trajectory_id": fallback.trajectory_id,
                "reason": result.reason,
            }),
        );
        let summary = logger.summarize(
            "failed",
            summary_extra(
                RunMode::Explore,
                &[
                    ("trajectory_id", json!(fallback.trajectory_id)),
                    ("reason", json!(result.reason)),
                ],
            ),
        );
        Ok(RunOutcome {
            success: false,
            mode: RunMode::Explore,
            selected_trajectory_id: fallback.trajectory_id,
            result,
            summary,
        })
    }
}

/// An exploration trajectory from caller-supplied steps. Never stored unless
/// its run succeeds.
fn build_fallback_trajectory(request: &RunRequest, steps: Vec<Step>) -> Trajectory {
    let site = domain_from_site_or_url(&request.site);
    let mut metadata = Map::new();
    metadata.insert("source".to_string(), json!("fallback_steps"));
    TrajectoryDraft::new(
        &short_id(&format!("{site}_{}", request.task_type)),
        &site,
        &request.task_type,
        &request.intent,
    )
    .with_steps(steps)
    .with_metadata(metadata)
    .build()
}
