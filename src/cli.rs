//! Command-line interface: list, search, record, validate, run.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::{json, Map, Value};
use tracing::info;

use amw_executor::TrajectoryExecutor;
use amw_memory::{HybridRetriever, MemoryStore, RetrievalQuery};
use amw_orchestrator::{MemoryOrchestrator, RunRequest, SurfaceProvider};
use amw_run_log::RunLogger;
use amw_trajectory::{
    domain_from_site_or_url, parse_steps, short_id, validate_steps_payload, Step, TrajectoryDraft,
};

use crate::config::{parse_bool, AmwConfig};
use crate::provider::UnboundSurfaceProvider;

#[derive(Parser)]
#[command(name = "amw", author, version, about = "Agent Memory Workbench", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Log level when RUST_LOG is not set
    #[arg(short, long, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List stored trajectories
    List(ListArgs),
    /// Search trajectory memory
    Search(SearchArgs),
    /// Execute a steps file and save the trajectory on success
    Record(RecordArgs),
    /// Validate a steps file without touching a browser
    Validate(ValidateArgs),
    /// Replay-first run with optional fallback exploration
    Run(RunArgs),
}

#[derive(Args)]
pub struct ListArgs {
    #[arg(long = "store-dir")]
    store_dir: Option<String>,
    #[arg(long)]
    site: Option<String>,
    #[arg(long = "task-type")]
    task_type: Option<String>,
    #[arg(long, default_value_t = 50)]
    limit: u32,
}

#[derive(Args)]
pub struct SearchArgs {
    #[arg(long = "store-dir")]
    store_dir: Option<String>,
    #[arg(long)]
    site: String,
    #[arg(long = "task-type")]
    task_type: String,
    #[arg(long)]
    intent: String,
    #[arg(long = "top-k", default_value_t = 3)]
    top_k: usize,
}

#[derive(Args)]
pub struct ValidateArgs {
    /// Steps file: a JSON array or an object with a `steps` array
    #[arg(long = "steps-file")]
    steps_file: PathBuf,
}

/// Options shared by the session-holding commands.
#[derive(Args)]
pub struct SessionArgs {
    #[arg(long)]
    session: Option<String>,
    #[arg(long)]
    profile: Option<String>,
    #[arg(long = "profile-dir")]
    profile_dir: Option<String>,
    #[arg(long)]
    binary: Option<String>,
    /// true/false (also 1/0, yes/no, on/off)
    #[arg(long)]
    headed: Option<String>,
    #[arg(long = "hold-open-ms")]
    hold_open_ms: Option<u64>,
}

/// Runtime variable sources, merged weakest first: file, inline JSON, query.
#[derive(Args)]
pub struct VarsArgs {
    /// Shortcut for vars.query
    #[arg(long)]
    query: Option<String>,
    /// JSON object file with runtime variables
    #[arg(long = "vars-file")]
    vars_file: Option<PathBuf>,
    /// Inline JSON object with runtime variables
    #[arg(long = "vars-json")]
    vars_json: Option<String>,
}

#[derive(Args)]
pub struct RecordArgs {
    #[arg(long = "store-dir")]
    store_dir: Option<String>,
    #[arg(long = "steps-file")]
    steps_file: PathBuf,
    #[arg(long)]
    site: String,
    #[arg(long = "task-type")]
    task_type: String,
    #[arg(long)]
    intent: String,
    /// Explicit id; defaults to <site>_<task>_<random>
    #[arg(long = "trajectory-id")]
    trajectory_id: Option<String>,
    #[command(flatten)]
    session: SessionArgs,
    #[command(flatten)]
    vars: VarsArgs,
}

#[derive(Args)]
pub struct RunArgs {
    #[arg(long = "store-dir")]
    store_dir: Option<String>,
    #[arg(long)]
    site: String,
    #[arg(long = "task-type")]
    task_type: String,
    #[arg(long)]
    intent: String,
    /// Steps to explore with when no stored trajectory succeeds
    #[arg(long = "fallback-steps-file")]
    fallback_steps_file: Option<PathBuf>,
    /// Skip memory replay and go straight to the fallback steps
    #[arg(long = "disable-replay")]
    disable_replay: Option<String>,
    #[command(flatten)]
    session: SessionArgs,
    #[command(flatten)]
    vars: VarsArgs,
}

/// Dispatch a parsed command. Returns the process exit code.
pub async fn execute(command: Commands, config: &AmwConfig) -> Result<i32> {
    match command {
        Commands::List(args) => cmd_list(args, config),
        Commands::Search(args) => cmd_search(args, config),
        Commands::Validate(args) => cmd_validate(args),
        Commands::Record(args) => cmd_record(args, config).await,
        Commands::Run(args) => cmd_run(args, config).await,
    }
}

fn open_store(store_dir: &str) -> Result<MemoryStore> {
    MemoryStore::open(&Path::new(store_dir).join("memory.db"))
        .with_context(|| format!("failed to open store under {store_dir}"))
}

fn pick<'a>(cli_value: &'a Option<String>, config_value: &'a str) -> &'a str {
    match cli_value {
        Some(v) if !v.trim().is_empty() => v,
        _ => config_value,
    }
}

/// Read a steps file: a bare JSON array or an object with `steps`. A UTF-8
/// BOM is tolerated.
fn load_steps_file(path: &Path) -> Result<(Vec<Step>, Value)> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read steps file {}", path.display()))?;
    let raw = raw.strip_prefix('\u{feff}').unwrap_or(&raw);
    let payload: Value = serde_json::from_str(raw)
        .with_context(|| format!("invalid JSON in {}", path.display()))?;
    let Some(steps) = parse_steps(&payload) else {
        bail!("steps file must be a JSON array or object with 'steps'");
    };
    Ok((steps, payload))
}

/// Merge runtime variable sources, strongest last.
fn parse_runtime_vars(args: &VarsArgs) -> Result<Map<String, Value>> {
    let mut vars = Map::new();
    if let Some(path) = &args.vars_file {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read vars file {}", path.display()))?;
        let Value::Object(map) = serde_json::from_str(&raw)
            .with_context(|| format!("invalid JSON in {}", path.display()))?
        else {
            bail!("--vars-file must point to a JSON object");
        };
        vars.extend(map);
    }
    if let Some(inline) = &args.vars_json {
        let Value::Object(map) =
            serde_json::from_str(inline).context("invalid JSON in --vars-json")?
        else {
            bail!("--vars-json must be a JSON object");
        };
        vars.extend(map);
    }
    if let Some(query) = &args.query {
        vars.insert("query".to_string(), json!(query));
    }
    Ok(vars)
}

fn build_request(
    site: &str,
    task_type: &str,
    intent: &str,
    session: &SessionArgs,
    vars: &VarsArgs,
    disable_replay: Option<&String>,
    config: &AmwConfig,
) -> Result<RunRequest> {
    let mut request = RunRequest::new(site, task_type, intent);
    request.session = pick(&session.session, &config.session).to_string();
    request.profile = pick(&session.profile, &config.profile).to_string();
    request.profile_dir = pick(&session.profile_dir, &config.profile_dir).to_string();
    request.headed = session
        .headed
        .as_deref()
        .map(parse_bool)
        .unwrap_or(config.headed);
    request.disable_replay = disable_replay
        .map(|v| parse_bool(v))
        .unwrap_or(config.disable_replay);
    request.hold_open_ms = session.hold_open_ms.unwrap_or(config.hold_open_ms);
    request.vars = parse_runtime_vars(vars)?;
    Ok(request)
}

fn cmd_list(args: ListArgs, config: &AmwConfig) -> Result<i32> {
    let store = open_store(pick(&args.store_dir, &config.store_dir))?;
    let mut filter = amw_memory::ListFilter::new().limit(args.limit);
    if let Some(site) = &args.site {
        filter = filter.site(site);
    }
    if let Some(task_type) = &args.task_type {
        filter = filter.task_type(task_type);
    }
    let trajectories = store.list(&filter)?;
    if trajectories.is_empty() {
        println!("No trajectories found.");
        return Ok(0);
    }
    for traj in trajectories {
        let stats = store.get_stats(&traj.trajectory_id)?;
        println!(
            "{} | site={} task_type={} steps={} success_rate={:.2} usage={}",
            traj.trajectory_id,
            traj.site,
            traj.task_type,
            traj.steps.len(),
            stats.success_rate,
            stats.usage_count,
        );
    }
    Ok(0)
}

fn cmd_search(args: SearchArgs, config: &AmwConfig) -> Result<i32> {
    let store = open_store(pick(&args.store_dir, &config.store_dir))?;
    let hits = HybridRetriever::new(&store).search(
        &RetrievalQuery::new(&args.site, &args.task_type, &args.intent).top_k(args.top_k),
    )?;
    if hits.is_empty() {
        println!("No retrieval hits.");
        return Ok(0);
    }
    for (i, hit) in hits.iter().enumerate() {
        println!(
            "{}. {} score={:.4} detail={}",
            i + 1,
            hit.trajectory.trajectory_id,
            hit.score,
            serde_json::to_string(&hit.detail)?,
        );
    }
    Ok(0)
}

fn cmd_validate(args: ValidateArgs) -> Result<i32> {
    let raw = fs::read_to_string(&args.steps_file)
        .with_context(|| format!("failed to read {}", args.steps_file.display()))?;
    let had_bom = raw.starts_with('\u{feff}');
    let clean = raw.strip_prefix('\u{feff}').unwrap_or(&raw);
    let payload: Value = serde_json::from_str(clean)
        .with_context(|| format!("invalid JSON in {}", args.steps_file.display()))?;

    let mut report = validate_steps_payload(&payload);
    if had_bom {
        report
            .warnings
            .push("UTF-8 BOM detected; consider saving as UTF-8 without BOM".to_string());
    }
    println!(
        "{}",
        serde_json::to_string_pretty(&json!({
            "ok": report.ok(),
            "file": args.steps_file,
            "step_count": report.step_count,
            "errors": report.errors,
            "warnings": report.warnings,
        }))?
    );
    Ok(if report.ok() { 0 } else { 2 })
}

async fn cmd_record(args: RecordArgs, config: &AmwConfig) -> Result<i32> {
    let store_dir = pick(&args.store_dir, &config.store_dir).to_string();
    let store = open_store(&store_dir)?;
    let logger = Arc::new(RunLogger::new(Path::new(&store_dir))?);

    let (steps, _) = load_steps_file(&args.steps_file)?;
    let site = domain_from_site_or_url(&args.site);
    let trajectory_id = args
        .trajectory_id
        .clone()
        .unwrap_or_else(|| short_id(&format!("{site}_{}", args.task_type)));
    let mut metadata = Map::new();
    metadata.insert("source".to_string(), json!("manual_record"));
    let trajectory = TrajectoryDraft::new(&trajectory_id, &site, &args.task_type, &args.intent)
        .with_steps(steps)
        .with_metadata(metadata)
        .build();

    let request = build_request(
        &args.site,
        &args.task_type,
        &args.intent,
        &args.session,
        &args.vars,
        None,
        config,
    )?;
    let binary = pick(&args.session.binary, &config.binary);
    let provider = UnboundSurfaceProvider::new(binary);
    let surface = provider.connect(&request).await?;

    let mut context = Map::new();
    context.insert("site".to_string(), json!(site));
    context.insert("task_type".to_string(), json!(args.task_type));
    context.insert("intent".to_string(), json!(args.intent));
    let mut executor = TrajectoryExecutor::new(surface.clone(), logger.clone())
        .with_vars(request.vars.clone())
        .with_context(context);

    let result = executor.replay(&trajectory).await;
    let code = if result.success {
        store.save(&trajectory)?;
        store.record_result(&trajectory.trajectory_id, true, result.latency_ms)?;
        let mut extra = Map::new();
        extra.insert("mode".to_string(), json!("record"));
        extra.insert("trajectory_id".to_string(), json!(trajectory.trajectory_id));
        extra.insert("executed_steps".to_string(), json!(result.executed_steps));
        let summary = logger.summarize("success", extra);
        println!("Recorded trajectory: {}", trajectory.trajectory_id);
        println!("{}", serde_json::to_string_pretty(&summary)?);
        0
    } else {
        store.record_result(&trajectory.trajectory_id, false, result.latency_ms)?;
        let mut extra = Map::new();
        extra.insert("mode".to_string(), json!("record"));
        extra.insert("reason".to_string(), json!(result.reason));
        let summary = logger.summarize("failed", extra);
        eprintln!("Record failed: {}", result.reason);
        println!("{}", serde_json::to_string_pretty(&summary)?);
        2
    };

    if request.hold_open_ms > 0 {
        info!(hold_open_ms = request.hold_open_ms, "holding session open");
        tokio::time::sleep(Duration::from_millis(request.hold_open_ms)).await;
    }
    let _ = surface.close().await;
    Ok(code)
}

async fn cmd_run(args: RunArgs, config: &AmwConfig) -> Result<i32> {
    let store_dir = pick(&args.store_dir, &config.store_dir).to_string();
    let store = Arc::new(open_store(&store_dir)?);

    let fallback_steps = match &args.fallback_steps_file {
        Some(path) => load_steps_file(path)?.0,
        None => Vec::new(),
    };
    let request = build_request(
        &args.site,
        &args.task_type,
        &args.intent,
        &args.session,
        &args.vars,
        args.disable_replay.as_ref(),
        config,
    )?;

    let binary = pick(&args.session.binary, &config.binary);
    let orchestrator = MemoryOrchestrator::new(
        store,
        PathBuf::from(&store_dir),
        Arc::new(UnboundSurfaceProvider::new(binary)),
    );
    let outcome = orchestrator.run(&request, fallback_steps).await?;
    println!(
        "{}",
        serde_json::to_string_pretty(&json!({
            "success": outcome.success,
            "mode": outcome.mode,
            "reason": outcome.result.reason,
            "selected_trajectory_id": outcome.selected_trajectory_id,
            "summary": outcome.summary,
        }))?
    );
    Ok(if outcome.success { 0 } else { 2 })
}
