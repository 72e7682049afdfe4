use std::sync::Arc;

use taskweave_core::api::{
    AppConfig, CliError, ExecutionMode, ExecutionReport, InferenceKind, NewTask, Orchestrator,
    OrchestratorError, StatusReport,
};
use taskweave_plugins::factory;

use super::cli::{Args, Commands, ExecArgs, OutputFormat, RunArgs};

/// Exit code after Ctrl-C
const INTERRUPTED: i32 = 130;

pub async fn dispatch(args: Args, mut cfg: AppConfig) -> Result<i32, CliError> {
    if let Some(path) = args.checkpoint.as_deref().filter(|p| !p.trim().is_empty()) {
        cfg.checkpoint.path = path.to_string();
    }
    let format = args
        .format
        .map(OutputFormat::as_str)
        .unwrap_or(cfg.executor.output_format.as_str())
        .to_string();

    match args.command {
        Commands::Run(run_args) => handle_run(cfg, run_args, &format).await,
        Commands::Resume(resume_args) => handle_resume(cfg, resume_args.exec, &format).await,
        Commands::Status => handle_status(cfg, &format).await,
        Commands::Layers => handle_layers(cfg, &format).await,
        Commands::Stop => handle_stop(cfg).await,
    }
}

/// Fold execution flags into the config; returns the mode to execute with.
fn apply_exec(cfg: &mut AppConfig, exec: &ExecArgs) -> Option<ExecutionMode> {
    if let Some(n) = exec.max_parallel {
        cfg.executor.max_parallel = n.max(1);
    }
    exec.serial.then_some(ExecutionMode::Serial)
}

pub async fn handle_run(mut cfg: AppConfig, args: RunArgs, format: &str) -> Result<i32, CliError> {
    let mode = apply_exec(&mut cfg, &args.exec);
    if args.explicit_deps {
        cfg.executor.inference = InferenceKind::Explicit;
    }

    let planner = factory::build_planner(args.plan.as_deref());
    let orch = Arc::new(factory::build_orchestrator(&cfg, planner, Some(format))?);

    let status = orch.start(&args.goal, args.model).await?;
    if !args.task.is_empty() {
        orch.add_tasks(args.task.into_iter().map(NewTask::new).collect())?;
    }
    tracing::info!(
        run_id = status.run_id.as_deref().unwrap_or_default(),
        planned = status.counts.total,
        "run created"
    );

    execute(orch, mode, format).await
}

pub async fn handle_resume(
    mut cfg: AppConfig,
    exec: ExecArgs,
    format: &str,
) -> Result<i32, CliError> {
    let mode = apply_exec(&mut cfg, &exec);
    let orch = Arc::new(factory::build_orchestrator(&cfg, None, Some(format))?);

    let status = orch.resume_checkpoint().await?;
    if status.counts.in_progress > 0 {
        eprintln!(
            "note: {} task(s) were in progress when the checkpoint was taken and will not be rerun",
            status.counts.in_progress
        );
    }

    execute(orch, mode, format).await
}

pub async fn handle_status(cfg: AppConfig, format: &str) -> Result<i32, CliError> {
    let orch = factory::build_orchestrator(&cfg, None, Some("none"))?;
    match orch.resume_checkpoint().await {
        Ok(status) => {
            print_status(&status, format)?;
            Ok(0)
        }
        Err(OrchestratorError::NoActiveRun) => {
            println!("no checkpointed run");
            Ok(0)
        }
        Err(e) => Err(e.into()),
    }
}

pub async fn handle_layers(cfg: AppConfig, format: &str) -> Result<i32, CliError> {
    let orch = factory::build_orchestrator(&cfg, None, Some("none"))?;
    orch.resume_checkpoint().await?;
    let layering = orch.preview_layers()?;

    if format == "jsonl" {
        let value = serde_json::json!({
            "layers": layering.layers,
            "fallback": layering.fallback,
        });
        println!("{value}");
        return Ok(0);
    }

    if layering.layers.is_empty() {
        println!("no pending tasks");
    }
    for (idx, layer) in layering.layers.iter().enumerate() {
        println!("layer {idx}: {}", layer.join(", "));
    }
    if layering.fallback {
        println!("(last layer is a fallback: unresolved dependencies)");
    }
    Ok(0)
}

pub async fn handle_stop(cfg: AppConfig) -> Result<i32, CliError> {
    let orch = factory::build_orchestrator(&cfg, None, Some("none"))?;
    match orch.resume_checkpoint().await {
        Ok(status) => {
            orch.abandon();
            // An empty snapshot replaces the discarded run
            orch.save_checkpoint().await?;
            println!(
                "discarded run {}",
                status.run_id.as_deref().unwrap_or_default()
            );
            Ok(0)
        }
        Err(OrchestratorError::NoActiveRun) => {
            println!("no checkpointed run");
            Ok(0)
        }
        Err(e) => Err(e.into()),
    }
}

/// Execute the active run; Ctrl-C stops it and saves a checkpoint.
async fn execute(
    orch: Arc<Orchestrator>,
    mode: Option<ExecutionMode>,
    format: &str,
) -> Result<i32, CliError> {
    let pass = {
        let orch = orch.clone();
        tokio::spawn(async move { orch.execute(mode).await })
    };

    tokio::select! {
        joined = pass => {
            let report = joined
                .map_err(|e| CliError::Command(format!("execution task failed: {e}")))??;
            print_report(&report, format);
            Ok(if report.is_success() { 0 } else { 1 })
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("interrupted, stopping run");
            let saved = orch.stop().await?;
            eprintln!(
                "interrupted; checkpoint saved to {} ({}/{} tasks completed)",
                saved.location, saved.completed_count, saved.total_tasks
            );
            Ok(INTERRUPTED)
        }
    }
}

fn print_report(report: &ExecutionReport, format: &str) {
    // The jsonl renderer already emitted run.end
    if format == "jsonl" {
        return;
    }

    for task in &report.tasks {
        match &task.error {
            Some(err) => println!("  {:<16} {:<11} {}", task.task_id, task.status, err),
            None => println!("  {:<16} {}", task.task_id, task.status),
        }
    }
    println!(
        "{} completed, {} failed, {} pending in {}ms",
        report.completed, report.failed, report.pending, report.duration_ms
    );
}

fn print_status(status: &StatusReport, format: &str) -> Result<(), CliError> {
    if format == "jsonl" {
        let line = serde_json::to_string(status).map_err(|e| CliError::Command(e.to_string()))?;
        println!("{line}");
        return Ok(());
    }

    println!("run {}", status.run_id.as_deref().unwrap_or("-"));
    println!("  goal:  {}", status.goal.as_deref().unwrap_or("-"));
    if let Some(model) = &status.model_preference {
        println!("  model: {model}");
    }
    let c = &status.counts;
    println!(
        "  tasks: {} total, {} completed, {} failed, {} in progress, {} pending",
        c.total, c.completed, c.failed, c.in_progress, c.pending
    );
    for task in &status.tasks {
        if task.dependencies.is_empty() {
            println!("  - {} [{}]", task.task_id, task.status);
        } else {
            println!(
                "  - {} [{}] after {}",
                task.task_id,
                task.status,
                task.dependencies.join(", ")
            );
        }
    }
    Ok(())
}
