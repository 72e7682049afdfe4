use std::sync::Arc;

use anyhow::Result;

use taskweave_core::api::{
    AppConfig, CheckpointConfig, CheckpointStore, DependencyInferenceStrategy, ExecutionOpts,
    FileCheckpointStore, InferenceKind, Orchestrator, OutputRendererPlugin, Planner,
    WorkerBackend, WorkerConfig,
};
use taskweave_core::config::default_checkpoint_path;
use taskweave_core::executor::strategy_for;

use crate::planner::PlanFilePlanner;
use crate::renderers::{JsonlRendererPlugin, TextRendererPlugin};
use crate::worker::CommandWorker;

pub fn build_worker(cfg: &WorkerConfig) -> Arc<dyn WorkerBackend> {
    Arc::new(CommandWorker::from_config(cfg))
}

pub fn build_renderer(output_format: &str) -> Option<Arc<dyn OutputRendererPlugin>> {
    match output_format.trim() {
        "jsonl" => Some(Arc::new(JsonlRendererPlugin::new(false))),
        "none" | "quiet" => None,
        "text" => Some(Arc::new(TextRendererPlugin::new(false))),
        other => {
            tracing::warn!(format = other, "unknown output format, using text");
            Some(Arc::new(TextRendererPlugin::new(false)))
        }
    }
}

pub fn build_inference(kind: InferenceKind) -> Arc<dyn DependencyInferenceStrategy> {
    Arc::from(strategy_for(kind))
}

pub fn build_checkpoint_store(cfg: &CheckpointConfig) -> Result<Arc<dyn CheckpointStore>> {
    let path = match cfg.path.trim() {
        "" => default_checkpoint_path()?,
        p => p.into(),
    };
    Ok(Arc::new(FileCheckpointStore::new(path)))
}

pub fn build_planner(plan_file: Option<&str>) -> Option<Arc<dyn Planner>> {
    plan_file
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| Arc::new(PlanFilePlanner::new(p)) as Arc<dyn Planner>)
}

/// Assemble an orchestrator from configuration.
///
/// `output_format` overrides `executor.output_format` when given.
pub fn build_orchestrator(
    cfg: &AppConfig,
    planner: Option<Arc<dyn Planner>>,
    output_format: Option<&str>,
) -> Result<Orchestrator> {
    let format = output_format.unwrap_or(&cfg.executor.output_format);

    let mut opts = ExecutionOpts::from_config(cfg);
    if format == "jsonl" {
        opts.progress_bar = false;
    }

    let mut builder = Orchestrator::builder(build_worker(&cfg.worker))
        .inference(build_inference(cfg.executor.inference))
        .checkpoint_store(build_checkpoint_store(&cfg.checkpoint)?)
        .opts(opts);
    if let Some(planner) = planner {
        builder = builder.planner(planner);
    }
    if let Some(renderer) = build_renderer(format) {
        builder = builder.renderer(renderer);
    }

    Ok(builder.build())
}
