use crate::executor::types::{ExecutionMode, ExecutionReport, TaskReport, WorkerHandle};

/// Output renderer plugin (controls output format)
pub trait OutputRendererPlugin: Send + Sync {
    fn name(&self) -> &str;
    fn format(&self) -> &str;
    fn render(&self, event: &RenderEvent);
}

/// Render events emitted while a run executes
#[derive(Debug, Clone)]
pub enum RenderEvent {
    RunStart {
        run_id: String,
        goal: String,
        mode: ExecutionMode,
        total_tasks: usize,
        total_layers: usize,
    },
    Plan {
        run_id: String,
        layers: Vec<Vec<String>>,
        fallback: bool,
    },
    LayerStart {
        run_id: String,
        layer_id: usize,
        task_ids: Vec<String>,
    },
    TaskStart {
        run_id: String,
        task_id: String,
        layer_id: Option<usize>,
        worker_handle: WorkerHandle,
    },
    TaskComplete {
        run_id: String,
        task: TaskReport,
        duration_ms: u64,
    },
    LayerEnd {
        run_id: String,
        layer_id: usize,
    },
    RunEnd {
        run_id: String,
        report: ExecutionReport,
    },
}

impl RenderEvent {
    pub fn run_id(&self) -> &str {
        match self {
            RenderEvent::RunStart { run_id, .. }
            | RenderEvent::Plan { run_id, .. }
            | RenderEvent::LayerStart { run_id, .. }
            | RenderEvent::TaskStart { run_id, .. }
            | RenderEvent::TaskComplete { run_id, .. }
            | RenderEvent::LayerEnd { run_id, .. }
            | RenderEvent::RunEnd { run_id, .. } => run_id,
        }
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            RenderEvent::RunStart { .. } => "run.start",
            RenderEvent::Plan { .. } => "executor.plan",
            RenderEvent::LayerStart { .. } => "layer.start",
            RenderEvent::TaskStart { .. } => "task.start",
            RenderEvent::TaskComplete { .. } => "task.end",
            RenderEvent::LayerEnd { .. } => "layer.end",
            RenderEvent::RunEnd { .. } => "run.end",
        }
    }
}
