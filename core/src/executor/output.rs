use std::sync::Arc;

use super::traits::{OutputRendererPlugin, RenderEvent};

/// Routes render events to the configured renderer, or to tracing when none is set
#[derive(Clone, Default)]
pub struct RunEmitter {
    renderer: Option<Arc<dyn OutputRendererPlugin>>,
}

impl RunEmitter {
    pub fn new(renderer: Option<Arc<dyn OutputRendererPlugin>>) -> Self {
        Self { renderer }
    }

    pub fn has_renderer(&self) -> bool {
        self.renderer.is_some()
    }

    pub fn emit(&self, event: RenderEvent) {
        match &self.renderer {
            Some(renderer) => renderer.render(&event),
            None => log_event(&event),
        }
    }
}

impl std::fmt::Debug for RunEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunEmitter")
            .field("renderer", &self.renderer.as_ref().map(|r| r.name().to_string()))
            .finish()
    }
}

/// Emit a render event as a tracing record
pub fn log_event(event: &RenderEvent) {
    match event {
        RenderEvent::RunStart {
            run_id,
            mode,
            total_tasks,
            total_layers,
            ..
        } => {
            tracing::info!(
                run_id = %run_id,
                mode = %mode,
                total_tasks,
                total_layers,
                "run started"
            );
        }
        RenderEvent::Plan {
            run_id,
            layers,
            fallback,
        } => {
            for (i, layer) in layers.iter().enumerate() {
                tracing::debug!(run_id = %run_id, layer = i, tasks = %layer.join(", "), "planned layer");
            }
            if *fallback {
                tracing::warn!(run_id = %run_id, "plan contains a fallback layer");
            }
        }
        RenderEvent::LayerStart {
            run_id,
            layer_id,
            task_ids,
        } => {
            tracing::info!(run_id = %run_id, layer = layer_id, tasks = task_ids.len(), "layer started");
        }
        RenderEvent::TaskStart {
            run_id,
            task_id,
            worker_handle,
            ..
        } => {
            tracing::debug!(run_id = %run_id, task_id = %task_id, worker = %worker_handle, "task started");
        }
        RenderEvent::TaskComplete {
            run_id,
            task,
            duration_ms,
        } => match &task.error {
            Some(error) => tracing::warn!(
                run_id = %run_id,
                task_id = %task.task_id,
                duration_ms,
                error = %error,
                "task failed"
            ),
            None => tracing::debug!(
                run_id = %run_id,
                task_id = %task.task_id,
                status = %task.status,
                duration_ms,
                "task finished"
            ),
        },
        RenderEvent::LayerEnd { run_id, layer_id } => {
            tracing::debug!(run_id = %run_id, layer = layer_id, "layer finished");
        }
        RenderEvent::RunEnd { run_id, report } => {
            tracing::info!(
                run_id = %run_id,
                completed = report.completed,
                failed = report.failed,
                pending = report.pending,
                duration_ms = report.duration_ms,
                "run finished"
            );
        }
    }
}
