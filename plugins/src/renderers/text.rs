use taskweave_core::api::{OutputRendererPlugin, RenderEvent, TaskStatus};

pub struct TextRendererPlugin {
    ascii_only: bool,
}

impl TextRendererPlugin {
    pub fn new(ascii_only: bool) -> Self {
        Self { ascii_only }
    }

    fn status_label(&self, status: TaskStatus) -> &'static str {
        match (status, self.ascii_only) {
            (TaskStatus::Completed, true) => "OK",
            (TaskStatus::Completed, false) => "SUCCESS",
            (TaskStatus::Failed, true) => "FAIL",
            (TaskStatus::Failed, false) => "FAILED",
            (other, _) => other.as_str(),
        }
    }

    fn format_event(&self, event: &RenderEvent) -> String {
        match event {
            RenderEvent::RunStart {
                run_id,
                goal,
                mode,
                total_tasks,
                total_layers,
            } => format!(
                "RUN START {} ({} mode, tasks: {}, layers: {})\n  goal: {}",
                run_id, mode, total_tasks, total_layers, goal
            ),
            RenderEvent::Plan {
                run_id,
                layers,
                fallback,
            } => {
                let mut out = format!("PLAN {}:", run_id);
                for (idx, layer) in layers.iter().enumerate() {
                    out.push_str(&format!("\n  layer {}: {}", idx, layer.join(", ")));
                }
                if *fallback {
                    out.push_str("\n  (last layer is a fallback: unresolved dependencies)");
                }
                out
            }
            RenderEvent::LayerStart {
                run_id,
                layer_id,
                task_ids,
            } => format!(
                "LAYER START {} (layer {}, tasks: {})",
                run_id,
                layer_id,
                task_ids.len()
            ),
            RenderEvent::TaskStart {
                run_id,
                task_id,
                layer_id,
                worker_handle,
            } => match layer_id {
                Some(layer) => format!(
                    "TASK START {} (layer {}, task {}, worker {})",
                    run_id, layer, task_id, worker_handle
                ),
                None => format!(
                    "TASK START {} (task {}, worker {})",
                    run_id, task_id, worker_handle
                ),
            },
            RenderEvent::TaskComplete {
                run_id,
                task,
                duration_ms,
            } => {
                let mut line = format!(
                    "TASK END {} (task {}, status {}, duration {}ms)",
                    run_id,
                    task.task_id,
                    self.status_label(task.status),
                    duration_ms
                );
                if let Some(err) = &task.error {
                    line.push_str(&format!(": {}", err));
                }
                line
            }
            RenderEvent::LayerEnd { run_id, layer_id } => {
                format!("LAYER END {} (layer {})", run_id, layer_id)
            }
            RenderEvent::RunEnd { run_id, report } => format!(
                "RUN END {} (completed {}, failed {}, pending {}, duration {}ms)",
                run_id, report.completed, report.failed, report.pending, report.duration_ms
            ),
        }
    }
}

impl OutputRendererPlugin for TextRendererPlugin {
    fn name(&self) -> &str {
        "text-renderer"
    }

    fn format(&self) -> &str {
        "text"
    }

    fn render(&self, event: &RenderEvent) {
        println!("{}", self.format_event(event));
    }
}
