use chrono::Local;
use serde_json::{json, Value};
use taskweave_core::api::{OutputRendererPlugin, RenderEvent};

pub struct JsonlRendererPlugin {
    pretty_print: bool,
}

impl JsonlRendererPlugin {
    pub fn new(pretty_print: bool) -> Self {
        Self { pretty_print }
    }

    fn event_to_json(&self, event: &RenderEvent) -> Value {
        let ts = Local::now().to_rfc3339();
        let event_type = event.event_type();
        match event {
            RenderEvent::RunStart {
                run_id,
                goal,
                mode,
                total_tasks,
                total_layers,
            } => json!({
                "v": 1,
                "event_type": event_type,
                "ts": ts,
                "run_id": run_id,
                "metadata": {
                    "goal": goal,
                    "mode": mode.as_str(),
                    "total_tasks": total_tasks,
                    "total_layers": total_layers,
                }
            }),
            RenderEvent::Plan {
                run_id,
                layers,
                fallback,
            } => {
                let total_tasks: usize = layers.iter().map(|l| l.len()).sum();
                json!({
                    "v": 1,
                    "event_type": event_type,
                    "ts": ts,
                    "run_id": run_id,
                    "metadata": {
                        "layers": layers,
                        "fallback": fallback,
                        "total_tasks": total_tasks,
                    }
                })
            }
            RenderEvent::LayerStart {
                run_id,
                layer_id,
                task_ids,
            } => json!({
                "v": 1,
                "event_type": event_type,
                "ts": ts,
                "run_id": run_id,
                "metadata": {
                    "layer_id": layer_id,
                    "tasks": task_ids,
                }
            }),
            RenderEvent::TaskStart {
                run_id,
                task_id,
                layer_id,
                worker_handle,
            } => json!({
                "v": 1,
                "event_type": event_type,
                "ts": ts,
                "run_id": run_id,
                "task_id": task_id,
                "metadata": {
                    "layer_id": layer_id,
                    "worker": worker_handle.as_str(),
                }
            }),
            RenderEvent::TaskComplete {
                run_id,
                task,
                duration_ms,
            } => json!({
                "v": 1,
                "event_type": event_type,
                "ts": ts,
                "run_id": run_id,
                "task_id": task.task_id,
                "metadata": {
                    "status": task.status.as_str(),
                    "duration_ms": duration_ms,
                    "worker": task.worker_handle.as_ref().map(|h| h.as_str()),
                    "error": task.error,
                }
            }),
            RenderEvent::LayerEnd { run_id, layer_id } => json!({
                "v": 1,
                "event_type": event_type,
                "ts": ts,
                "run_id": run_id,
                "metadata": {
                    "layer_id": layer_id,
                }
            }),
            RenderEvent::RunEnd { run_id, report } => json!({
                "v": 1,
                "event_type": event_type,
                "ts": ts,
                "run_id": run_id,
                "metadata": {
                    "total_tasks": report.tasks.len(),
                    "completed": report.completed,
                    "failed": report.failed,
                    "pending": report.pending,
                    "fallback_used": report.fallback_used,
                    "duration_ms": report.duration_ms,
                }
            }),
        }
    }
}

impl OutputRendererPlugin for JsonlRendererPlugin {
    fn name(&self) -> &str {
        "jsonl-renderer"
    }

    fn format(&self) -> &str {
        "jsonl"
    }

    fn render(&self, event: &RenderEvent) {
        let value = self.event_to_json(event);
        if self.pretty_print {
            println!("{}", serde_json::to_string_pretty(&value).unwrap_or_else(|_| "{}".into()));
        } else {
            println!("{}", serde_json::to_string(&value).unwrap_or_else(|_| "{}".into()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskweave_core::api::{ExecutionMode, ExecutionReport, TaskReport, TaskStatus};

    #[test]
    fn test_jsonl_renderer_event_type() {
        let renderer = JsonlRendererPlugin::new(false);
        let event = RenderEvent::RunStart {
            run_id: "run".to_string(),
            goal: "ship".to_string(),
            mode: ExecutionMode::Parallel,
            total_tasks: 2,
            total_layers: 1,
        };

        let value = renderer.event_to_json(&event);
        assert_eq!(value["event_type"], "run.start");
        assert_eq!(value["metadata"]["mode"], "parallel");
    }

    #[test]
    fn test_jsonl_renderer_task_complete() {
        let renderer = JsonlRendererPlugin::new(false);
        let event = RenderEvent::TaskComplete {
            run_id: "run".to_string(),
            task: TaskReport {
                task_id: "task-1".to_string(),
                status: TaskStatus::Completed,
                dependencies: Vec::new(),
                worker_handle: None,
                error: None,
            },
            duration_ms: 12,
        };

        let value = renderer.event_to_json(&event);
        assert_eq!(value["event_type"], "task.end");
        assert_eq!(value["task_id"], "task-1");
        assert_eq!(value["metadata"]["status"], "completed");
        assert!(value["metadata"]["worker"].is_null());
    }

    #[test]
    fn test_jsonl_renderer_run_end() {
        let renderer = JsonlRendererPlugin::new(false);
        let event = RenderEvent::RunEnd {
            run_id: "run".to_string(),
            report: ExecutionReport {
                run_id: "run".to_string(),
                mode: ExecutionMode::Serial,
                layers: Vec::new(),
                fallback_used: false,
                tasks: Vec::new(),
                completed: 3,
                failed: 0,
                pending: 0,
                duration_ms: 100,
            },
        };

        let value = renderer.event_to_json(&event);
        assert_eq!(value["metadata"]["completed"], 3);
        assert_eq!(value["metadata"]["fallback_used"], false);
    }
}
