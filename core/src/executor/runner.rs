use std::sync::{Arc, Mutex};
use std::time::Instant;

use crate::error::WorkerError;

use super::ledger::{Generation, RunLedger};
use super::output::RunEmitter;
use super::progress::ProgressMonitor;
use super::registry::WorkerRegistry;
use super::traits::{RenderEvent, WorkerBackend};
use super::types::{Task, TaskReport, TaskStatus};

/// Run-level context handed to every task of one pass
#[derive(Debug, Clone)]
pub struct RunScope {
    pub run_id: String,
    /// Ledger generation the pass was started under
    pub generation: Generation,
    pub goal: String,
    pub model_preference: Option<String>,
    /// Layer being executed, `None` in serial mode
    pub layer: Option<usize>,
}

impl RunScope {
    pub fn in_layer(&self, layer: usize) -> Self {
        Self {
            layer: Some(layer),
            ..self.clone()
        }
    }
}

/// Build the instruction a worker receives for one task.
///
/// Contains the task itself, the run goal as read-only context and the
/// task's position. Other tasks are never mentioned.
pub fn scoped_instruction(task: &Task, goal: &str, position: usize, total: usize) -> String {
    format!(
        "You are working on task {position} of {total}.\n\n\
         Overall goal (context only, do not work on it directly):\n{goal}\n\n\
         Your task:\n{content}\n\n\
         Complete only this task.",
        content = task.content.trim(),
        goal = goal.trim(),
    )
}

/// Executes single tasks against a worker backend
#[derive(Clone)]
pub struct TaskRunner {
    worker: Arc<dyn WorkerBackend>,
    registry: WorkerRegistry,
    ledger: RunLedger,
    emitter: RunEmitter,
    progress: Arc<Mutex<ProgressMonitor>>,
}

impl TaskRunner {
    pub fn new(
        worker: Arc<dyn WorkerBackend>,
        registry: WorkerRegistry,
        ledger: RunLedger,
        emitter: RunEmitter,
    ) -> Self {
        Self {
            worker,
            registry,
            ledger,
            emitter,
            progress: Arc::new(Mutex::new(ProgressMonitor::hidden())),
        }
    }

    pub fn with_progress(mut self, progress: Arc<Mutex<ProgressMonitor>>) -> Self {
        self.progress = progress;
        self
    }

    pub fn registry(&self) -> &WorkerRegistry {
        &self.registry
    }

    /// Run one task to a terminal status. Never fails; worker errors are
    /// recorded on the task.
    ///
    /// `position` is 1-based.
    #[tracing::instrument(name = "task.run", skip(self, task, scope), fields(task_id = %task.id()))]
    pub async fn run(&self, task: &mut Task, scope: &RunScope, position: usize, total: usize) {
        let start = Instant::now();

        let handle = match self.worker.acquire(task.id()).await {
            Ok(handle) => handle,
            Err(e) => {
                let message = if matches!(e, WorkerError::Acquisition(_)) {
                    e.to_string()
                } else {
                    format!("worker acquisition failed: {e}")
                };
                self.record_failure(task, message);
                self.ledger.publish(scope.generation, task);
                self.finish(task, scope, start);
                return;
            }
        };

        if let Err(e) = task.mark_in_progress(handle.clone()) {
            tracing::warn!(task_id = %task.id(), error = %e, "task not runnable, skipping");
            return;
        }

        let guard = self.registry.register(handle.clone(), &scope.run_id, task.id());
        self.ledger.publish(scope.generation, task);
        self.lock_progress().add_task(task.id(), handle.as_str());
        self.emitter.emit(RenderEvent::TaskStart {
            run_id: scope.run_id.clone(),
            task_id: task.id().to_string(),
            layer_id: scope.layer,
            worker_handle: handle.clone(),
        });

        let instruction = scoped_instruction(task, &scope.goal, position, total);
        let outcome = self
            .worker
            .submit(&handle, &instruction, scope.model_preference.as_deref())
            .await;

        let transition = match outcome {
            Ok(out) => {
                tracing::debug!(task_id = %task.id(), output_bytes = out.output.len(), "worker finished");
                task.mark_completed()
            }
            Err(e) => {
                let message = e.to_string();
                task.mark_failed(if message.trim().is_empty() {
                    "worker failed without a message".to_string()
                } else {
                    message
                })
            }
        };
        if let Err(e) = transition {
            tracing::warn!(task_id = %task.id(), error = %e, "unexpected status transition");
        }

        drop(guard);
        self.ledger.publish(scope.generation, task);
        self.finish(task, scope, start);
    }

    fn record_failure(&self, task: &mut Task, message: String) {
        tracing::warn!(task_id = %task.id(), error = %message, "task failed before start");
        if let Err(e) = task.mark_failed(message) {
            tracing::warn!(task_id = %task.id(), error = %e, "unexpected status transition");
        }
    }

    fn finish(&self, task: &Task, scope: &RunScope, start: Instant) {
        let duration_ms = start.elapsed().as_millis() as u64;
        self.lock_progress().complete_task(
            task.id(),
            task.status() == TaskStatus::Completed,
            duration_ms,
        );
        self.emitter.emit(RenderEvent::TaskComplete {
            run_id: scope.run_id.clone(),
            task: TaskReport::from(task),
            duration_ms,
        });
    }

    fn lock_progress(&self) -> std::sync::MutexGuard<'_, ProgressMonitor> {
        match self.progress.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
