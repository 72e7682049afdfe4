use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::executor::registry::ActiveWorker;

use super::run::{ExecutionMode, Run, TaskCounts};
use super::task::{Task, TaskStatus, WorkerHandle};

/// Final state of one task as reported to callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskReport {
    /// Task identifier
    pub task_id: String,

    pub status: TaskStatus,

    pub dependencies: Vec<String>,

    /// Worker that ran the task, kept after the worker finished
    pub worker_handle: Option<WorkerHandle>,

    /// Error message (Failed only)
    pub error: Option<String>,
}

impl From<&Task> for TaskReport {
    fn from(task: &Task) -> Self {
        Self {
            task_id: task.id().to_string(),
            status: task.status(),
            dependencies: task.dependencies().to_vec(),
            worker_handle: task.worker_handle.clone(),
            error: task.error.clone(),
        }
    }
}

/// Result of one `execute` pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub run_id: String,

    pub mode: ExecutionMode,

    /// Layers that were executed, empty in serial mode
    pub layers: Vec<Vec<String>>,

    /// True when unresolved dependencies forced a fallback layer
    pub fallback_used: bool,

    /// Every task of the run, in run order
    pub tasks: Vec<TaskReport>,

    pub completed: usize,

    pub failed: usize,

    /// Tasks still pending (added mid-pass, or left behind by a detached run)
    pub pending: usize,

    /// Total execution duration in milliseconds
    pub duration_ms: u64,
}

impl ExecutionReport {
    pub fn is_success(&self) -> bool {
        self.failed == 0 && self.pending == 0
    }
}

/// Snapshot of the orchestrator for `status()`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusReport {
    pub run_id: Option<String>,
    pub goal: Option<String>,
    pub model_preference: Option<String>,
    pub is_running: bool,
    pub counts: TaskCounts,
    pub tasks: Vec<TaskReport>,
    pub active_workers: Vec<ActiveWorker>,
}

impl StatusReport {
    pub fn from_run(run: Option<&Run>, active_workers: Vec<ActiveWorker>) -> Self {
        match run {
            Some(run) => Self {
                run_id: Some(run.run_id.clone()),
                goal: Some(run.original_goal.clone()),
                model_preference: run.model_preference.clone(),
                is_running: run.is_running,
                counts: run.counts(),
                tasks: run.tasks.iter().map(TaskReport::from).collect(),
                active_workers,
            },
            None => Self {
                active_workers,
                ..Default::default()
            },
        }
    }

    pub fn has_run(&self) -> bool {
        self.run_id.is_some()
    }
}

/// Outcome of `save_checkpoint` / `stop`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointReport {
    pub run_id: Option<String>,
    pub saved_at: DateTime<Utc>,
    pub completed_count: usize,
    pub total_tasks: usize,
    pub location: String,
}
