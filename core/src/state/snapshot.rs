//! Run snapshots for checkpoint and resume

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::OrchestratorError;
use crate::executor::types::{Run, TaskStatus};

use super::types::ObservedTodo;

pub const SNAPSHOT_VERSION: &str = "1.0.0";

/// Durable projection of the orchestrator state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Snapshot format version
    pub version: String,
    /// Active run, `None` when there is nothing to resume
    pub run: Option<Run>,
    /// Last observed todo list
    #[serde(default)]
    pub observed_todos: Vec<ObservedTodo>,
    pub saved_at: DateTime<Utc>,
    /// Completed tasks at save time
    #[serde(default)]
    pub completed_count: usize,
}

impl Snapshot {
    pub fn capture(run: Option<&Run>, observed_todos: &[ObservedTodo]) -> Self {
        let completed_count = run
            .map(|r| {
                r.tasks
                    .iter()
                    .filter(|t| t.status() == TaskStatus::Completed)
                    .count()
            })
            .unwrap_or(0);

        Self {
            version: SNAPSHOT_VERSION.to_string(),
            run: run.cloned(),
            observed_todos: observed_todos.to_vec(),
            saved_at: Utc::now(),
            completed_count,
        }
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> Result<String, OrchestratorError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| OrchestratorError::Persistence(format!("failed to serialize snapshot: {e}")))
    }

    pub fn from_json(json: &str) -> Result<Self, OrchestratorError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, OrchestratorError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// The embedded run, unchanged. A restored run is never marked running.
    pub fn restore(&self) -> Option<Run> {
        self.run.clone().map(|mut run| {
            run.is_running = false;
            run
        })
    }

    pub fn total_tasks(&self) -> usize {
        self.run.as_ref().map(|r| r.tasks.len()).unwrap_or(0)
    }
}

/// Capture a snapshot of `run` and the observed todos
pub fn snapshot(run: Option<&Run>, observed_todos: &[ObservedTodo]) -> Snapshot {
    Snapshot::capture(run, observed_todos)
}

/// Recover the run embedded in `snapshot`
pub fn restore(snapshot: &Snapshot) -> Option<Run> {
    snapshot.restore()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::types::{Task, WorkerHandle};
    use crate::state::types::TodoStatus;
    use pretty_assertions::assert_eq;

    fn mixed_run() -> Run {
        let mut run = Run::new("migrate the billing service", Some("large".into()));

        let mut done = Task::new("task-1", "create the schema");
        done.mark_in_progress(WorkerHandle::new("w-1")).unwrap();
        done.mark_completed().unwrap();

        let mut failed = Task::new("task-2", "use the schema").with_dependencies(["task-1"]);
        failed.mark_in_progress(WorkerHandle::new("w-2")).unwrap();
        failed.mark_failed("exit status 2").unwrap();

        let pending = Task::new("task-3", "update the docs").with_dependencies(["task-2"]);

        run.tasks = vec![done, failed, pending];
        run
    }

    #[test]
    fn test_round_trip_preserves_every_task_field() {
        let run = mixed_run();
        let todos = vec![ObservedTodo::new("follow up", TodoStatus::Pending)];

        let snap = snapshot(Some(&run), &todos);
        assert_eq!(snap.completed_count, 1);

        let json = snap.to_json().unwrap();
        let back = Snapshot::from_json(&json).unwrap();
        let restored = restore(&back).unwrap();

        assert_eq!(restored, run);
        assert_eq!(back.observed_todos, todos);
        assert_eq!(restored.task("task-2").unwrap().error.as_deref(), Some("exit status 2"));
    }

    #[test]
    fn test_running_run_restores_idle() {
        let mut run = mixed_run();
        run.is_running = true;
        let snap = Snapshot::capture(Some(&run), &[]);
        assert!(!restore(&snap).unwrap().is_running);

        let back = Snapshot::from_json(&snap.to_json().unwrap()).unwrap();
        assert!(!back.restore().unwrap().is_running);
    }

    #[test]
    fn test_empty_snapshot_is_valid() {
        let snap = Snapshot::capture(None, &[]);
        let back = Snapshot::from_bytes(snap.to_json().unwrap().as_bytes()).unwrap();
        assert!(back.restore().is_none());
        assert_eq!(back.total_tasks(), 0);
    }

    #[test]
    fn test_garbage_is_invalid_snapshot() {
        let err = Snapshot::from_json("{not json").unwrap_err();
        assert!(matches!(err, OrchestratorError::InvalidSnapshot(_)));
    }
}
