use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::task::{Task, TaskStatus};

/// How `execute` walks the pending tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Layer by layer, tasks inside a layer run concurrently.
    #[default]
    Parallel,
    /// One task at a time in run order.
    Serial,
}

impl ExecutionMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ExecutionMode::Parallel => "parallel",
            ExecutionMode::Serial => "serial",
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExecutionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "parallel" | "layered" => Ok(ExecutionMode::Parallel),
            "serial" | "sequential" => Ok(ExecutionMode::Serial),
            other => Err(format!("unknown execution mode: {other}")),
        }
    }
}

/// One execution of a task set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub run_id: String,
    pub original_goal: String,
    #[serde(default)]
    pub tasks: Vec<Task>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub model_preference: Option<String>,
    /// Process-local re-entrancy flag, never persisted.
    #[serde(skip)]
    pub is_running: bool,
}

impl Run {
    pub fn new(goal: impl Into<String>, model_preference: Option<String>) -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            original_goal: goal.into(),
            tasks: Vec::new(),
            created_at: Utc::now(),
            model_preference,
            is_running: false,
        }
    }

    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id() == id)
    }

    pub fn task_mut(&mut self, id: &str) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| t.id() == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.task(id).is_some()
    }

    pub fn pending_tasks(&self) -> Vec<Task> {
        self.tasks
            .iter()
            .filter(|t| t.status() == TaskStatus::Pending)
            .cloned()
            .collect()
    }

    /// Default id for the next appended task. `reserved` holds ids already
    /// handed out to the batch being built.
    pub fn next_task_id(&self, reserved: &[String]) -> String {
        let mut n = self.tasks.len() + reserved.len() + 1;
        loop {
            let candidate = format!("task-{n}");
            if !self.contains(&candidate) && !reserved.contains(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }

    pub fn counts(&self) -> TaskCounts {
        TaskCounts::from_tasks(&self.tasks)
    }
}

/// Status counts, always derived from the task list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskCounts {
    pub total: usize,
    pub pending: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub failed: usize,
}

impl TaskCounts {
    pub fn from_tasks(tasks: &[Task]) -> Self {
        let mut counts = TaskCounts {
            total: tasks.len(),
            ..Default::default()
        };
        for task in tasks {
            match task.status() {
                TaskStatus::Pending => counts.pending += 1,
                TaskStatus::InProgress => counts.in_progress += 1,
                TaskStatus::Completed => counts.completed += 1,
                TaskStatus::Failed => counts.failed += 1,
            }
        }
        counts
    }
}
