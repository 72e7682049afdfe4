use std::fmt;

use serde::{Deserialize, Serialize};

use crate::state::{StateTransition, TransitionError};

/// Opaque reference to the worker that executes a task.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkerHandle(String);

impl WorkerHandle {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle of a single task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }

    pub fn can_transition_to(self, to: TaskStatus) -> bool {
        StateTransition::validate(self, to).is_ok()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A unit of work inside a run.
///
/// The id is fixed at construction. Status only moves forward through
/// [`Task::transition_to`] and the `mark_*` helpers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    id: String,
    pub content: String,
    #[serde(default)]
    status: TaskStatus,
    #[serde(default)]
    dependencies: Vec<String>,
    #[serde(default)]
    pub worker_handle: Option<WorkerHandle>,
    #[serde(default)]
    pub error: Option<String>,
}

impl Task {
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            status: TaskStatus::Pending,
            dependencies: Vec::new(),
            worker_handle: None,
            error: None,
        }
    }

    pub fn with_dependencies<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set_dependencies(dependencies);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    /// Replace the dependency set. Self references and duplicates are dropped,
    /// first occurrence order is kept.
    pub fn set_dependencies<I, S>(&mut self, dependencies: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut deps: Vec<String> = Vec::new();
        for dep in dependencies {
            let dep = dep.into();
            if dep == self.id || deps.contains(&dep) {
                continue;
            }
            deps.push(dep);
        }
        self.dependencies = deps;
    }

    pub fn transition_to(&mut self, to: TaskStatus) -> Result<(), TransitionError> {
        StateTransition::validate(self.status, to)?;
        self.status = to;
        Ok(())
    }

    /// Pending -> InProgress, recording the worker that picked the task up.
    pub fn mark_in_progress(&mut self, handle: WorkerHandle) -> Result<(), TransitionError> {
        self.transition_to(TaskStatus::InProgress)?;
        self.worker_handle = Some(handle);
        Ok(())
    }

    pub fn mark_completed(&mut self) -> Result<(), TransitionError> {
        self.transition_to(TaskStatus::Completed)?;
        self.error = None;
        Ok(())
    }

    pub fn mark_failed(&mut self, error: impl Into<String>) -> Result<(), TransitionError> {
        self.transition_to(TaskStatus::Failed)?;
        self.error = Some(error.into());
        Ok(())
    }
}

/// Common task interface for executor graph handling.
pub trait TaskLike: Clone + Send + Sync {
    fn id(&self) -> &str;
    fn dependencies(&self) -> &[String];
}

impl TaskLike for Task {
    fn id(&self) -> &str {
        &self.id
    }

    fn dependencies(&self) -> &[String] {
        &self.dependencies
    }
}

/// A task submitted through `add_tasks`. Missing ids are numbered by position.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTask {
    #[serde(default)]
    pub id: Option<String>,
    pub content: String,
    #[serde(default)]
    pub dependencies: Option<Vec<String>>,
}

impl NewTask {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            id: None,
            content: content.into(),
            dependencies: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_dependencies<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = Some(dependencies.into_iter().map(Into::into).collect());
        self
    }

    pub(crate) fn has_explicit_dependencies(&self) -> bool {
        self.dependencies
            .as_ref()
            .map(|deps| !deps.is_empty())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dependencies_drop_self_and_duplicates() {
        let task = Task::new("b", "use the schema").with_dependencies(["a", "b", "a", "c"]);
        assert_eq!(task.dependencies(), &["a".to_string(), "c".to_string()]);
    }

    #[test]
    fn test_lifecycle_happy_path() {
        let mut task = Task::new("1", "build it");
        task.mark_in_progress(WorkerHandle::new("w-1")).unwrap();
        assert_eq!(task.status(), TaskStatus::InProgress);
        task.mark_completed().unwrap();
        assert_eq!(task.status(), TaskStatus::Completed);
        assert_eq!(task.worker_handle, Some(WorkerHandle::new("w-1")));
    }

    #[test]
    fn test_status_never_moves_backward() {
        let mut task = Task::new("1", "build it");
        task.mark_failed("worker acquisition failed: offline").unwrap();
        assert!(task.transition_to(TaskStatus::Pending).is_err());
        assert!(task.mark_in_progress(WorkerHandle::new("w")).is_err());
        assert_eq!(task.status(), TaskStatus::Failed);
        assert!(task.worker_handle.is_none());
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&TaskStatus::InProgress).unwrap();
        assert_eq!(json, "\"in_progress\"");
    }
}
