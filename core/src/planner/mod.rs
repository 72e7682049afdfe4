//! Planning collaborator: turns a goal into a draft task list.

use std::collections::HashSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::executor::inference::DependencyInferenceStrategy;
use crate::executor::types::{Run, Task};

/// Dependency reference inside a plan: a 1-based plan position, or free text
/// such as `"none"` that carries no edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DependencyRef {
    Index(usize),
    Text(String),
}

impl DependencyRef {
    /// 1-based plan position, if this reference names one
    pub fn index(&self) -> Option<usize> {
        match self {
            DependencyRef::Index(n) => Some(*n),
            DependencyRef::Text(s) => s.trim().trim_start_matches('#').parse().ok(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedTask {
    pub content: String,
    #[serde(default, alias = "dependency_refs", alias = "depends_on")]
    pub dependencies: Vec<DependencyRef>,
    #[serde(default)]
    pub outputs: Option<String>,
}

impl PlannedTask {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            dependencies: Vec::new(),
            outputs: None,
        }
    }

    pub fn with_refs(mut self, refs: impl IntoIterator<Item = usize>) -> Self {
        self.dependencies = refs.into_iter().map(DependencyRef::Index).collect();
        self
    }
}

#[async_trait]
pub trait Planner: Send + Sync {
    fn name(&self) -> &str;

    async fn plan(
        &self,
        goal: &str,
        model_preference: Option<&str>,
    ) -> anyhow::Result<Vec<PlannedTask>>;
}

/// Translate a plan into tasks appended after the existing tasks of `run`.
///
/// Plan positions map to the generated ids; out-of-range and self
/// references are dropped. When no planned task carries a usable reference
/// the inference strategy decides the edges instead.
pub fn tasks_from_plan(
    plan: &[PlannedTask],
    run: &Run,
    inference: &dyn DependencyInferenceStrategy,
) -> Vec<Task> {
    let mut ids: Vec<String> = Vec::with_capacity(plan.len());
    for _ in plan {
        let id = run.next_task_id(&ids);
        ids.push(id);
    }

    let mut usable = false;
    let mut tasks: Vec<Task> = Vec::with_capacity(plan.len());
    for (pos, planned) in plan.iter().enumerate() {
        let mut seen = HashSet::new();
        let deps: Vec<String> = planned
            .dependencies
            .iter()
            .filter_map(DependencyRef::index)
            .filter(|n| *n >= 1 && *n <= plan.len() && *n != pos + 1)
            .filter(|n| seen.insert(*n))
            .map(|n| ids[n - 1].clone())
            .collect();
        usable |= !deps.is_empty();
        tasks.push(Task::new(ids[pos].clone(), planned.content.clone()).with_dependencies(deps));
    }

    if !usable {
        let inferred = inference.infer(&tasks);
        tracing::debug!(strategy = inference.name(), "plan has no usable dependency refs, inferring");
        for task in &mut tasks {
            if let Some(deps) = inferred.get(task.id()) {
                task.set_dependencies(deps.clone());
            }
        }
    }

    tasks
}
