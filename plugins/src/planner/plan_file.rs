use std::path::PathBuf;

use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use taskweave_core::api::{PlannedTask, Planner};

/// Accepted plan file shapes
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PlanDocument {
    List(Vec<PlannedTask>),
    Wrapped { tasks: Vec<PlannedTask> },
}

/// Reads a plan from a JSON file instead of asking a model.
///
/// The file holds either an array of tasks or `{"tasks": [...]}`; each task
/// has `content` and optional 1-based `dependencies`.
pub struct PlanFilePlanner {
    path: PathBuf,
}

impl PlanFilePlanner {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl Planner for PlanFilePlanner {
    fn name(&self) -> &str {
        "plan-file"
    }

    async fn plan(
        &self,
        goal: &str,
        _model_preference: Option<&str>,
    ) -> anyhow::Result<Vec<PlannedTask>> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("failed to read plan file {}", self.path.display()))?;
        let tasks = parse_plan(&raw)
            .with_context(|| format!("failed to parse plan file {}", self.path.display()))?;

        tracing::info!(
            path = %self.path.display(),
            tasks = tasks.len(),
            goal_len = goal.len(),
            "plan loaded"
        );
        Ok(tasks)
    }
}

fn parse_plan(raw: &str) -> anyhow::Result<Vec<PlannedTask>> {
    let tasks = match serde_json::from_str::<PlanDocument>(raw)? {
        PlanDocument::List(tasks) | PlanDocument::Wrapped { tasks } => tasks,
    };

    if let Some(pos) = tasks.iter().position(|t| t.content.trim().is_empty()) {
        anyhow::bail!("task {} has empty content", pos + 1);
    }
    if tasks.is_empty() {
        anyhow::bail!("plan contains no tasks");
    }
    Ok(tasks)
}
