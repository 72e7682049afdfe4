//! Dependency layering of pending tasks

use std::collections::{HashMap, HashSet};

use crate::error::OrchestratorError;
use crate::executor::types::TaskLike;

/// Ordered parallel layers for a task set
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Layering {
    /// Layers in execution order; ids within a layer keep input order
    pub layers: Vec<Vec<String>>,

    /// True when progress stalled and the remaining tasks were merged
    /// into one final layer
    pub fallback: bool,
}

impl Layering {
    pub fn task_count(&self) -> usize {
        self.layers.iter().map(Vec::len).sum()
    }
}

/// Task dependency graph
#[derive(Debug, Clone)]
pub struct TaskGraph<T: TaskLike> {
    /// Task nodes: task_id -> Task
    pub nodes: HashMap<String, T>,

    /// Dependency edges: task_id -> list of dependencies
    pub edges: HashMap<String, Vec<String>>,

    /// Original insertion order (for stable layers)
    insertion_order: Vec<String>,
}

impl<T: TaskLike> TaskGraph<T> {
    /// Construct task graph from task list
    pub fn from_tasks(tasks: &[T]) -> Result<Self, OrchestratorError> {
        let mut nodes = HashMap::new();
        let mut edges = HashMap::new();
        let mut insertion_order = Vec::new();

        for task in tasks {
            if nodes.contains_key(task.id()) {
                return Err(OrchestratorError::DuplicateTaskId(task.id().to_string()));
            }

            let task_id = task.id().to_string();
            nodes.insert(task_id.clone(), task.clone());
            edges.insert(task_id.clone(), task.dependencies().to_vec());
            insertion_order.push(task_id);
        }

        Ok(Self {
            nodes,
            edges,
            insertion_order,
        })
    }

    pub fn len(&self) -> usize {
        self.insertion_order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.insertion_order.is_empty()
    }

    /// Layer the graph from scratch.
    pub fn layers(&self) -> Layering {
        self.layers_from(&HashSet::new())
    }

    /// Layer the graph treating `settled` ids as already finished.
    ///
    /// # Algorithm
    ///
    /// 1. Every remaining task whose dependencies are all settled forms the next layer
    /// 2. Its ids become settled
    /// 3. If nothing is ready but tasks remain, all remaining tasks form one fallback layer
    /// 4. At most `len + 1` rounds
    ///
    /// Dependencies on ids outside the graph and outside `settled` can never
    /// be satisfied and end up in the fallback layer.
    pub fn layers_from(&self, settled: &HashSet<String>) -> Layering {
        let mut completed: HashSet<&str> = settled.iter().map(String::as_str).collect();
        let mut remaining: Vec<&str> = self.insertion_order.iter().map(String::as_str).collect();
        let mut layering = Layering::default();

        let max_rounds = self.insertion_order.len() + 1;
        for _ in 0..max_rounds {
            if remaining.is_empty() {
                break;
            }

            let mut layer: Vec<&str> = remaining
                .iter()
                .copied()
                .filter(|id| {
                    self.edges
                        .get(*id)
                        .map(|deps| deps.iter().all(|d| completed.contains(d.as_str())))
                        .unwrap_or(true)
                })
                .collect();

            if layer.is_empty() {
                match self.detect_cycle() {
                    Some(cycle) => tracing::warn!(
                        cycle = %cycle,
                        remaining = remaining.len(),
                        "circular dependency, running remaining tasks as one fallback layer"
                    ),
                    None => tracing::warn!(
                        remaining = remaining.len(),
                        "unresolvable dependencies, running remaining tasks as one fallback layer"
                    ),
                }
                layer = std::mem::take(&mut remaining);
                layering.fallback = true;
            } else {
                remaining.retain(|id| !layer.contains(id));
            }

            completed.extend(layer.iter().copied());
            layering
                .layers
                .push(layer.into_iter().map(str::to_string).collect());
        }

        layering
    }

    /// Detect circular dependencies using DFS, visiting roots in insertion order
    ///
    /// # Time Complexity
    ///
    /// O(V + E) where V = number of tasks, E = number of dependencies
    pub fn detect_cycle(&self) -> Option<String> {
        let mut visited = HashSet::new();
        let mut stack = Vec::new();

        for task_id in &self.insertion_order {
            if !visited.contains(task_id) && self.dfs_cycle(task_id, &mut visited, &mut stack) {
                return Some(format_cycle_path(&stack));
            }
        }

        None
    }

    fn dfs_cycle(
        &self,
        node: &str,
        visited: &mut HashSet<String>,
        stack: &mut Vec<String>,
    ) -> bool {
        visited.insert(node.to_string());
        stack.push(node.to_string());

        if let Some(dependencies) = self.edges.get(node) {
            for dep in dependencies {
                // Check if dependency is in current path (cycle detected)
                if let Some(pos) = stack.iter().position(|x| x == dep) {
                    stack.push(dep.clone());
                    *stack = stack[pos..].to_vec();
                    return true;
                }

                if self.nodes.contains_key(dep)
                    && !visited.contains(dep)
                    && self.dfs_cycle(dep, visited, stack)
                {
                    return true;
                }
            }
        }

        stack.pop();
        false
    }
}

fn format_cycle_path(stack: &[String]) -> String {
    stack.join(" -> ")
}

/// Layer a task slice, rejecting duplicate ids.
pub fn build_layers<T: TaskLike>(
    tasks: &[T],
    settled: &HashSet<String>,
) -> Result<Layering, OrchestratorError> {
    Ok(TaskGraph::from_tasks(tasks)?.layers_from(settled))
}
