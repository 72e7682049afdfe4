use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use chrono::Utc;

use crate::error::{OrchestratorError, Result};
use crate::planner::{tasks_from_plan, Planner};
use crate::state::{CheckpointStore, MemoryCheckpointStore, ObservedTodo, Snapshot};

use super::graph::{build_layers, Layering};
use super::inference::{strategy_for, DependencyInferenceStrategy};
use super::ledger::{Generation, RunLedger};
use super::output::RunEmitter;
use super::progress::ProgressMonitor;
use super::registry::{ActiveWorker, WorkerRegistry};
use super::runner::{RunScope, TaskRunner};
use super::scheduler::run_many;
use super::traits::{OutputRendererPlugin, RenderEvent, WorkerBackend};
use super::types::{
    CheckpointReport, ExecutionMode, ExecutionOpts, ExecutionReport, NewTask, Run, StatusReport,
    Task, TaskReport, TaskStatus, WorkerHandle,
};

/// Drives a run through its layers and owns all run state.
///
/// Every method takes `&self`; share the orchestrator behind an `Arc` to
/// query status while a pass is executing.
pub struct Orchestrator {
    worker: Arc<dyn WorkerBackend>,
    planner: Option<Arc<dyn Planner>>,
    inference: Arc<dyn DependencyInferenceStrategy>,
    store: Arc<dyn CheckpointStore>,
    emitter: RunEmitter,
    opts: ExecutionOpts,
    origin: Option<WorkerHandle>,
    ledger: RunLedger,
    registry: WorkerRegistry,
    observed_todos: Mutex<Vec<ObservedTodo>>,
}

pub struct OrchestratorBuilder {
    worker: Arc<dyn WorkerBackend>,
    planner: Option<Arc<dyn Planner>>,
    inference: Option<Arc<dyn DependencyInferenceStrategy>>,
    store: Option<Arc<dyn CheckpointStore>>,
    renderer: Option<Arc<dyn OutputRendererPlugin>>,
    opts: ExecutionOpts,
    origin: Option<WorkerHandle>,
}

/// Clears `is_running` when a pass ends, however it ends. A pass detached
/// by `stop` leaves any run installed after it alone.
struct RunningGuard {
    ledger: RunLedger,
    generation: Generation,
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.ledger.update(|run, current| {
            if let Some(run) = run.filter(|_| current == self.generation) {
                run.is_running = false;
            }
        });
    }
}

/// Work selected for one pass, captured under the ledger lock
struct PassPlan {
    run: Run,
    generation: Generation,
    pending: Vec<Task>,
    layering: Layering,
}

impl Orchestrator {
    pub fn builder(worker: Arc<dyn WorkerBackend>) -> OrchestratorBuilder {
        OrchestratorBuilder::new(worker)
    }

    pub fn opts(&self) -> &ExecutionOpts {
        &self.opts
    }

    /// Begin a new run for `goal`, replacing any idle run.
    ///
    /// With a planner configured the goal is planned into tasks first; a
    /// planning failure leaves the previous state untouched.
    #[tracing::instrument(name = "orchestrator.start", skip(self, goal))]
    pub async fn start(
        &self,
        goal: &str,
        model_preference: Option<String>,
    ) -> Result<StatusReport> {
        if let Some(run_id) = self.running_run_id() {
            return Err(OrchestratorError::AlreadyRunning(run_id));
        }

        let model_preference = match model_preference {
            Some(model) => Some(model),
            None => match &self.origin {
                Some(origin) => self.worker.describe(origin).await,
                None => None,
            },
        };

        let mut run = Run::new(goal, model_preference);

        if let Some(planner) = &self.planner {
            let plan = planner
                .plan(goal, run.model_preference.as_deref())
                .await
                .map_err(|e| OrchestratorError::Planning(format!("{e:#}")))?;
            let tasks = tasks_from_plan(&plan, &run, self.inference.as_ref());
            tracing::info!(planner = planner.name(), tasks = tasks.len(), "goal planned");
            run.tasks = tasks;
        }

        let run_id = run.run_id.clone();
        let replaced = self
            .ledger
            .install_idle(run)
            .map_err(OrchestratorError::AlreadyRunning)?;
        if let Some(previous) = replaced {
            tracing::info!(previous = %previous.run_id, "replacing idle run");
        }
        tracing::info!(run_id = %run_id, "run started");

        Ok(self.status())
    }

    /// Append tasks to the active run.
    ///
    /// Missing ids are numbered `task-N`. When no task in the batch carries
    /// dependencies, the inference strategy derives them from the batch.
    pub fn add_tasks(&self, batch: Vec<NewTask>) -> Result<StatusReport> {
        let explicit = batch.iter().any(NewTask::has_explicit_dependencies);
        let inference = self.inference.clone();

        let added = self.ledger.update(|run, _| {
            let run = run.ok_or(OrchestratorError::NoActiveRun)?;

            let mut reserved: Vec<String> = Vec::with_capacity(batch.len());
            let mut tasks: Vec<Task> = Vec::with_capacity(batch.len());
            for item in &batch {
                let id = match item.id.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
                    Some(id) => id.to_string(),
                    None => run.next_task_id(&reserved),
                };
                if run.contains(&id) || reserved.contains(&id) {
                    return Err(OrchestratorError::DuplicateTaskId(id));
                }
                reserved.push(id.clone());

                let mut task = Task::new(id, item.content.clone());
                if let Some(deps) = &item.dependencies {
                    task.set_dependencies(deps.iter().cloned());
                }
                tasks.push(task);
            }

            if !explicit {
                let inferred = inference.infer(&tasks);
                for task in &mut tasks {
                    if let Some(deps) = inferred.get(task.id()) {
                        task.set_dependencies(deps.clone());
                    }
                }
            }

            let count = tasks.len();
            run.tasks.extend(tasks);
            Ok(count)
        })?;

        tracing::debug!(added, explicit, "tasks added");
        Ok(self.status())
    }

    /// Replace the last observed todo list
    pub fn observe_todos(&self, todos: Vec<ObservedTodo>) {
        *self.lock_todos() = todos;
    }

    pub fn observed_todos(&self) -> Vec<ObservedTodo> {
        self.lock_todos().clone()
    }

    /// Execute every pending task of the active run.
    ///
    /// `None` uses the configured default mode. Completed and failed tasks
    /// are left alone, so calling this again continues where the last pass
    /// stopped.
    #[tracing::instrument(name = "orchestrator.execute", skip(self))]
    pub async fn execute(&self, mode: Option<ExecutionMode>) -> Result<ExecutionReport> {
        let mode = mode.unwrap_or(self.opts.default_mode);
        let start = Instant::now();

        let pass = self.begin_pass()?;
        let guard = RunningGuard {
            ledger: self.ledger.clone(),
            generation: pass.generation,
        };

        let PassPlan {
            run,
            generation,
            pending,
            layering,
        } = pass;
        let run_id = run.run_id.clone();
        let total = pending.len();

        let layers = match mode {
            ExecutionMode::Parallel => layering.layers.clone(),
            ExecutionMode::Serial => Vec::new(),
        };

        self.emitter.emit(RenderEvent::RunStart {
            run_id: run_id.clone(),
            goal: run.original_goal.clone(),
            mode,
            total_tasks: total,
            total_layers: layers.len(),
        });
        if mode == ExecutionMode::Parallel {
            self.emitter.emit(RenderEvent::Plan {
                run_id: run_id.clone(),
                layers: layers.clone(),
                fallback: layering.fallback,
            });
        }

        let progress = Arc::new(Mutex::new(ProgressMonitor::new(
            total,
            self.opts.progress_bar,
        )));
        let runner = TaskRunner::new(
            self.worker.clone(),
            self.registry.clone(),
            self.ledger.clone(),
            self.emitter.clone(),
        )
        .with_progress(progress.clone());

        let scope = RunScope {
            run_id: run_id.clone(),
            generation,
            goal: run.original_goal.clone(),
            model_preference: run.model_preference.clone(),
            layer: None,
        };

        let mut local = run;
        match mode {
            ExecutionMode::Parallel => {
                self.execute_layers(&runner, &scope, &mut local, pending, &layers, &progress)
                    .await
            }
            ExecutionMode::Serial => {
                self.execute_serial(&runner, &scope, &mut local, pending)
                    .await
            }
        }

        // Prefer the ledger copy; it also holds tasks added during the pass
        let final_run = self.ledger.attached_run(generation).unwrap_or(local);

        let counts = final_run.counts();
        let report = ExecutionReport {
            run_id: run_id.clone(),
            mode,
            layers,
            fallback_used: mode == ExecutionMode::Parallel && layering.fallback,
            tasks: final_run.tasks.iter().map(TaskReport::from).collect(),
            completed: counts.completed,
            failed: counts.failed,
            pending: counts.pending,
            duration_ms: start.elapsed().as_millis() as u64,
        };

        if let Ok(monitor) = progress.lock() {
            monitor.finish(report.failed == 0);
        }
        self.emitter.emit(RenderEvent::RunEnd {
            run_id: run_id.clone(),
            report: report.clone(),
        });

        drop(guard);

        if self.opts.auto_save && self.ledger.is_current(generation) {
            if let Err(e) = self.save_checkpoint().await {
                tracing::warn!(run_id = %run_id, error = %e, "auto-save after execute failed");
            }
        }

        Ok(report)
    }

    /// Check preconditions, import todos into an empty run and mark the run
    /// as running. Nothing is mutated when a precondition fails.
    fn begin_pass(&self) -> Result<PassPlan> {
        let todos = self.observed_todos();
        let inference = self.inference.clone();

        self.ledger.update(|run, generation| {
            let run = run.ok_or(OrchestratorError::NoActiveRun)?;
            if run.is_running {
                return Err(OrchestratorError::AlreadyRunning(run.run_id.clone()));
            }

            if run.tasks.is_empty() {
                let imported = tasks_from_todos(run, &todos, inference.as_ref());
                if imported.is_empty() {
                    return Err(OrchestratorError::NoTasks);
                }
                tracing::info!(
                    run_id = %run.run_id,
                    imported = imported.len(),
                    "run had no tasks, imported open todos"
                );
                run.tasks = imported;
            }

            let pending = run.pending_tasks();
            let settled: HashSet<String> = run
                .tasks
                .iter()
                .filter(|t| t.status().is_terminal())
                .map(|t| t.id().to_string())
                .collect();
            let layering = build_layers(&pending, &settled)?;

            run.is_running = true;
            Ok(PassPlan {
                run: run.clone(),
                generation,
                pending,
                layering,
            })
        })
    }

    async fn execute_layers(
        &self,
        runner: &TaskRunner,
        scope: &RunScope,
        local: &mut Run,
        pending: Vec<Task>,
        layers: &[Vec<String>],
        progress: &Arc<Mutex<ProgressMonitor>>,
    ) {
        let total = pending.len();
        let mut by_id: HashMap<String, Task> = pending
            .into_iter()
            .map(|t| (t.id().to_string(), t))
            .collect();
        let mut dispatched = 0usize;

        for (layer_id, task_ids) in layers.iter().enumerate() {
            if !self.ledger.is_current(scope.generation) {
                tracing::warn!(run_id = %scope.run_id, layer = layer_id, "run detached, not starting further layers");
                break;
            }

            self.emitter.emit(RenderEvent::LayerStart {
                run_id: scope.run_id.clone(),
                layer_id,
                task_ids: task_ids.clone(),
            });
            if let Ok(mut monitor) = progress.lock() {
                monitor.update_layer(layer_id, layers.len());
            }

            let batch: Vec<Task> = task_ids.iter().filter_map(|id| by_id.remove(id)).collect();
            let size = batch.len();
            let done = run_many(
                runner,
                batch,
                &scope.in_layer(layer_id),
                dispatched,
                total,
                self.opts.max_parallel,
            )
            .await;
            dispatched += size;

            fold_into(local, done);

            self.emitter.emit(RenderEvent::LayerEnd {
                run_id: scope.run_id.clone(),
                layer_id,
            });
        }
    }

    async fn execute_serial(
        &self,
        runner: &TaskRunner,
        scope: &RunScope,
        local: &mut Run,
        pending: Vec<Task>,
    ) {
        let total = pending.len();
        for (index, mut task) in pending.into_iter().enumerate() {
            if !self.ledger.is_current(scope.generation) {
                tracing::warn!(run_id = %scope.run_id, "run detached, not starting further tasks");
                break;
            }
            runner.run(&mut task, scope, index + 1, total).await;
            fold_into(local, vec![task]);
        }
    }

    /// Report on the active run and the workers in flight
    pub fn status(&self) -> StatusReport {
        let workers = self.registry.list();
        self.ledger
            .read(|run| StatusReport::from_run(run, workers))
    }

    pub fn active_workers(&self) -> Vec<ActiveWorker> {
        self.registry.list()
    }

    /// Layers the pending tasks would run in, without executing anything
    pub fn preview_layers(&self) -> Result<Layering> {
        self.ledger.read(|run| {
            let run = run.ok_or(OrchestratorError::NoActiveRun)?;
            let settled: HashSet<String> = run
                .tasks
                .iter()
                .filter(|t| t.status().is_terminal())
                .map(|t| t.id().to_string())
                .collect();
            build_layers(&run.pending_tasks(), &settled)
        })
    }

    /// Persist the active run and observed todos to the checkpoint store.
    ///
    /// With no active run an empty snapshot is written.
    pub async fn save_checkpoint(&self) -> Result<CheckpointReport> {
        let run = self.ledger.snapshot_run();
        let snapshot = Snapshot::capture(run.as_ref(), &self.observed_todos());
        let json = snapshot.to_json()?;

        self.store
            .write(json.as_bytes())
            .await
            .map_err(|e| OrchestratorError::Persistence(format!("{e:#}")))?;

        tracing::info!(
            run_id = ?snapshot.run.as_ref().map(|r| r.run_id.as_str()),
            completed = snapshot.completed_count,
            location = %self.store.location(),
            "checkpoint saved"
        );

        Ok(CheckpointReport {
            run_id: snapshot.run.as_ref().map(|r| r.run_id.clone()),
            saved_at: snapshot.saved_at,
            completed_count: snapshot.completed_count,
            total_tasks: snapshot.total_tasks(),
            location: self.store.location(),
        })
    }

    /// Install the checkpointed run as the active run. Call `execute` to
    /// continue its pending tasks.
    pub async fn resume_checkpoint(&self) -> Result<StatusReport> {
        if let Some(run_id) = self.running_run_id() {
            return Err(OrchestratorError::AlreadyRunning(run_id));
        }

        let bytes = self
            .store
            .read()
            .await
            .map_err(|e| OrchestratorError::Persistence(format!("{e:#}")))?
            .ok_or(OrchestratorError::NoActiveRun)?;
        let snapshot = Snapshot::from_bytes(&bytes)?;
        let run = snapshot.restore().ok_or(OrchestratorError::NoActiveRun)?;

        let in_progress = run
            .tasks
            .iter()
            .filter(|t| t.status() == TaskStatus::InProgress)
            .count();
        if in_progress > 0 {
            tracing::warn!(
                run_id = %run.run_id,
                in_progress,
                "checkpoint has tasks that were in progress at save time; they are kept as-is"
            );
        }

        let run_id = run.run_id.clone();
        self.ledger
            .install_idle(run)
            .map_err(OrchestratorError::AlreadyRunning)?;
        *self.lock_todos() = snapshot.observed_todos;

        tracing::info!(
            run_id = %run_id,
            saved_at = %snapshot.saved_at,
            age_secs = (Utc::now() - snapshot.saved_at).num_seconds(),
            "run resumed from checkpoint"
        );
        Ok(self.status())
    }

    /// Save a checkpoint and drop the active run.
    ///
    /// Workers already in flight keep running; their results are ignored.
    pub async fn stop(&self) -> Result<CheckpointReport> {
        if self.ledger.current_run_id().is_none() {
            return Err(OrchestratorError::NoActiveRun);
        }
        let report = self.save_checkpoint().await?;
        if let Some(run) = self.abandon() {
            tracing::info!(run_id = %run.run_id, in_flight = self.registry.len(), "run stopped");
        }
        Ok(report)
    }

    /// Drop the active run without saving
    pub fn abandon(&self) -> Option<Run> {
        self.ledger.take()
    }

    fn running_run_id(&self) -> Option<String> {
        self.ledger
            .read(|run| run.filter(|r| r.is_running).map(|r| r.run_id.clone()))
    }

    fn lock_todos(&self) -> std::sync::MutexGuard<'_, Vec<ObservedTodo>> {
        match self.observed_todos.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl OrchestratorBuilder {
    pub fn new(worker: Arc<dyn WorkerBackend>) -> Self {
        Self {
            worker,
            planner: None,
            inference: None,
            store: None,
            renderer: None,
            opts: ExecutionOpts::default(),
            origin: None,
        }
    }

    pub fn planner(mut self, planner: Arc<dyn Planner>) -> Self {
        self.planner = Some(planner);
        self
    }

    pub fn inference(mut self, inference: Arc<dyn DependencyInferenceStrategy>) -> Self {
        self.inference = Some(inference);
        self
    }

    pub fn checkpoint_store(mut self, store: Arc<dyn CheckpointStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn renderer(mut self, renderer: Arc<dyn OutputRendererPlugin>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    pub fn opts(mut self, opts: ExecutionOpts) -> Self {
        self.opts = opts;
        self
    }

    /// Worker session whose model preference seeds new runs
    pub fn origin(mut self, origin: WorkerHandle) -> Self {
        self.origin = Some(origin);
        self
    }

    pub fn build(self) -> Orchestrator {
        let inference = self
            .inference
            .unwrap_or_else(|| Arc::from(strategy_for(self.opts.inference)));
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryCheckpointStore::new()));

        Orchestrator {
            worker: self.worker,
            planner: self.planner,
            inference,
            store,
            emitter: RunEmitter::new(self.renderer),
            opts: self.opts,
            origin: self.origin,
            ledger: RunLedger::new(),
            registry: WorkerRegistry::new(),
            observed_todos: Mutex::new(Vec::new()),
        }
    }
}

/// Turn open todos into pending tasks for an empty run
fn tasks_from_todos(
    run: &Run,
    todos: &[ObservedTodo],
    inference: &dyn DependencyInferenceStrategy,
) -> Vec<Task> {
    let mut reserved: Vec<String> = Vec::new();
    let mut tasks: Vec<Task> = Vec::new();
    for todo in todos
        .iter()
        .filter(|t| t.status.is_open() && !t.content.trim().is_empty())
    {
        let id = run.next_task_id(&reserved);
        reserved.push(id.clone());
        tasks.push(Task::new(id, todo.content.trim()));
    }

    let inferred = inference.infer(&tasks);
    for task in &mut tasks {
        if let Some(deps) = inferred.get(task.id()) {
            task.set_dependencies(deps.clone());
        }
    }
    tasks
}

fn fold_into(run: &mut Run, done: Vec<Task>) {
    for task in done {
        if let Some(slot) = run.task_mut(task.id()) {
            *slot = task;
        }
    }
}
