#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use taskweave_core::api::{
    ExecutionOpts, NewTask, Orchestrator, OutputRendererPlugin, RenderEvent, WorkerBackend,
    WorkerError, WorkerHandle, WorkerOutcome,
};
use taskweave_core::state::CheckpointStore;
use tokio::sync::Semaphore;

/// Scripted worker: per-task failure injection, latency, an optional gate
/// that holds every submission, and a concurrency high-water mark.
#[derive(Default)]
pub struct FakeWorker {
    fail_submit: HashSet<String>,
    fail_acquire: HashSet<String>,
    latency: Duration,
    gate: Option<Arc<Semaphore>>,
    holds: HashMap<String, Arc<Semaphore>>,
    active: AtomicUsize,
    peak: AtomicUsize,
    submitted: Mutex<Vec<String>>,
    instructions: Mutex<Vec<(String, String)>>,
}

impl FakeWorker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(mut self, task_id: &str) -> Self {
        self.fail_submit.insert(task_id.to_string());
        self
    }

    pub fn failing_acquire(mut self, task_id: &str) -> Self {
        self.fail_acquire.insert(task_id.to_string());
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Hold every submission until `release` is called
    pub fn gated(mut self) -> Self {
        self.gate = Some(Arc::new(Semaphore::new(0)));
        self
    }

    /// Hold submissions of one task until `release_task` is called for it
    pub fn holding(mut self, task_id: &str) -> Self {
        self.holds
            .insert(task_id.to_string(), Arc::new(Semaphore::new(0)));
        self
    }

    pub fn release_task(&self, task_id: &str) {
        if let Some(hold) = self.holds.get(task_id) {
            hold.add_permits(1024);
        }
    }

    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.add_permits(1024);
        }
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn in_flight(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Task ids in submission order
    pub fn submitted(&self) -> Vec<String> {
        self.submitted.lock().unwrap().clone()
    }

    pub fn instruction_for(&self, task_id: &str) -> Option<String> {
        self.instructions
            .lock()
            .unwrap()
            .iter()
            .find(|(id, _)| id == task_id)
            .map(|(_, text)| text.clone())
    }
}

fn task_of(handle: &WorkerHandle) -> String {
    handle
        .as_str()
        .strip_prefix("w-")
        .unwrap_or(handle.as_str())
        .to_string()
}

#[async_trait]
impl WorkerBackend for FakeWorker {
    fn name(&self) -> &str {
        "fake"
    }

    async fn acquire(&self, label: &str) -> Result<WorkerHandle, WorkerError> {
        if self.fail_acquire.contains(label) {
            return Err(WorkerError::Acquisition(format!("no worker for {label}")));
        }
        Ok(WorkerHandle::new(format!("w-{label}")))
    }

    async fn submit(
        &self,
        handle: &WorkerHandle,
        instruction: &str,
        _model_preference: Option<&str>,
    ) -> Result<WorkerOutcome, WorkerError> {
        let task_id = task_of(handle);
        self.submitted.lock().unwrap().push(task_id.clone());
        self.instructions
            .lock()
            .unwrap()
            .push((task_id.clone(), instruction.to_string()));

        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        if let Some(gate) = &self.gate {
            let _ = gate.acquire().await;
        }
        if let Some(hold) = self.holds.get(&task_id) {
            let _ = hold.acquire().await;
        }
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        self.active.fetch_sub(1, Ordering::SeqCst);

        if self.fail_submit.contains(&task_id) {
            Err(WorkerError::Execution(format!("{task_id} exited with status 1")))
        } else {
            Ok(WorkerOutcome::new(format!("done: {task_id}")))
        }
    }
}

/// Renderer that records event types in order
#[derive(Default)]
pub struct RecordingRenderer {
    events: Mutex<Vec<RenderEvent>>,
}

impl RecordingRenderer {
    pub fn event_types(&self) -> Vec<&'static str> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(RenderEvent::event_type)
            .collect()
    }
}

impl OutputRendererPlugin for RecordingRenderer {
    fn name(&self) -> &str {
        "recording"
    }

    fn format(&self) -> &str {
        "test"
    }

    fn render(&self, event: &RenderEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

pub fn orchestrator(worker: Arc<FakeWorker>, store: Arc<dyn CheckpointStore>) -> Orchestrator {
    Orchestrator::builder(worker)
        .checkpoint_store(store)
        .opts(ExecutionOpts::default())
        .build()
}

pub fn task(id: &str, content: &str, deps: &[&str]) -> NewTask {
    NewTask::new(content)
        .with_id(id)
        .with_dependencies(deps.iter().copied())
}

/// Wait until `task_id` has been handed to the worker
pub async fn wait_until_submitted(worker: &FakeWorker, task_id: &str) {
    for _ in 0..500 {
        if worker.submitted().iter().any(|id| id == task_id) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("{task_id} was never submitted");
}

/// Wait until the orchestrator reports a running pass with workers in flight
pub async fn wait_until_running(orch: &Orchestrator, workers: usize) {
    for _ in 0..500 {
        let status = orch.status();
        if status.is_running && status.active_workers.len() >= workers {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("orchestrator never reached a running state");
}
