use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::types::WorkerHandle;

/// A worker currently executing a task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveWorker {
    pub handle: WorkerHandle,
    pub run_id: String,
    pub task_id: String,
    pub started_at: DateTime<Utc>,
}

/// Workers in flight, keyed by handle. Observability only.
#[derive(Debug, Clone, Default)]
pub struct WorkerRegistry {
    inner: Arc<Mutex<HashMap<WorkerHandle, ActiveWorker>>>,
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a worker. The entry lives until the returned guard is dropped.
    pub fn register(
        &self,
        handle: WorkerHandle,
        run_id: &str,
        task_id: &str,
    ) -> RegistrationGuard {
        let entry = ActiveWorker {
            handle: handle.clone(),
            run_id: run_id.to_string(),
            task_id: task_id.to_string(),
            started_at: Utc::now(),
        };
        self.lock().insert(handle.clone(), entry);
        RegistrationGuard {
            registry: self.clone(),
            handle,
        }
    }

    /// Active workers, oldest first
    pub fn list(&self) -> Vec<ActiveWorker> {
        let mut workers: Vec<ActiveWorker> = self.lock().values().cloned().collect();
        workers.sort_by(|a, b| {
            a.started_at
                .cmp(&b.started_at)
                .then_with(|| a.handle.cmp(&b.handle))
        });
        workers
    }

    pub fn contains(&self, handle: &WorkerHandle) -> bool {
        self.lock().contains_key(handle)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn remove(&self, handle: &WorkerHandle) {
        self.lock().remove(handle);
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<WorkerHandle, ActiveWorker>> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Removes its registry entry on drop, including on unwind or cancellation.
#[derive(Debug)]
pub struct RegistrationGuard {
    registry: WorkerRegistry,
    handle: WorkerHandle,
}

impl Drop for RegistrationGuard {
    fn drop(&mut self) {
        self.registry.remove(&self.handle);
    }
}
