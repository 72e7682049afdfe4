use std::sync::{Arc, Mutex, MutexGuard};

use super::types::{Run, Task};

/// Identifies one installation of a run in the ledger.
///
/// Installing, replacing or clearing the run moves the ledger to a new
/// generation, even when the same run comes back from a checkpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Generation(u64);

#[derive(Debug, Default)]
struct Slot {
    run: Option<Run>,
    generation: u64,
}

impl Slot {
    fn attached(&self, generation: Generation) -> Option<&Run> {
        self.run.as_ref().filter(|_| self.generation == generation.0)
    }

    fn swap(&mut self, run: Option<Run>) -> Option<Run> {
        self.generation += 1;
        std::mem::replace(&mut self.run, run)
    }
}

/// Lock-guarded slot holding the active run.
///
/// Writers replace one task slot at a time; the lock is never held across an await.
#[derive(Debug, Clone, Default)]
pub struct RunLedger {
    inner: Arc<Mutex<Slot>>,
}

impl RunLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read<R>(&self, f: impl FnOnce(Option<&Run>) -> R) -> R {
        let guard = self.lock();
        f(guard.run.as_ref())
    }

    /// Edit the active run in place. The closure also gets the current
    /// generation; use `install`/`install_idle`/`take` to swap the run.
    pub fn update<R>(&self, f: impl FnOnce(Option<&mut Run>, Generation) -> R) -> R {
        let mut guard = self.lock();
        let generation = Generation(guard.generation);
        f(guard.run.as_mut(), generation)
    }

    /// Install `run` as the active run, returning the previous one.
    pub fn install(&self, run: Run) -> Option<Run> {
        self.lock().swap(Some(run))
    }

    /// Like `install`, but refuses while the active run is executing and
    /// returns that run's id instead.
    pub fn install_idle(&self, run: Run) -> Result<Option<Run>, String> {
        let mut guard = self.lock();
        if let Some(current) = guard.run.as_ref().filter(|r| r.is_running) {
            return Err(current.run_id.clone());
        }
        Ok(guard.swap(Some(run)))
    }

    pub fn take(&self) -> Option<Run> {
        self.lock().swap(None)
    }

    pub fn generation(&self) -> Generation {
        Generation(self.lock().generation)
    }

    /// Copy of the active run
    pub fn snapshot_run(&self) -> Option<Run> {
        self.lock().run.clone()
    }

    /// Copy of the active run, if it is still the one installed at `generation`
    pub fn attached_run(&self, generation: Generation) -> Option<Run> {
        self.lock().attached(generation).cloned()
    }

    pub fn current_run_id(&self) -> Option<String> {
        self.read(|run| run.map(|r| r.run_id.clone()))
    }

    pub fn is_current(&self, generation: Generation) -> bool {
        self.lock().attached(generation).is_some()
    }

    /// Write one task slot. Ignored once the run installed at `generation`
    /// has been replaced or cleared.
    pub fn publish(&self, generation: Generation, task: &Task) -> bool {
        let mut guard = self.lock();
        if guard.attached(generation).is_none() {
            tracing::debug!(task_id = %task.id(), "dropping update for detached run");
            return false;
        }
        match guard.run.as_mut().and_then(|run| run.task_mut(task.id())) {
            Some(slot) => {
                *slot = task.clone();
                true
            }
            None => false,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Slot> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
