use async_trait::async_trait;

use crate::error::WorkerError;
use crate::executor::types::WorkerHandle;

/// What a worker produced for one instruction
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerOutcome {
    pub output: String,
}

impl WorkerOutcome {
    pub fn new(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
        }
    }
}

/// Backend that executes single-task instructions
#[async_trait]
pub trait WorkerBackend: Send + Sync {
    /// Backend name (unique identifier)
    fn name(&self) -> &str;

    /// Reserve a worker for the task labelled `label`
    async fn acquire(&self, label: &str) -> Result<WorkerHandle, WorkerError>;

    /// Run `instruction` on an acquired worker and wait for the full response
    async fn submit(
        &self,
        handle: &WorkerHandle,
        instruction: &str,
        model_preference: Option<&str>,
    ) -> Result<WorkerOutcome, WorkerError>;

    /// Last known model preference of a worker session, if it can be found
    async fn describe(&self, _handle: &WorkerHandle) -> Option<String> {
        None
    }
}
