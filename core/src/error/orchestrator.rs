use thiserror::Error;

/// Errors surfaced by the run orchestrator
#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("no active run")]
    NoActiveRun,

    #[error("run {0} is already executing")]
    AlreadyRunning(String),

    #[error("no tasks to execute")]
    NoTasks,

    #[error("planning failed: {0}")]
    Planning(String),

    #[error("Duplicate task ID: {0}")]
    DuplicateTaskId(String),

    #[error("checkpoint persistence failed: {0}")]
    Persistence(String),

    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(#[from] serde_json::Error),
}

impl OrchestratorError {
    /// Stable process exit code for this error.
    ///
    /// 30-39 are run preconditions, 40-49 planning input, 60-69 persistence.
    pub fn error_code(&self) -> i32 {
        match self {
            OrchestratorError::NoActiveRun => 30,
            OrchestratorError::AlreadyRunning(_) => 31,
            OrchestratorError::NoTasks => 32,
            OrchestratorError::Planning(_) => 40,
            OrchestratorError::DuplicateTaskId(_) => 41,
            OrchestratorError::Persistence(_) => 60,
            OrchestratorError::InvalidSnapshot(_) => 61,
        }
    }
}

/// Errors reported by a worker backend. These never escape a task run;
/// the runner records them on the task instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkerError {
    #[error("worker acquisition failed: {0}")]
    Acquisition(String),

    #[error("{0}")]
    Execution(String),
}

pub type Result<T, E = OrchestratorError> = std::result::Result<T, E>;
