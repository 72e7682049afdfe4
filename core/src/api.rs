//! Stable re-exports for consumers (`cli`, `plugins`, and external crates).
//!
//! Prefer importing from `taskweave_core::api` instead of reaching into internal modules.

pub use crate::config::{
    load_default, load_from_path, AppConfig, CheckpointConfig, ExecutorConfig, InferenceKind,
    LoggingConfig, WorkerConfig,
};
pub use crate::error::{CliError, OrchestratorError, WorkerError};
pub use crate::executor::traits::{
    OutputRendererPlugin, RenderEvent, WorkerBackend, WorkerOutcome,
};
pub use crate::executor::{
    ActiveWorker, CheckpointReport, DependencyInferenceStrategy, ExecutionMode, ExecutionOpts,
    ExecutionReport, ExplicitOnly, Layering, LexicalInference, NewTask, Orchestrator,
    OrchestratorBuilder, Run, StatusReport, Task, TaskCounts, TaskReport, TaskStatus,
    WorkerHandle,
};
pub use crate::planner::{DependencyRef, PlannedTask, Planner};
pub use crate::state::{
    CheckpointStore, FileCheckpointStore, MemoryCheckpointStore, ObservedTodo, Snapshot,
    TodoStatus,
};
