//! Dependency-layered task execution
//!
//! This module turns a flat task list into parallel layers and drives them
//! through a worker backend. It provides:
//! - Lexical dependency inference for task batches without explicit edges
//! - Layering with a fallback layer for cyclic or unresolvable dependencies
//! - Concurrent layer execution with a parallelism cap and failure isolation
//! - Checkpoint and resume through the run ledger
//!
//! # Architecture
//!
//! ```text
//! Vec<NewTask> / Planner
//!   ↓
//! DependencyInferenceStrategy::infer()   (only when no explicit edges)
//!   ↓
//! Run { tasks }  ← RunLedger (Arc<Mutex<Option<Run>>> + generation)
//!   ↓
//! TaskGraph::layers_from(settled) → Layering { layers, fallback }
//!   ↓
//! Orchestrator::execute() → run_many() per layer → TaskRunner::run() per task
//!   ↓
//! ExecutionReport
//! ```

mod engine;
pub mod graph;
pub mod inference;
mod ledger;
mod output;
mod progress;
mod registry;
mod runner;
mod scheduler;
pub mod traits;
pub mod types;

pub use engine::{Orchestrator, OrchestratorBuilder};
pub use graph::{build_layers, Layering, TaskGraph};
pub use inference::{strategy_for, DependencyInferenceStrategy, ExplicitOnly, LexicalInference};
pub use ledger::{Generation, RunLedger};
pub use output::{log_event, RunEmitter};
pub use progress::ProgressMonitor;
pub use registry::{ActiveWorker, RegistrationGuard, WorkerRegistry};
pub use runner::{scoped_instruction, RunScope, TaskRunner};
pub use scheduler::run_many;
pub use types::{
    CheckpointReport, ExecutionMode, ExecutionOpts, ExecutionReport, NewTask, Run, StatusReport,
    Task, TaskCounts, TaskReport, TaskStatus, WorkerHandle,
};
