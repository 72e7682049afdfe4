#[allow(clippy::module_inception)]
pub mod error;
pub mod orchestrator;

pub use error::CliError;
pub use orchestrator::{OrchestratorError, Result, WorkerError};
