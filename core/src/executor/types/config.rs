use crate::config::{AppConfig, InferenceKind};

use super::run::ExecutionMode;

/// Execution options for the orchestrator.
#[derive(Debug, Clone)]
pub struct ExecutionOpts {
    /// Maximum number of workers in flight within one layer
    pub max_parallel: usize,

    /// Mode used when `execute` is called without an explicit mode
    pub default_mode: ExecutionMode,

    /// Dependency inference strategy for batches without explicit edges
    pub inference: InferenceKind,

    /// Enable visual progress bar (disabled for jsonl output)
    pub progress_bar: bool,

    /// Persist a checkpoint after every `execute`
    pub auto_save: bool,
}

impl Default for ExecutionOpts {
    fn default() -> Self {
        Self {
            max_parallel: 8,
            default_mode: ExecutionMode::Parallel,
            inference: InferenceKind::Lexical,
            progress_bar: false,
            auto_save: true,
        }
    }
}

impl ExecutionOpts {
    pub fn from_config(cfg: &AppConfig) -> Self {
        // Progress bar only for text output
        let progress_bar = cfg.executor.progress_bar && cfg.executor.output_format != "jsonl";

        Self {
            max_parallel: cfg.executor.max_parallel.max(1),
            default_mode: cfg.executor.mode,
            inference: cfg.executor.inference,
            progress_bar,
            auto_save: cfg.checkpoint.auto_save,
        }
    }

    pub fn with_max_parallel(mut self, max_parallel: usize) -> Self {
        self.max_parallel = max_parallel.max(1);
        self
    }

    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.default_mode = mode;
        self
    }
}
