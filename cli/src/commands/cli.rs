use clap::{Args as ClapArgs, Parser, Subcommand};

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Jsonl,
    /// Only the final summary
    None,
}

impl OutputFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            OutputFormat::Text => "text",
            OutputFormat::Jsonl => "jsonl",
            OutputFormat::None => "none",
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "taskweave", version, about = "Run a goal as dependency-ordered parallel tasks")]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file to use instead of ~/.taskweave/config.toml
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Output format; defaults to `executor.output_format`
    #[arg(long, value_enum, global = true)]
    pub format: Option<OutputFormat>,

    /// Checkpoint file; defaults to `checkpoint.path`
    #[arg(long, global = true)]
    pub checkpoint: Option<String>,
}

#[derive(ClapArgs, Debug, Clone, Default)]
pub struct ExecArgs {
    /// Run tasks one at a time in run order
    #[arg(long)]
    pub serial: bool,

    /// Maximum workers in flight per layer
    #[arg(long)]
    pub max_parallel: Option<usize>,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct RunArgs {
    /// Overall goal, passed to every worker as context
    #[arg(long)]
    pub goal: String,

    /// JSON plan file with the tasks for this goal
    #[arg(long, conflicts_with = "task")]
    pub plan: Option<String>,

    /// Task content. Can be specified multiple times.
    #[arg(long = "task", action = clap::ArgAction::Append)]
    pub task: Vec<String>,

    /// Model preference handed to workers
    #[arg(long)]
    pub model: Option<String>,

    /// Only use dependencies given in the plan, never infer them
    #[arg(long)]
    pub explicit_deps: bool,

    #[command(flatten)]
    pub exec: ExecArgs,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct ResumeArgs {
    #[command(flatten)]
    pub exec: ExecArgs,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start a run for a goal and execute it
    Run(RunArgs),
    /// Continue the checkpointed run
    Resume(ResumeArgs),
    /// Show the checkpointed run
    Status,
    /// Show the layers the pending tasks of the checkpointed run would form
    Layers,
    /// Discard the checkpointed run
    Stop,
}
