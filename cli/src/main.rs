use clap::Parser;
use taskweave_cli::commands::{cli, handlers};
use taskweave_core::api::{AppConfig, CliError, LoggingConfig};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

static LOG_GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
    std::sync::OnceLock::new();

#[tokio::main]
async fn main() {
    let exit = match real_main().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{e}");
            exit_code_for_error(&e)
        }
    };

    std::process::exit(exit);
}

async fn real_main() -> Result<i32, CliError> {
    let args = cli::Args::parse();
    let cfg = load_config(args.config.as_deref())?;
    init_tracing(&cfg.logging).map_err(CliError::Command)?;

    handlers::dispatch(args, cfg).await
}

fn load_config(path: Option<&str>) -> Result<AppConfig, CliError> {
    let cfg = match path {
        Some(p) => {
            let mut cfg = taskweave_core::config::load_from_path(std::path::Path::new(p))
                .map_err(|e| CliError::Config(e.to_string()))?;
            taskweave_core::config::apply_env_overrides(&mut cfg);
            cfg
        }
        None => {
            taskweave_core::config::load_default().map_err(|e| CliError::Config(e.to_string()))?
        }
    };
    Ok(cfg)
}

fn exit_code_for_error(e: &CliError) -> i32 {
    // 0: success
    // 1: run finished with failed or pending tasks (not an error)
    // 11: config error
    // 20: IO / command error
    // 30-69: orchestrator errors, see OrchestratorError::error_code
    // 50: internal/uncategorized
    match e {
        CliError::Config(_) => 11,
        CliError::Orchestrator(oe) => oe.error_code(),
        CliError::Io(_) => 20,
        CliError::Command(_) => 20,
        CliError::Anyhow(_) => 50,
    }
}

/// Install the global subscriber: stderr and/or a per-process log file.
/// `RUST_LOG` wins over `logging.level`.
fn init_tracing(logging: &LoggingConfig) -> Result<(), String> {
    if !logging.enabled {
        return Ok(());
    }

    let filter = match std::env::var("RUST_LOG") {
        Ok(v) if !v.trim().is_empty() => EnvFilter::from_default_env(),
        _ => EnvFilter::try_new(&logging.level).map_err(|e| e.to_string())?,
    };

    let file_writer = if logging.file {
        Some(open_log_file(logging)?)
    } else {
        None
    };
    if !logging.console && file_writer.is_none() {
        return Err("logging enabled but both console and file output are off".to_string());
    }

    let console_layer = logging.console.then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .with_ansi(atty::is(atty::Stream::Stderr))
    });
    let file_layer = file_writer.map(|writer| {
        tracing_subscriber::fmt::layer()
            .with_writer(writer)
            .with_ansi(false)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    Ok(())
}

fn open_log_file(
    logging: &LoggingConfig,
) -> Result<tracing_appender::non_blocking::NonBlocking, String> {
    let dir = logging
        .directory
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|| std::env::temp_dir().join("taskweave"));
    std::fs::create_dir_all(&dir)
        .map_err(|e| format!("cannot create log directory {}: {e}", dir.display()))?;

    let appender =
        tracing_appender::rolling::never(&dir, format!("taskweave.{}.log", std::process::id()));
    let (writer, guard) = tracing_appender::non_blocking(appender);
    // Keeps the background writer alive until exit
    let _ = LOG_GUARD.set(guard);
    Ok(writer)
}
