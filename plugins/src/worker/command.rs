use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Mutex;

use async_trait::async_trait;
use taskweave_core::api::{WorkerBackend, WorkerConfig, WorkerError, WorkerHandle, WorkerOutcome};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Bytes of stderr kept in a failure message
const STDERR_TAIL_BYTES: usize = 2048;

type LastModel = Option<(WorkerHandle, Option<String>)>;

/// Runs one process per task. The instruction is written to the child's
/// stdin and the task succeeds when the process exits with status 0.
///
/// The child sees `TASKWEAVE_WORKER` (its handle) and, when a model is
/// known, `TASKWEAVE_MODEL`. A submission whose future is dropped leaves
/// its child running untracked.
pub struct CommandWorker {
    program: String,
    args: Vec<String>,
    env: HashMap<String, String>,
    default_model: Option<String>,
    /// Latest submission and the model it ran with
    last_model: Mutex<LastModel>,
}

impl CommandWorker {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: HashMap::new(),
            default_model: None,
            last_model: Mutex::new(None),
        }
    }

    pub fn from_config(cfg: &WorkerConfig) -> Self {
        Self {
            program: cfg.program.clone(),
            args: cfg.args.clone(),
            env: cfg.env.clone(),
            default_model: cfg
                .default_model
                .clone()
                .filter(|m| !m.trim().is_empty()),
            last_model: Mutex::new(None),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = Some(model.into());
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    fn lock_last_model(&self) -> std::sync::MutexGuard<'_, LastModel> {
        match self.last_model.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[async_trait]
impl WorkerBackend for CommandWorker {
    fn name(&self) -> &str {
        "command"
    }

    async fn acquire(&self, label: &str) -> Result<WorkerHandle, WorkerError> {
        let resolved = resolve_executable(&self.program).ok_or_else(|| {
            WorkerError::Acquisition(format!(
                "executable '{}' not found; install it or set worker.program to a full path",
                self.program
            ))
        })?;
        tracing::debug!(program = %resolved.display(), label, "worker acquired");

        let suffix = uuid::Uuid::new_v4().simple().to_string();
        Ok(WorkerHandle::new(format!("{label}-{}", &suffix[..8])))
    }

    async fn submit(
        &self,
        handle: &WorkerHandle,
        instruction: &str,
        model_preference: Option<&str>,
    ) -> Result<WorkerOutcome, WorkerError> {
        let model = model_preference
            .map(str::to_string)
            .or_else(|| self.default_model.clone());
        *self.lock_last_model() = Some((handle.clone(), model.clone()));

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .envs(&self.env)
            .env("TASKWEAVE_WORKER", handle.as_str())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(model) = &model {
            cmd.env("TASKWEAVE_MODEL", model);
        }

        let mut child = cmd.spawn().map_err(|e| {
            WorkerError::Execution(format!("failed to start '{}': {e}", self.program))
        })?;

        // Feed stdin on its own task so a chatty child cannot block on a full stdout pipe
        let writer = child.stdin.take().map(|mut stdin| {
            let payload = instruction.as_bytes().to_vec();
            tokio::spawn(async move {
                stdin.write_all(&payload).await?;
                stdin.shutdown().await
            })
        });

        let output = child.wait_with_output().await.map_err(|e| {
            WorkerError::Execution(format!("waiting for '{}' failed: {e}", self.program))
        })?;

        if let Some(writer) = writer {
            match writer.await {
                Ok(Ok(())) => {}
                // The child may exit without reading its input
                Ok(Err(e)) => tracing::debug!(handle = %handle.as_str(), error = %e, "stdin closed early"),
                Err(e) => tracing::debug!(handle = %handle.as_str(), error = %e, "stdin writer aborted"),
            }
        }

        if output.status.success() {
            return Ok(WorkerOutcome::new(String::from_utf8_lossy(&output.stdout)));
        }

        let code = output
            .status
            .code()
            .map(|c| c.to_string())
            .unwrap_or_else(|| "signal".to_string());
        let stderr = String::from_utf8_lossy(&output.stderr);
        let tail = tail(stderr.trim(), STDERR_TAIL_BYTES);
        Err(WorkerError::Execution(if tail.is_empty() {
            format!("'{}' exited with status {code}", self.program)
        } else {
            format!("'{}' exited with status {code}: {tail}", self.program)
        }))
    }

    async fn describe(&self, handle: &WorkerHandle) -> Option<String> {
        match &*self.lock_last_model() {
            Some((last, model)) if last == handle => model.clone(),
            _ => None,
        }
    }
}

/// Last `max` bytes of `s`, cut on a char boundary
fn tail(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut start = s.len() - max;
    while !s.is_char_boundary(start) {
        start += 1;
    }
    &s[start..]
}

/// Resolve `program` to an executable file, searching `PATH` for bare names.
fn resolve_executable(program: &str) -> Option<PathBuf> {
    let program = program.trim();
    if program.is_empty() {
        return None;
    }

    let path = Path::new(program);
    if path.components().count() > 1 || path.is_absolute() {
        return is_executable(path).then(|| path.to_path_buf());
    }

    let path_env = std::env::var_os("PATH")?;
    std::env::split_paths(&path_env).find_map(|dir| {
        #[cfg(target_os = "windows")]
        {
            let candidate = dir.join(format!("{program}.exe"));
            if candidate.is_file() {
                return Some(candidate);
            }
        }

        let candidate = dir.join(program);
        is_executable(&candidate).then_some(candidate)
    })
}

#[cfg(not(target_os = "windows"))]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(target_os = "windows")]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
