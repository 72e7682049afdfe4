//! Checkpoint persistence

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use async_trait::async_trait;

/// One named slot of checkpoint bytes
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Human readable location, used in reports
    fn location(&self) -> String;

    async fn write(&self, bytes: &[u8]) -> Result<()>;

    /// `None` when nothing was saved yet
    async fn read(&self) -> Result<Option<Vec<u8>>>;
}

/// Checkpoint file on disk, replaced atomically
#[derive(Debug, Clone)]
pub struct FileCheckpointStore {
    path: PathBuf,
}

impl FileCheckpointStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "checkpoint.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl CheckpointStore for FileCheckpointStore {
    fn location(&self) -> String {
        self.path.display().to_string()
    }

    async fn write(&self, bytes: &[u8]) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create checkpoint directory: {:?}", parent))?;
        }

        let tmp = self.tmp_path();
        tokio::fs::write(&tmp, bytes)
            .await
            .with_context(|| format!("Failed to write checkpoint to {:?}", tmp))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("Failed to move checkpoint into {:?}", self.path))?;
        Ok(())
    }

    async fn read(&self) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => {
                Err(e).with_context(|| format!("Failed to read checkpoint from {:?}", self.path))
            }
        }
    }
}

/// In-process checkpoint slot
#[derive(Debug, Default)]
pub struct MemoryCheckpointStore {
    slot: Mutex<Option<Vec<u8>>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> Option<Vec<u8>> {
        match self.slot.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    fn location(&self) -> String {
        "memory".to_string()
    }

    async fn write(&self, bytes: &[u8]) -> Result<()> {
        let mut guard = match self.slot.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = Some(bytes.to_vec());
        Ok(())
    }

    async fn read(&self) -> Result<Option<Vec<u8>>> {
        Ok(self.contents())
    }
}
