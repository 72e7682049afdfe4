use std::path::{Path, PathBuf};

use super::types::AppConfig;

/// Get the default taskweave data directory: ~/.taskweave
pub fn get_data_dir() -> anyhow::Result<PathBuf> {
    let home = dirs::home_dir().ok_or_else(|| anyhow::anyhow!("Cannot determine home directory"))?;
    Ok(home.join(".taskweave"))
}

pub fn default_checkpoint_path() -> anyhow::Result<PathBuf> {
    Ok(get_data_dir()?.join("checkpoint.json"))
}

pub fn load_default() -> anyhow::Result<AppConfig> {
    // Priority 1: ~/.taskweave/config.toml (highest)
    let data_dir = get_data_dir()?;
    let home_config = data_dir.join("config.toml");

    // Priority 2: ./config.toml (current directory)
    let local_config = Path::new("config.toml");

    let mut cfg = if home_config.exists() {
        load_from_path(&home_config)?
    } else if local_config.exists() {
        load_from_path(local_config)?
    } else {
        AppConfig::default()
    };

    if cfg.checkpoint.path.trim().is_empty() {
        cfg.checkpoint.path = default_checkpoint_path()?.to_string_lossy().to_string();
    }

    if cfg
        .logging
        .directory
        .as_ref()
        .map(|s| s.trim().is_empty())
        .unwrap_or(true)
    {
        cfg.logging.directory = Some(data_dir.join("logs").to_string_lossy().to_string());
    }

    apply_env_overrides(&mut cfg);
    Ok(cfg)
}

pub fn load_from_path(path: &Path) -> anyhow::Result<AppConfig> {
    let s = std::fs::read_to_string(path)?;
    let cfg = toml::from_str::<AppConfig>(&s)
        .map_err(|e| anyhow::anyhow!("failed to parse {}: {e}", path.display()))?;
    Ok(cfg)
}

/// Environment variable overrides (Priority 0: highest)
pub fn apply_env_overrides(cfg: &mut AppConfig) {
    if let Ok(v) = std::env::var("TASKWEAVE_MAX_PARALLEL") {
        match v.trim().parse::<usize>() {
            Ok(n) if n > 0 => cfg.executor.max_parallel = n,
            _ => tracing::warn!(value = %v, "ignoring invalid TASKWEAVE_MAX_PARALLEL"),
        }
    }
    if let Ok(v) = std::env::var("TASKWEAVE_WORKER_PROGRAM") {
        if !v.trim().is_empty() {
            cfg.worker.program = v;
        }
    }
    if let Ok(v) = std::env::var("TASKWEAVE_CHECKPOINT") {
        if !v.trim().is_empty() {
            cfg.checkpoint.path = v;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_from_path_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[executor]\nmax_parallel = \"many\"\n").unwrap();

        let err = load_from_path(&path).unwrap_err();
        assert!(err.to_string().contains("failed to parse"));
    }

    #[test]
    fn test_load_from_path_reads_checkpoint_section() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[checkpoint]\npath = \"/tmp/cp.json\"\nauto_save = false\n",
        )
        .unwrap();

        let cfg = load_from_path(&path).unwrap();
        assert_eq!(cfg.checkpoint.path, "/tmp/cp.json");
        assert!(!cfg.checkpoint.auto_save);
    }
}
