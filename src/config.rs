use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const CONFIG_FILE: &str = "rfidd.toml";
pub const NOTICE_MS_ENV: &str = "RFIDD_NOTICE_MS";
pub const WORKSPACE_ENV: &str = "RFIDD_WORKSPACE";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub notices: NoticeConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoticeConfig {
    /// How long the UI keeps a notice on screen.
    pub dismiss_after_ms: u64,
}

impl Default for NoticeConfig {
    fn default() -> Self {
        Self {
            dismiss_after_ms: 3000,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

pub fn config_path(workspace: &Path) -> PathBuf {
    workspace.join(CONFIG_FILE)
}

/// Defaults, then `<workspace>/rfidd.toml`, then environment overrides.
pub fn load_for_workspace(workspace: &Path) -> Result<Config, ConfigError> {
    let mut config = load_file(&config_path(workspace))?.unwrap_or_default();
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    Ok(config)
}

fn load_file(path: &Path) -> Result<Option<Config>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&contents)
        .map(Some)
        .map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
}

fn apply_env_overrides(config: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(raw) = lookup(NOTICE_MS_ENV) {
        match raw.trim().parse::<u64>() {
            Ok(ms) => config.notices.dismiss_after_ms = ms,
            Err(_) => tracing::warn!(value = %raw, "ignoring invalid {NOTICE_MS_ENV}"),
        }
    }
}
