use std::env;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::paths::config_file_path;

#[derive(Debug, Clone, Deserialize, PartialEq, Default)]
pub struct Config {
    #[serde(default)]
    pub player: PlayerConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct PlayerConfig {
    #[serde(default = "default_player_command")]
    pub command: String,
    #[serde(default)]
    pub extra_args: Vec<String>,
    #[serde(default = "default_ipc_connect_timeout_ms")]
    pub ipc_connect_timeout_ms: u64,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            command: default_player_command(),
            extra_args: Vec::new(),
            ipc_connect_timeout_ms: default_ipc_connect_timeout_ms(),
        }
    }
}

impl PlayerConfig {
    pub fn ipc_connect_timeout(&self) -> Duration {
        Duration::from_millis(self.ipc_connect_timeout_ms.max(100))
    }

    /// Player binary, honouring `VISTOS_PLAYER_BIN` over the config file.
    pub fn resolve_bin(&self) -> PathBuf {
        self.resolve_bin_from_env(env::var_os("VISTOS_PLAYER_BIN"))
    }

    pub(crate) fn resolve_bin_from_env(&self, env_value: Option<OsString>) -> PathBuf {
        match env_value {
            Some(value) if !value.is_empty() => PathBuf::from(value),
            _ => PathBuf::from(&self.command),
        }
    }
}

fn default_player_command() -> String {
    "mpv".to_string()
}

fn default_ipc_connect_timeout_ms() -> u64 {
    5000
}

#[derive(Debug, Clone, Deserialize, PartialEq, Default)]
pub struct CatalogConfig {
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct LogConfig {
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

fn default_log_filter() -> String {
    "vistos=info".to_string()
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = config_file_path()?;
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config at {}", path.display()))?;
        toml::from_str(&raw)
            .with_context(|| format!("failed to parse config at {}", path.display()))
    }
}
