use std::env;
use std::ffi::OsString;
use std::path::PathBuf;

use anyhow::{Context, Result};

const APP_DIR: &str = "vistos";

pub fn data_dir() -> Result<PathBuf> {
    data_dir_from_env(env::var_os("VISTOS_DATA_DIR"))
}

pub(crate) fn data_dir_from_env(env_value: Option<OsString>) -> Result<PathBuf> {
    match env_value {
        Some(value) if !value.is_empty() => Ok(PathBuf::from(value)),
        _ => {
            let base = dirs::data_dir().context("unable to resolve data directory")?;
            Ok(base.join(APP_DIR))
        }
    }
}

pub fn database_file_path() -> Result<PathBuf> {
    Ok(data_dir()?.join("vistos.db"))
}

pub fn config_file_path() -> Result<PathBuf> {
    let base = dirs::config_dir().context("unable to resolve config directory")?;
    Ok(base.join(APP_DIR).join("config.toml"))
}
