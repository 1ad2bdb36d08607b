mod app;
mod cli;
mod config;
mod db;
mod paths;

use std::fs;

use anyhow::Result;
use clap::Parser;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use crate::config::{Config, LogConfig};

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    let config = Config::load()?;
    let _log_guard = init_logging(&config.log);
    app::run(cli, config)
}

/// Logs go to a file in the data directory; the terminal belongs to the UI.
fn init_logging(log: &LogConfig) -> Option<WorkerGuard> {
    let dir = paths::data_dir().ok()?;
    fs::create_dir_all(&dir).ok()?;
    let appender = tracing_appender::rolling::never(&dir, "vistos.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let filter = EnvFilter::try_from_env("VISTOS_LOG")
        .or_else(|_| EnvFilter::try_new(&log.filter))
        .unwrap_or_else(|_| EnvFilter::new("vistos=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .init();
    Some(guard)
}
