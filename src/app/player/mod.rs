mod ipc;

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Child, Command as ProcessCommand, ExitStatus, Stdio};
use std::sync::mpsc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::PlayerConfig;

pub(crate) use ipc::{PlayerSignal, parse_ipc_line};

#[derive(Debug, Error)]
pub(crate) enum MpvError {
    #[error("failed to launch {bin}: {source}")]
    Spawn {
        bin: String,
        #[source]
        source: std::io::Error,
    },
    #[error("player exited before its IPC socket was ready ({0})")]
    ExitedEarly(ExitStatus),
    #[error("timed out waiting for player IPC socket at {0}")]
    ConnectTimeout(PathBuf),
    #[cfg(not(unix))]
    #[error("player IPC is not supported on this platform")]
    Unsupported,
}

pub(crate) fn make_temp_ipc_dir() -> Result<PathBuf> {
    let ts = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let dir = env::temp_dir().join(format!("vistos-ipc-{}-{ts}", std::process::id()));
    fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create temp ipc dir {}", dir.display()))?;
    Ok(dir)
}

#[derive(Debug)]
pub(crate) struct TempIpcDir {
    path: PathBuf,
}

impl TempIpcDir {
    pub(crate) fn new() -> Result<Self> {
        Ok(Self {
            path: make_temp_ipc_dir()?,
        })
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn socket_path(&self) -> PathBuf {
        self.path.join("mpv.sock")
    }
}

impl Drop for TempIpcDir {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.path);
    }
}

pub(crate) fn player_args(config: &PlayerConfig, socket: &Path) -> Vec<String> {
    let mut args = vec![
        "--idle=yes".to_string(),
        "--force-window=yes".to_string(),
        "--no-terminal".to_string(),
        "--keep-open=no".to_string(),
        format!("--input-ipc-server={}", socket.display()),
    ];
    args.extend(config.extra_args.iter().cloned());
    args
}

/// An mpv process driven over its JSON IPC socket.
///
/// Playback events are read on a background thread and buffered until the
/// UI loop drains them with [`MpvSession::drain_signals`].
#[cfg(unix)]
pub(crate) struct MpvSession {
    child: Child,
    stream: std::os::unix::net::UnixStream,
    signals: mpsc::Receiver<PlayerSignal>,
    _ipc_dir: TempIpcDir,
}

#[cfg(unix)]
impl MpvSession {
    pub(crate) fn spawn(config: &PlayerConfig) -> Result<Self> {
        use std::io::{BufRead, BufReader};
        use std::os::unix::net::UnixStream;

        let ipc_dir = TempIpcDir::new()?;
        let socket = ipc_dir.socket_path();
        let bin = config.resolve_bin();
        let mut child = ProcessCommand::new(&bin)
            .args(player_args(config, &socket))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| MpvError::Spawn {
                bin: bin.display().to_string(),
                source,
            })?;
        debug!(pid = child.id(), dir = %ipc_dir.path().display(), "spawned player");

        let deadline = Instant::now() + config.ipc_connect_timeout();
        let stream = loop {
            match UnixStream::connect(&socket) {
                Ok(stream) => break stream,
                Err(_) if Instant::now() < deadline => {
                    if let Some(status) = child.try_wait()? {
                        return Err(MpvError::ExitedEarly(status).into());
                    }
                    std::thread::sleep(Duration::from_millis(50));
                }
                Err(_) => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(MpvError::ConnectTimeout(socket).into());
                }
            }
        };

        let reader = BufReader::new(
            stream
                .try_clone()
                .context("failed to clone player IPC stream")?,
        );
        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            for line in reader.lines() {
                let Ok(line) = line else {
                    break;
                };
                if let Some(signal) = parse_ipc_line(&line)
                    && tx.send(signal).is_err()
                {
                    return;
                }
            }
            let _ = tx.send(PlayerSignal::Closed);
        });

        let mut session = Self {
            child,
            stream,
            signals: rx,
            _ipc_dir: ipc_dir,
        };
        session.send(&ipc::observe_time_pos())?;
        Ok(session)
    }

    fn send(&mut self, line: &str) -> Result<()> {
        use std::io::Write;

        self.stream
            .write_all(line.as_bytes())
            .context("failed to write player IPC command")
    }

    /// Replaces the current file, paused until the controller asks to start.
    pub(crate) fn load(&mut self, url: &str) -> Result<()> {
        self.send(&ipc::set_property("pause", serde_json::Value::Bool(true)))?;
        self.send(&ipc::loadfile(url))
    }

    pub(crate) fn start_muted(&mut self) -> Result<()> {
        self.send(&ipc::set_property("mute", serde_json::Value::Bool(true)))?;
        self.send(&ipc::set_property("pause", serde_json::Value::Bool(false)))
    }

    pub(crate) fn seek(&mut self, seconds: f64) -> Result<()> {
        self.send(&ipc::set_property("time-pos", serde_json::json!(seconds)))
    }

    pub(crate) fn resume(&mut self) -> Result<()> {
        self.send(&ipc::set_property("pause", serde_json::Value::Bool(false)))
    }

    pub(crate) fn is_running(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    pub(crate) fn drain_signals(&self) -> Vec<PlayerSignal> {
        let mut out = Vec::new();
        while let Ok(signal) = self.signals.try_recv() {
            out.push(signal);
        }
        out
    }
}

#[cfg(unix)]
impl Drop for MpvSession {
    fn drop(&mut self) {
        if self.is_running() {
            if let Err(err) = self.send(&ipc::quit()) {
                warn!(error = %err, "failed to ask player to quit");
            }
            std::thread::sleep(Duration::from_millis(100));
            if self.is_running() {
                let _ = self.child.kill();
            }
        }
        let _ = self.child.wait();
    }
}

#[cfg(not(unix))]
pub(crate) struct MpvSession {
    _never: std::convert::Infallible,
}

#[cfg(not(unix))]
impl MpvSession {
    pub(crate) fn spawn(_config: &PlayerConfig) -> Result<Self> {
        Err(MpvError::Unsupported.into())
    }

    pub(crate) fn load(&mut self, _url: &str) -> Result<()> {
        match self._never {}
    }

    pub(crate) fn start_muted(&mut self) -> Result<()> {
        match self._never {}
    }

    pub(crate) fn seek(&mut self, _seconds: f64) -> Result<()> {
        match self._never {}
    }

    pub(crate) fn resume(&mut self) -> Result<()> {
        match self._never {}
    }

    pub(crate) fn is_running(&mut self) -> bool {
        match self._never {}
    }

    pub(crate) fn drain_signals(&self) -> Vec<PlayerSignal> {
        match self._never {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn player_args_point_at_socket_and_append_extras() {
        let config = PlayerConfig {
            extra_args: vec!["--fs".to_string()],
            ..PlayerConfig::default()
        };
        let args = player_args(&config, Path::new("/tmp/x/mpv.sock"));
        assert!(args.contains(&"--idle=yes".to_string()));
        assert!(args.contains(&"--input-ipc-server=/tmp/x/mpv.sock".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("--fs"));
    }

    #[test]
    fn temp_ipc_dir_is_removed_on_drop() {
        let dir = TempIpcDir::new().unwrap();
        let path = dir.path().to_path_buf();
        assert!(path.exists());
        assert!(dir.socket_path().ends_with("mpv.sock"));
        drop(dir);
        assert!(!path.exists());
    }

    #[cfg(unix)]
    #[test]
    fn spawn_reports_missing_binary() {
        let config = PlayerConfig {
            command: "/nonexistent/vistos-player".to_string(),
            ..PlayerConfig::default()
        };
        let Err(err) = MpvSession::spawn(&config) else {
            panic!("spawning a missing binary should fail");
        };
        assert!(err.to_string().contains("failed to launch"));
    }
}
