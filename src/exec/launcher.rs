// src/exec/launcher.rs

//! Launching relay processes.
//!
//! The worker talks to a [`ProcessLauncher`] instead of `tokio::process`
//! directly. Production uses [`RelayLauncher`]; tests plug in a fake launcher
//! whose processes live in memory.

use std::process::Stdio;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use tokio::io::AsyncRead;
use tokio::process::Command;
use tracing::debug;

use crate::config::{RelaySettings, WorkerConfig};
use crate::errors::StreamRunnerError;
use crate::exec::process::{ChildProcess, ProcessHandle};

/// One captured output stream of a launched process.
pub type CaptureReader = Box<dyn AsyncRead + Send + Unpin>;

/// A freshly launched process plus both of its output pipes.
pub struct LaunchedProcess {
    pub handle: Arc<dyn ProcessHandle>,
    pub stdout: CaptureReader,
    pub stderr: CaptureReader,
}

/// Trait abstracting how a worker's relay process is started.
pub trait ProcessLauncher: Send + Sync {
    /// Start the relay for `config`.
    ///
    /// An error means nothing is left running: either the spawn failed or the
    /// half-started process was already killed.
    fn launch(&self, config: &WorkerConfig) -> Result<LaunchedProcess>;
}

/// Build the relay argument list:
/// `-rw_timeout <us> -i <src> -c copy -f <container> <dst>`.
pub fn relay_args(settings: &RelaySettings, config: &WorkerConfig) -> Vec<String> {
    vec![
        "-rw_timeout".to_string(),
        settings.rw_timeout_us.to_string(),
        "-i".to_string(),
        config.source.clone(),
        "-c".to_string(),
        "copy".to_string(),
        "-f".to_string(),
        settings.container.clone(),
        config.destination.clone(),
    ]
}

/// Launcher used in production: spawns the configured relay program in a new
/// process group with stdout and stderr piped.
#[derive(Debug, Clone)]
pub struct RelayLauncher {
    settings: RelaySettings,
}

impl RelayLauncher {
    pub fn new(settings: RelaySettings) -> Self {
        Self { settings }
    }
}

impl ProcessLauncher for RelayLauncher {
    fn launch(&self, config: &WorkerConfig) -> Result<LaunchedProcess> {
        let mut cmd = Command::new(&self.settings.program);
        cmd.args(relay_args(&self.settings, config))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .process_group(0);

        let mut child = cmd.spawn().with_context(|| {
            format!(
                "spawning '{}' for stream '{}'",
                self.settings.program, config.id
            )
        })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let handle = Arc::new(ChildProcess::new(child));
        debug!(stream_id = %config.id, pid = ?handle.pid(), "relay process spawned");

        match (stdout, stderr) {
            (Some(stdout), Some(stderr)) => Ok(LaunchedProcess {
                handle,
                stdout: Box::new(stdout),
                stderr: Box::new(stderr),
            }),
            _ => {
                // Dropping the handle leaves the zombie to tokio's orphan reaper.
                let _ = handle.terminate_group();
                bail!("output pipes unavailable for stream '{}'", config.id)
            }
        }
    }
}

/// Run `<program> -version` and return the first line it prints.
///
/// Used at startup so a missing relay binary fails fast instead of turning
/// into an endless restart loop.
pub async fn check_relay(program: &str) -> crate::errors::Result<String> {
    let output = Command::new(program)
        .arg("-version")
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| {
            StreamRunnerError::RelayUnavailable(format!("{program}: {e}"))
        })?;

    if !output.status.success() {
        return Err(StreamRunnerError::RelayUnavailable(format!(
            "{program} -version exited with {}",
            output.status
        )));
    }

    let text = String::from_utf8_lossy(&output.stdout);
    Ok(text.lines().next().unwrap_or_default().trim().to_string())
}
