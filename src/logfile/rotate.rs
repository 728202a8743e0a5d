// src/logfile/rotate.rs

//! Size-based log rotation with numbered generations.

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{error, info, warn};

use crate::config::RotationSettings;
use crate::logfile::sink::LogSink;

/// Rotation policy for one primary log file.
///
/// Generations are `name.1` (newest) to `name.N` (oldest). A rotation shifts
/// every generation up by one, drops whatever falls past `N`, and moves the
/// primary file to `name.1`. The primary path is left empty; the sink
/// recreates it on its next reopen.
#[derive(Debug, Clone)]
pub struct LogRotator {
    path: PathBuf,
    max_bytes: u64,
    max_files: usize,
}

impl LogRotator {
    pub fn new(path: impl Into<PathBuf>, max_bytes: u64, max_files: usize) -> Self {
        Self {
            path: path.into(),
            max_bytes,
            max_files,
        }
    }

    pub fn from_settings(path: impl Into<PathBuf>, settings: &RotationSettings) -> Self {
        Self::new(path, settings.max_bytes, settings.max_files)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of generation `n`, e.g. `stream.log.3`.
    pub fn generation_path(&self, n: usize) -> PathBuf {
        let mut name = OsString::from(self.path.as_os_str());
        name.push(format!(".{n}"));
        PathBuf::from(name)
    }

    /// Rotate if the primary file is at or above the size threshold.
    ///
    /// Returns `Ok(true)` when a rotation happened. A missing primary file is
    /// not an error (nothing has been logged yet).
    pub fn rotate_if_needed(&self) -> Result<bool> {
        let meta = match fs::metadata(&self.path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(e) => {
                return Err(e).with_context(|| format!("inspecting log file {:?}", self.path));
            }
        };

        // An empty file never rotates, whatever the threshold.
        if meta.len() == 0 || meta.len() < self.max_bytes {
            return Ok(false);
        }

        if self.max_files == 0 {
            fs::remove_file(&self.path)
                .with_context(|| format!("removing log file {:?}", self.path))?;
            return Ok(true);
        }

        for n in (1..self.max_files).rev() {
            let older = self.generation_path(n);
            if older.exists() {
                let newer = self.generation_path(n + 1);
                fs::rename(&older, &newer)
                    .with_context(|| format!("renaming log file {:?} to {:?}", older, newer))?;
            }
        }

        let first = self.generation_path(1);
        fs::rename(&self.path, &first)
            .with_context(|| format!("renaming current log file to {:?}", first))?;

        Ok(true)
    }
}

/// One rotation check: rotate if needed, then point `sink` at a fresh file
/// if the primary path was rotated away or has gone missing.
///
/// Returns whether the sink was reopened. Failures are logged only.
pub fn rotation_tick(rotator: &LogRotator, sink: &LogSink) -> bool {
    let rotated = match rotator.rotate_if_needed() {
        Ok(rotated) => rotated,
        Err(e) => {
            error!(error = %format!("{e:#}"), "log rotation check failed");
            return false;
        }
    };

    if !rotated && rotator.path().exists() {
        return false;
    }

    match sink.reopen() {
        Ok(()) => {
            info!(path = ?rotator.path(), rotated, "log file reopened");
            true
        }
        Err(e) => {
            warn!(path = ?rotator.path(), error = %e, "failed to reopen log file");
            false
        }
    }
}

/// Shortest accepted period between rotation checks.
const MIN_ROTATION_PERIOD: Duration = Duration::from_secs(1);

/// Spawn the periodic rotation task. The first check runs one `period` after
/// the call; the startup check is done separately before the sink is opened.
///
/// Periods below one second are raised to one second.
pub fn spawn_log_rotator(rotator: LogRotator, sink: LogSink, period: Duration) -> JoinHandle<()> {
    if period < MIN_ROTATION_PERIOD {
        warn!(?period, "rotation period too short, using 1s");
    }
    let period = period.max(MIN_ROTATION_PERIOD);

    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            rotation_tick(&rotator, &sink);
        }
    })
}
