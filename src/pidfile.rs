// src/pidfile.rs

//! Process-identity file used by init scripts to signal the runner.

use std::fs;
use std::io;
use std::path::PathBuf;

use tracing::warn;

use crate::errors::{Result, StreamRunnerError};

/// A written PID file. Call [`PidFile::remove`] on clean shutdown.
#[derive(Debug)]
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    /// Write `"<pid>\n"` to `path`, creating the parent directory if needed.
    pub fn write(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let pid_file_error = |source| StreamRunnerError::PidFile {
            path: path.clone(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(pid_file_error)?;
        }
        fs::write(&path, format!("{}\n", std::process::id())).map_err(pid_file_error)?;

        Ok(Self { path })
    }

    /// Delete the file. A file that is already gone is fine.
    pub fn remove(&self) {
        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = ?self.path, error = %e, "failed to remove PID file"),
        }
    }
}
