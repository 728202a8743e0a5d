// src/config/settings.rs

//! Runtime tunables. These come from the command line and, unlike the stream
//! list, are fixed for the lifetime of the process.

use std::path::PathBuf;
use std::time::Duration;

use crate::cli::CliArgs;
use crate::types::LogFormat;

/// How the relay executable is invoked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelaySettings {
    pub program: String,
    pub rw_timeout_us: u64,
    pub container: String,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            program: "ffmpeg".to_string(),
            rw_timeout_us: 2_000_000,
            container: "flv".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchdogSettings {
    /// Delay before the first pass, so freshly started workers are not
    /// reaped while they are still launching.
    pub grace: Duration,
    pub interval: Duration,
    /// Pause after each reaped worker.
    pub settle: Duration,
}

impl Default for WatchdogSettings {
    fn default() -> Self {
        Self {
            grace: Duration::from_secs(10),
            interval: Duration::from_secs(5),
            settle: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationSettings {
    pub max_bytes: u64,
    pub max_files: usize,
    pub interval: Duration,
}

impl Default for RotationSettings {
    fn default() -> Self {
        Self {
            max_bytes: 100 * 1024 * 1024,
            max_files: 5,
            interval: Duration::from_secs(60 * 60),
        }
    }
}

/// Everything `run` needs besides the stream list.
#[derive(Debug, Clone)]
pub struct Settings {
    pub config_path: PathBuf,
    pub log_file: PathBuf,
    pub log_format: LogFormat,
    pub pid_file: PathBuf,
    pub relay: RelaySettings,
    pub backoff: Duration,
    pub watchdog: WatchdogSettings,
    pub rotation: RotationSettings,
    pub check_relay: bool,
}

impl From<&CliArgs> for Settings {
    fn from(args: &CliArgs) -> Self {
        Self {
            config_path: PathBuf::from(&args.config),
            log_file: PathBuf::from(&args.log_file),
            log_format: args.log_format,
            pid_file: PathBuf::from(&args.pid_file),
            relay: RelaySettings {
                program: args.program.clone(),
                rw_timeout_us: args.rw_timeout_us,
                container: args.container.clone(),
            },
            backoff: args.backoff,
            watchdog: WatchdogSettings {
                grace: args.watchdog_grace,
                interval: args.watchdog_interval,
                settle: args.watchdog_settle,
            },
            rotation: RotationSettings {
                max_bytes: args.max_log_size,
                max_files: args.max_log_files,
                interval: args.rotate_interval,
            },
            check_relay: !args.skip_relay_check,
        }
    }
}
