// src/cli.rs

//! CLI argument parsing using `clap`.

use std::time::Duration;

use clap::{Parser, ValueEnum};

use crate::types::{LogFormat, parse_duration, parse_nonzero_duration};

/// Command-line arguments for `stream-runner`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "stream-runner",
    version,
    about = "Supervise relay processes that forward media streams.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the stream config file (TOML). Re-read on SIGHUP.
    #[arg(long, value_name = "PATH", default_value = "/etc/stream-runner/streams.toml")]
    pub config: String,

    /// Primary log file. Rotated generations are written next to it.
    #[arg(long, value_name = "PATH", default_value = "/var/log/stream-runner/stream.log")]
    pub log_file: String,

    /// File that receives this process's PID while it runs.
    #[arg(long, value_name = "PATH", default_value = "/var/run/stream-runner.pid")]
    pub pid_file: String,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `STREAM_RUNNER_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Log file format.
    #[arg(long, value_enum, value_name = "FORMAT", default_value = "json")]
    pub log_format: LogFormat,

    /// Relay executable.
    #[arg(long, value_name = "PATH", default_value = "ffmpeg")]
    pub program: String,

    /// Value passed to the relay as `-rw_timeout` (microseconds).
    #[arg(long, value_name = "MICROS", default_value_t = 2_000_000)]
    pub rw_timeout_us: u64,

    /// Output container passed to the relay as `-f`.
    #[arg(long, value_name = "FMT", default_value = "flv")]
    pub container: String,

    /// Delay between a relay exiting and the next launch attempt.
    #[arg(long, value_name = "DUR", default_value = "1s", value_parser = parse_nonzero_duration)]
    pub backoff: Duration,

    /// Time before the watchdog's first pass.
    #[arg(long, value_name = "DUR", default_value = "10s", value_parser = parse_duration)]
    pub watchdog_grace: Duration,

    /// Time between watchdog passes.
    #[arg(long, value_name = "DUR", default_value = "5s", value_parser = parse_nonzero_duration)]
    pub watchdog_interval: Duration,

    /// Pause after the watchdog reaps a worker, before checking the next one.
    #[arg(long, value_name = "DUR", default_value = "1s", value_parser = parse_duration)]
    pub watchdog_settle: Duration,

    /// Time between log rotation checks.
    #[arg(long, value_name = "DUR", default_value = "1h", value_parser = parse_nonzero_duration)]
    pub rotate_interval: Duration,

    /// Rotate the log file once it reaches this many bytes.
    #[arg(long, value_name = "BYTES", default_value_t = 100 * 1024 * 1024)]
    pub max_log_size: u64,

    /// Number of rotated generations to keep.
    #[arg(long, value_name = "N", default_value_t = 5)]
    pub max_log_files: usize,

    /// Do not check that the relay program runs before starting.
    #[arg(long)]
    pub skip_relay_check: bool,

    /// Parse + validate the config, print the streams, but don't launch anything.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
