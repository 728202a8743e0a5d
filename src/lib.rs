// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logfile;
pub mod logging;
pub mod pidfile;
pub mod supervisor;
pub mod types;

use std::fs;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{error, info};

use crate::cli::CliArgs;
use crate::config::{ConfigFile, Settings, load_and_validate};
use crate::engine::{ControlEvent, ControlLoop, spawn_signal_listener};
use crate::errors::{Result, StreamRunnerError};
use crate::exec::{RelayLauncher, check_relay};
use crate::logfile::{LogRotator, LogSink, spawn_log_rotator};
use crate::pidfile::PidFile;
use crate::supervisor::{Registry, WorkerEnv, reconcile, spawn_watchdog};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - relay check
/// - log file (startup rotation, sink, tracing)
/// - PID file
/// - initial config load + reconcile
/// - watchdog and log rotation tasks
/// - signal handling and the control loop
///
/// Returns once a shutdown signal has been handled. Any error returned is
/// fatal for the process.
pub async fn run(args: CliArgs) -> Result<()> {
    let settings = Settings::from(&args);

    if args.dry_run {
        let cfg = load_and_validate(&settings.config_path)?;
        print_dry_run(&settings, &cfg);
        return Ok(());
    }

    if settings.check_relay {
        let version = check_relay(&settings.relay.program).await?;
        eprintln!("[*] relay detected: {version}");
    }

    let sink = open_log_sink(&settings)?;
    logging::init_logging(args.log_level, settings.log_format, sink.clone())?;

    let pid_file = PidFile::write(&settings.pid_file)?;
    info!(pid = std::process::id(), "stream-runner starting");

    // Signal handlers go in before any relay is launched.
    let (control_tx, control_rx) = mpsc::channel::<ControlEvent>(8);
    if let Err(e) = spawn_signal_listener(control_tx) {
        error!(error = %e, "failed to install signal handlers");
        pid_file.remove();
        return Err(e.into());
    }

    let desired = match load_and_validate(&settings.config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!(path = ?settings.config_path, error = %e, "initial config load failed");
            pid_file.remove();
            return Err(e);
        }
    };

    let registry = Registry::new();
    let launcher = Arc::new(RelayLauncher::new(settings.relay.clone()));
    let env = WorkerEnv::new(launcher, sink.clone(), settings.backoff);

    let plan = reconcile(&desired, &registry, &env).await;
    info!(workers = plan.add.len(), "initial workers started");

    spawn_watchdog(registry.clone(), settings.watchdog);
    spawn_log_rotator(
        LogRotator::from_settings(&settings.log_file, &settings.rotation),
        sink,
        settings.rotation.interval,
    );

    ControlLoop::new(registry, env, &settings.config_path, control_rx)
        .with_pid_file(pid_file)
        .run()
        .await
}

/// Create the log directory, rotate a leftover oversized file, and open the
/// sink. Runs before `tracing` is set up, so problems go to stderr.
fn open_log_sink(settings: &Settings) -> Result<LogSink> {
    if let Some(dir) = settings.log_file.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(dir).map_err(|e| {
            StreamRunnerError::LogSetup(format!("failed to create log directory {dir:?}: {e}"))
        })?;
    }

    let rotator = LogRotator::from_settings(&settings.log_file, &settings.rotation);
    if let Err(e) = rotator.rotate_if_needed() {
        eprintln!("log rotation failed: {e:#}");
    }

    LogSink::open(&settings.log_file).map_err(|e| {
        StreamRunnerError::LogSetup(format!(
            "failed to open log file {:?}: {e}",
            settings.log_file
        ))
    })
}

/// Simple dry-run output: print settings and the streams that would run.
fn print_dry_run(settings: &Settings, cfg: &ConfigFile) {
    println!("stream-runner dry-run");
    println!("  relay = {}", settings.relay.program);
    println!("  rw_timeout_us = {}", settings.relay.rw_timeout_us);
    println!("  container = {}", settings.relay.container);
    println!("  log_file = {}", settings.log_file.display());
    println!();

    println!("streams ({}):", cfg.len());
    for (id, stream) in cfg.streams() {
        println!("  - {id}");
        println!("      src: {}", stream.source);
        println!("      dst: {}", stream.destination);
    }
}
