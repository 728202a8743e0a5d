// tests/startup.rs
//
// `run()` installs the global tracing subscriber, so everything that calls it
// lives in this one test binary.

#![cfg(target_os = "linux")]

mod common;
use crate::common::write_stub_relay;

use clap::Parser;
use tempfile::tempdir;

use stream_runner::cli::CliArgs;
use stream_runner::errors::StreamRunnerError;

#[tokio::test]
async fn malformed_config_at_startup_is_fatal_and_starts_nothing() {
    let dir = tempdir().unwrap();
    let marker = dir.path().join("launched");
    let relay = write_stub_relay(
        dir.path(),
        "relay",
        &format!("touch {}\nexec sleep 30", marker.display()),
    );
    let config = dir.path().join("streams.toml");
    std::fs::write(&config, "[[stream]]\nid = \"cam-1\"\nsrc = ").unwrap();
    let log_file = dir.path().join("log/stream.log");
    let pid_file = dir.path().join("stream-runner.pid");

    let args = CliArgs::parse_from([
        "stream-runner",
        "--config",
        config.to_str().unwrap(),
        "--log-file",
        log_file.to_str().unwrap(),
        "--pid-file",
        pid_file.to_str().unwrap(),
        "--program",
        relay.to_str().unwrap(),
        "--skip-relay-check",
    ]);

    let result = stream_runner::run(args).await;

    assert!(
        matches!(result, Err(StreamRunnerError::TomlError(_))),
        "unexpected result: {result:?}"
    );
    assert!(!pid_file.exists());
    assert!(log_file.exists());
    assert!(!marker.exists());
}
