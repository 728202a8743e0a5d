// tests/relay_process.rs
//
// Drives real child processes through `RelayLauncher`, using small shell
// scripts in place of the relay binary.

#![cfg(target_os = "linux")]

mod common;
use crate::common::{init_tracing, process_gone, read_pid, wait_until, with_timeout, write_stub_relay};

use std::sync::Arc;
use std::time::Duration;

use tempfile::tempdir;

use stream_runner::config::{RelaySettings, WorkerConfig};
use stream_runner::exec::{ProcessLauncher, RelayLauncher, check_relay, relay_args};
use stream_runner::logfile::LogSink;
use stream_runner::supervisor::{Worker, WorkerEnv};
use stream_runner::types::ExitOutcome;
use stream_runner_test_utils::buffer::SharedBuffer;

fn relay_settings(program: &std::path::Path) -> RelaySettings {
    RelaySettings {
        program: program.to_string_lossy().into_owned(),
        rw_timeout_us: 2_000_000,
        container: "flv".to_string(),
    }
}

fn env_for(settings: RelaySettings, backoff: Duration) -> (WorkerEnv, SharedBuffer) {
    let buffer = SharedBuffer::new();
    let env = WorkerEnv::new(
        Arc::new(RelayLauncher::new(settings)),
        LogSink::from_writer(buffer.clone()),
        backoff,
    );
    (env, buffer)
}

fn cam() -> WorkerConfig {
    WorkerConfig::new("cam-1", "rtmp://src.test/live", "rtmp://dst.test/live")
}

#[test]
fn argument_template_matches_relay_cli() {
    let settings = RelaySettings {
        program: "ffmpeg".to_string(),
        rw_timeout_us: 5_000_000,
        container: "mpegts".to_string(),
    };

    assert_eq!(
        relay_args(&settings, &cam()),
        vec![
            "-rw_timeout",
            "5000000",
            "-i",
            "rtmp://src.test/live",
            "-c",
            "copy",
            "-f",
            "mpegts",
            "rtmp://dst.test/live",
        ]
    );
}

#[tokio::test]
async fn relay_receives_arguments_and_output_is_captured() {
    init_tracing();
    let dir = tempdir().unwrap();
    let stub = write_stub_relay(dir.path(), "relay", "echo \"args: $*\"\necho 'to stderr' >&2\nexec sleep 30");
    let (env, buffer) = env_for(relay_settings(&stub), Duration::from_millis(300));
    let worker = Worker::new(cam(), env);

    worker.start().await;

    assert!(
        wait_until(|| async {
            let text = buffer.contents();
            text.contains("to stderr") && text.contains("args:")
        })
        .await,
        "captured output: {}",
        buffer.contents()
    );

    let lines = buffer.lines();
    assert!(lines.iter().any(|l| l.ends_with(
        "] [cam-1] args: -rw_timeout 2000000 -i rtmp://src.test/live -c copy -f flv rtmp://dst.test/live"
    )));
    assert!(lines.iter().any(|l| l.ends_with("] [cam-1] to stderr")));

    with_timeout(worker.stop()).await;
}

#[tokio::test]
async fn force_kill_takes_down_the_whole_process_group() {
    init_tracing();
    let dir = tempdir().unwrap();
    let grandchild_file = dir.path().join("grandchild.pid");
    let stub = write_stub_relay(
        dir.path(),
        "relay",
        &format!(
            "sleep 30 &\necho $! > {}\nwait",
            grandchild_file.display()
        ),
    );
    let (env, _) = env_for(relay_settings(&stub), Duration::from_millis(500));
    let worker = Worker::new(cam(), env);

    worker.start().await;
    assert!(wait_until(|| async { read_pid(&grandchild_file).is_some() }).await);
    let grandchild = read_pid(&grandchild_file).unwrap();
    let leader = worker.status().await.pid.expect("relay pid");

    with_timeout(worker.force_kill()).await;

    assert!(!worker.is_running().await);
    assert!(process_gone(leader), "relay {leader} still running");
    assert!(
        wait_until(|| async { process_gone(grandchild) }).await,
        "grandchild {grandchild} survived the group kill"
    );
    assert_eq!(
        worker.status().await.last_exit,
        Some(ExitOutcome::Failed {
            code: None,
            signal: Some(9)
        })
    );

    with_timeout(worker.stop()).await;
}

#[tokio::test]
async fn stop_leaves_no_relay_behind() {
    init_tracing();
    let dir = tempdir().unwrap();
    let stub = write_stub_relay(dir.path(), "relay", "exec sleep 30");
    let (env, _) = env_for(relay_settings(&stub), Duration::from_millis(300));
    let worker = Worker::new(cam(), env);

    worker.start().await;
    assert!(wait_until(|| async { worker.status().await.pid.is_some() }).await);
    let pid = worker.status().await.pid.unwrap();

    with_timeout(worker.stop()).await;

    assert!(!worker.is_running().await);
    assert!(process_gone(pid));
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(worker.status().await.launches, 1);
}

#[tokio::test]
async fn exiting_relay_is_restarted() {
    init_tracing();
    let dir = tempdir().unwrap();
    let stub = write_stub_relay(dir.path(), "relay", "echo started\nexit 3");
    let (env, buffer) = env_for(relay_settings(&stub), Duration::from_millis(50));
    let worker = Worker::new(cam(), env);

    worker.start().await;

    assert!(wait_until(|| async { worker.status().await.launches >= 2 }).await);
    assert_eq!(
        worker.status().await.last_exit,
        Some(ExitOutcome::Failed {
            code: Some(3),
            signal: None
        })
    );
    assert!(buffer.lines().iter().filter(|l| l.ends_with("] [cam-1] started")).count() >= 1);

    with_timeout(worker.stop()).await;
}

#[tokio::test]
async fn missing_program_fails_the_launch() {
    let settings = RelaySettings {
        program: "/nonexistent/relay-binary".to_string(),
        ..RelaySettings::default()
    };

    let err = RelayLauncher::new(settings).launch(&cam()).err().unwrap();
    assert!(format!("{err:#}").contains("cam-1"));
}

#[tokio::test]
async fn relay_check_reports_first_version_line() {
    let dir = tempdir().unwrap();
    let stub = write_stub_relay(
        dir.path(),
        "relay",
        "[ \"$1\" = -version ] || exit 2\necho 'relay version 6.1'\necho 'built with cc'",
    );

    let version = check_relay(&stub.to_string_lossy()).await.unwrap();
    assert_eq!(version, "relay version 6.1");
}

#[tokio::test]
async fn relay_check_rejects_missing_or_failing_program() {
    let dir = tempdir().unwrap();
    let failing = write_stub_relay(dir.path(), "relay", "exit 1");

    assert!(check_relay("/nonexistent/relay-binary").await.is_err());
    assert!(check_relay(&failing.to_string_lossy()).await.is_err());
}
