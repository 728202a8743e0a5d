// tests/worker_lifecycle.rs

mod common;
use crate::common::{init_tracing, wait_until, with_timeout};

use std::time::Duration;

use stream_runner::config::WorkerConfig;
use stream_runner::exec::ProcessHandle;
use stream_runner::supervisor::Worker;
use stream_runner::types::ExitOutcome;
use stream_runner_test_utils::fake_launcher::FakeLauncher;
use stream_runner_test_utils::{fake_env, fake_env_with_backoff};

fn cam(id: &str) -> WorkerConfig {
    WorkerConfig::new(id, format!("rtmp://src.test/{id}"), format!("rtmp://dst.test/{id}"))
}

#[tokio::test]
async fn start_launches_a_relay_and_marks_live() {
    init_tracing();
    let launcher = FakeLauncher::new();
    let (env, _) = fake_env(&launcher);
    let worker = Worker::new(cam("cam-1"), env);

    assert!(!worker.is_running().await);
    worker.start().await;

    assert!(wait_until(|| async { worker.is_running().await }).await);
    assert_eq!(launcher.launch_count("cam-1"), 1);
    assert_eq!(launcher.launches()[0], cam("cam-1"));

    let status = worker.status().await;
    assert!(status.supervised);
    assert_eq!(status.starts, 1);
    assert_eq!(status.launches, 1);
    assert_eq!(status.pid, launcher.latest("cam-1").and_then(|p| p.pid()));

    with_timeout(worker.stop()).await;
}

#[tokio::test]
async fn start_twice_keeps_a_single_loop() {
    init_tracing();
    let launcher = FakeLauncher::new();
    let (env, _) = fake_env(&launcher);
    let worker = Worker::new(cam("cam-1"), env);

    worker.start().await;
    worker.start().await;
    assert!(wait_until(|| async { worker.is_running().await }).await);
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(launcher.launch_count("cam-1"), 1);
    assert_eq!(worker.status().await.starts, 1);

    with_timeout(worker.stop()).await;
}

#[tokio::test]
async fn crashed_relay_is_relaunched_after_backoff() {
    init_tracing();
    let launcher = FakeLauncher::new();
    let (env, _) = fake_env(&launcher);
    let worker = Worker::new(cam("cam-1"), env);

    worker.start().await;
    assert!(wait_until(|| async { worker.is_running().await }).await);

    let first = launcher.latest("cam-1").unwrap();
    first.exit(ExitOutcome::Failed {
        code: Some(1),
        signal: None,
    });

    assert!(
        wait_until(|| async { launcher.launch_count("cam-1") == 2 && worker.is_running().await })
            .await
    );

    let status = worker.status().await;
    assert_eq!(
        status.last_exit,
        Some(ExitOutcome::Failed {
            code: Some(1),
            signal: None
        })
    );
    assert_eq!(status.starts, 1);

    with_timeout(worker.stop()).await;
}

#[tokio::test]
async fn clean_exit_is_relaunched_too() {
    init_tracing();
    let launcher = FakeLauncher::new();
    let (env, _) = fake_env(&launcher);
    let worker = Worker::new(cam("cam-1"), env);

    worker.start().await;
    assert!(wait_until(|| async { launcher.launch_count("cam-1") == 1 }).await);
    launcher.latest("cam-1").unwrap().exit(ExitOutcome::Success);

    assert!(wait_until(|| async { launcher.launch_count("cam-1") == 2 }).await);
    assert_eq!(worker.status().await.last_exit, Some(ExitOutcome::Success));

    with_timeout(worker.stop()).await;
}

#[tokio::test]
async fn force_kill_clears_liveness_and_loop_relaunches() {
    init_tracing();
    let launcher = FakeLauncher::new();
    let (env, _) = fake_env_with_backoff(&launcher, Duration::from_millis(300));
    let worker = Worker::new(cam("cam-1"), env);

    worker.start().await;
    assert!(wait_until(|| async { worker.is_running().await }).await);
    let first = launcher.latest("cam-1").unwrap();

    with_timeout(worker.force_kill()).await;

    assert!(!worker.is_running().await);
    assert!(!first.is_alive());
    assert_eq!(first.group_kills(), 1);
    assert_eq!(first.direct_kills(), 0);
    assert!(first.reaps() >= 1);

    let status = worker.status().await;
    assert_eq!(status.force_kills, 1);
    assert_eq!(status.pid, None);
    assert!(status.supervised);

    assert!(
        wait_until(|| async { launcher.launch_count("cam-1") == 2 && worker.is_running().await })
            .await
    );

    with_timeout(worker.stop()).await;
}

#[tokio::test]
async fn force_kill_is_idempotent() {
    init_tracing();
    let launcher = FakeLauncher::new();
    let (env, _) = fake_env_with_backoff(&launcher, Duration::from_secs(2));
    let worker = Worker::new(cam("cam-1"), env);

    worker.start().await;
    assert!(wait_until(|| async { worker.is_running().await }).await);
    let first = launcher.latest("cam-1").unwrap();

    with_timeout(worker.force_kill()).await;
    with_timeout(worker.force_kill()).await;

    assert!(!worker.is_running().await);
    assert_eq!(first.group_kills(), 1);
    assert_eq!(worker.status().await.force_kills, 2);

    with_timeout(worker.stop()).await;
}

#[tokio::test]
async fn force_kill_on_a_never_started_worker_is_harmless() {
    init_tracing();
    let launcher = FakeLauncher::new();
    let (env, _) = fake_env(&launcher);
    let worker = Worker::new(cam("cam-1"), env);

    with_timeout(worker.force_kill()).await;

    assert!(!worker.is_running().await);
    assert_eq!(launcher.launch_count("cam-1"), 0);
}

#[tokio::test]
async fn stop_kills_and_retires_the_loop() {
    init_tracing();
    let launcher = FakeLauncher::new();
    let (env, _) = fake_env(&launcher);
    let worker = Worker::new(cam("cam-1"), env);

    worker.start().await;
    assert!(wait_until(|| async { worker.is_running().await }).await);
    let relay = launcher.latest("cam-1").unwrap();

    with_timeout(worker.stop()).await;

    assert!(!worker.is_running().await);
    assert!(!relay.is_alive());
    let status = worker.status().await;
    assert!(!status.supervised);
    assert_eq!(status.stops, 1);

    // Well past several backoff periods: nothing comes back.
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(launcher.launch_count("cam-1"), 1);
    assert_eq!(launcher.alive_count(), 0);
}

#[tokio::test]
async fn stop_then_start_supervises_again() {
    init_tracing();
    let launcher = FakeLauncher::new();
    let (env, _) = fake_env(&launcher);
    let worker = Worker::new(cam("cam-1"), env);

    worker.start().await;
    assert!(wait_until(|| async { worker.is_running().await }).await);
    with_timeout(worker.stop()).await;

    worker.replace_config(WorkerConfig::new("cam-1", "rtmp://src.test/new", "rtmp://dst.test/new")).await;
    worker.start().await;

    assert!(wait_until(|| async { launcher.launch_count("cam-1") == 2 }).await);
    assert_eq!(launcher.launches()[1].source, "rtmp://src.test/new");
    assert_eq!(worker.status().await.starts, 2);

    with_timeout(worker.stop()).await;
    assert_eq!(launcher.alive_count(), 0);
}

#[tokio::test]
async fn failed_launches_keep_retrying_without_going_live() {
    init_tracing();
    let launcher = FakeLauncher::new();
    launcher.fail_launches_for("cam-1");
    let (env, _) = fake_env(&launcher);
    let worker = Worker::new(cam("cam-1"), env);

    worker.start().await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    let status = worker.status().await;
    assert!(!status.live);
    assert!(status.supervised);
    assert_eq!(status.launches, 0);

    with_timeout(worker.stop()).await;
}

#[tokio::test]
async fn group_kill_failure_falls_back_to_direct_kill() {
    init_tracing();
    let launcher = FakeLauncher::new();
    launcher.fail_group_kills();
    let (env, _) = fake_env(&launcher);
    let worker = Worker::new(cam("cam-1"), env);

    worker.start().await;
    assert!(wait_until(|| async { worker.is_running().await }).await);
    let relay = launcher.latest("cam-1").unwrap();

    with_timeout(worker.stop()).await;

    assert_eq!(relay.group_kills(), 1);
    assert_eq!(relay.direct_kills(), 1);
    assert!(!relay.is_alive());
    assert!(!worker.is_running().await);
}

#[tokio::test]
async fn relay_output_is_prefixed_with_the_worker_id() {
    init_tracing();
    let launcher = FakeLauncher::new();
    launcher.emit_on_stdout("cam-7", b"Input #0, flv\nStream mapping:\n");
    let (env, buffer) = fake_env(&launcher);
    let worker = Worker::new(cam("cam-7"), env);

    worker.start().await;
    assert!(
        wait_until(|| async { buffer.lines().iter().any(|l| l.ends_with("] [cam-7] Stream mapping:")) })
            .await
    );

    let lines = buffer.lines();
    assert!(lines.iter().any(|l| l.ends_with("] [cam-7] Input #0, flv")));
    assert!(lines.iter().all(|l| l.starts_with('[')));

    with_timeout(worker.stop()).await;
}
