pub mod buffer;
pub mod builders;
pub mod fake_launcher;

use std::future::Future;
use std::sync::{Arc, Once};
use std::time::Duration;

use stream_runner::logfile::LogSink;
use stream_runner::supervisor::WorkerEnv;
use tokio::time::{Instant, sleep};
use tracing_subscriber::{EnvFilter, fmt};

use crate::buffer::SharedBuffer;
use crate::fake_launcher::FakeLauncher;

static INIT: Once = Once::new();

/// Initialise tracing for tests.
///
/// - Uses `with_test_writer()`, so logs are captured per-test.
/// - The Rust test harness only prints captured output for **failing** tests
///   (unless you run with `-- --nocapture`).
///
/// Enable levels with e.g.:
/// `RUST_LOG=debug cargo test`
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer() // print only for failing tests unless --nocapture
            .with_target(true)
            .init();
    });
}

/// Run a future with a 5-second timeout.
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: Future<Output = T>,
{
    tokio::time::timeout(Duration::from_secs(5), f)
        .await
        .expect("Test timed out after 5 seconds")
}

/// Poll `check` every 10ms until it returns true. Gives up after 5 seconds
/// and returns false.
pub async fn wait_until<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        if check().await {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        sleep(Duration::from_millis(10)).await;
    }
}

/// Worker environment backed by `launcher`, logging into an in-memory buffer,
/// with a short backoff so restart paths run quickly.
pub fn fake_env(launcher: &FakeLauncher) -> (WorkerEnv, SharedBuffer) {
    fake_env_with_backoff(launcher, Duration::from_millis(20))
}

pub fn fake_env_with_backoff(launcher: &FakeLauncher, backoff: Duration) -> (WorkerEnv, SharedBuffer) {
    let buffer = SharedBuffer::new();
    let env = WorkerEnv::new(
        Arc::new(launcher.clone()),
        LogSink::from_writer(buffer.clone()),
        backoff,
    );
    (env, buffer)
}
