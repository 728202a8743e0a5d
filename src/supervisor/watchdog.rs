// src/supervisor/watchdog.rs

use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::WatchdogSettings;
use crate::supervisor::registry::Registry;

/// One watchdog pass: force-kill every worker that is not live.
///
/// The pass works on a snapshot and drops the registry lock before the first
/// kill, so a reload never waits behind `settle` delays. A reconcile can thus
/// land mid-pass: a worker it removed is still in the snapshot (killing a
/// stopped worker is a no-op), and a worker it just restarted may get one
/// extra kill, which its own loop relaunches after backoff.
///
/// Killing a dead worker just makes sure its last relay is reaped;
/// relaunching is left to the worker's own loop. Returns how many workers
/// were reaped.
pub async fn watchdog_pass(registry: &Registry, settings: &WatchdogSettings) -> usize {
    let mut reaped = 0;

    for worker in registry.snapshot().await {
        if worker.is_running().await {
            continue;
        }

        warn!(stream_id = %worker.id(), "worker not running, force kill & restart");
        worker.force_kill().await;
        reaped += 1;
        sleep(settings.settle).await;
    }

    debug!(reaped, "watchdog pass finished");
    reaped
}

/// Spawn the watchdog task. It waits `settings.grace` before its first pass
/// and then runs one pass every `settings.interval`.
pub fn spawn_watchdog(registry: Registry, settings: WatchdogSettings) -> JoinHandle<()> {
    tokio::spawn(async move {
        sleep(settings.grace).await;
        loop {
            sleep(settings.interval).await;
            watchdog_pass(&registry, &settings).await;
        }
    })
}
