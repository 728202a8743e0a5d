// src/supervisor/worker.rs

//! One supervised relay: launch, capture, wait, back off, repeat.
//!
//! ```text
//! idle --start()--> starting --launch ok--> running --exit+drain--> backoff
//!                      |                                              |
//!                      +--launch failed---------------------------> backoff
//!                                                                     |
//!                   starting <------------- backoff delay ------------+
//! ```
//!
//! `force_kill()` kills the current relay at any point; the loop notices the
//! exit and launches a new one after the backoff. `stop()` retires the loop
//! first, so the kill is final.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, warn};

use crate::config::WorkerConfig;
use crate::exec::{LineTimestampWriter, ProcessHandle, ProcessLauncher, is_already_gone, pump_output};
use crate::logfile::LogSink;
use crate::types::{ExitOutcome, StreamKind};

/// Upper bound on waiting for a killed relay to be reaped.
const REAP_TIMEOUT: Duration = Duration::from_secs(10);

/// Dependencies shared by every worker.
#[derive(Clone)]
pub struct WorkerEnv {
    pub launcher: Arc<dyn ProcessLauncher>,
    pub sink: LogSink,
    pub backoff: Duration,
}

impl WorkerEnv {
    pub fn new(launcher: Arc<dyn ProcessLauncher>, sink: LogSink, backoff: Duration) -> Self {
        Self {
            launcher,
            sink,
            backoff,
        }
    }
}

impl std::fmt::Debug for WorkerEnv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerEnv")
            .field("sink", &self.sink)
            .field("backoff", &self.backoff)
            .finish_non_exhaustive()
    }
}

/// Point-in-time view of a worker, for logs and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerStatus {
    pub config: WorkerConfig,
    pub live: bool,
    pub pid: Option<u32>,
    /// Whether a supervision loop is currently assigned to this worker.
    pub supervised: bool,
    pub starts: u64,
    pub stops: u64,
    pub force_kills: u64,
    pub launches: u64,
    pub last_exit: Option<ExitOutcome>,
}

struct WorkerState {
    config: WorkerConfig,
    live: bool,
    child: Option<Arc<dyn ProcessHandle>>,
    /// Bumped by every `start()`; a loop only acts while its generation is
    /// current and `supervised` is set.
    generation: u64,
    supervised: bool,
    starts: u64,
    stops: u64,
    force_kills: u64,
    launches: u64,
    last_exit: Option<ExitOutcome>,
}

impl WorkerState {
    fn owns(&self, generation: u64) -> bool {
        self.supervised && self.generation == generation
    }
}

enum Launch {
    Retired,
    Failed,
    Running(RunningRelay),
}

struct RunningRelay {
    handle: Arc<dyn ProcessHandle>,
    pumps: [JoinHandle<()>; 2],
}

/// Supervisor for a single stream.
pub struct Worker {
    id: String,
    env: WorkerEnv,
    state: Mutex<WorkerState>,
}

impl Worker {
    pub fn new(config: WorkerConfig, env: WorkerEnv) -> Arc<Self> {
        Arc::new(Self {
            id: config.id.clone(),
            env,
            state: Mutex::new(WorkerState {
                config,
                live: false,
                child: None,
                generation: 0,
                supervised: false,
                starts: 0,
                stops: 0,
                force_kills: 0,
                launches: 0,
                last_exit: None,
            }),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub async fn config(&self) -> WorkerConfig {
        self.state.lock().await.config.clone()
    }

    /// Liveness flag: the supervisor has launched a relay and not yet seen
    /// it die. Says nothing stronger about the OS process.
    pub async fn is_running(&self) -> bool {
        self.state.lock().await.live
    }

    pub async fn status(&self) -> WorkerStatus {
        let st = self.state.lock().await;
        WorkerStatus {
            config: st.config.clone(),
            live: st.live,
            pid: st.child.as_ref().and_then(|c| c.pid()),
            supervised: st.supervised,
            starts: st.starts,
            stops: st.stops,
            force_kills: st.force_kills,
            launches: st.launches,
            last_exit: st.last_exit,
        }
    }

    /// Begin supervising: spawn the loop that keeps a relay running.
    ///
    /// No-op if a loop is already assigned.
    pub async fn start(self: &Arc<Self>) {
        let generation = {
            let mut st = self.state.lock().await;
            if st.supervised {
                debug!(stream_id = %self.id, "worker already supervised; start ignored");
                return;
            }
            st.generation += 1;
            st.supervised = true;
            st.starts += 1;
            st.generation
        };

        let worker = Arc::clone(self);
        tokio::spawn(async move {
            worker.supervise(generation).await;
        });
    }

    /// Kill the current relay (whole process group) and reap it.
    ///
    /// Idempotent; on a worker with no relay it only clears liveness. The
    /// supervision loop, if any, keeps going and relaunches after backoff.
    pub async fn force_kill(&self) {
        let mut st = self.state.lock().await;
        st.force_kills += 1;
        self.kill_child(&mut st).await;
    }

    /// Retire the supervision loop, then kill and reap the relay.
    ///
    /// After this returns no relay is running for this worker and none will
    /// be launched until the next `start()`.
    pub async fn stop(&self) {
        let mut st = self.state.lock().await;
        st.supervised = false;
        st.stops += 1;
        self.kill_child(&mut st).await;
    }

    /// Swap in a new config. Takes effect at the next launch; callers stop
    /// the worker first so that is a fresh `start()`.
    pub async fn replace_config(&self, config: WorkerConfig) {
        let mut st = self.state.lock().await;
        st.config = config;
    }

    async fn kill_child(&self, st: &mut WorkerState) {
        let Some(handle) = st.child.take() else {
            st.live = false;
            return;
        };

        let pid = handle.pid();
        info!(stream_id = %self.id, ?pid, "force killing relay process group");

        if let Err(e) = handle.terminate_group() {
            warn!(stream_id = %self.id, error = %e, "group kill failed, trying direct kill");
            if let Err(e) = handle.terminate_direct() {
                if is_already_gone(&e) {
                    debug!(stream_id = %self.id, error = %e, "relay already gone");
                } else {
                    warn!(stream_id = %self.id, error = %e, "direct kill also failed");
                }
            }
        }

        match timeout(REAP_TIMEOUT, handle.reap()).await {
            Ok(Ok(outcome)) => {
                debug!(stream_id = %self.id, ?pid, %outcome, "relay reaped");
                st.last_exit = Some(outcome);
            }
            Ok(Err(e)) if is_already_gone(&e) => {
                debug!(stream_id = %self.id, ?pid, "relay was already reaped");
            }
            Ok(Err(e)) => {
                warn!(stream_id = %self.id, ?pid, error = %e, "failed to reap relay");
            }
            Err(_) => {
                warn!(stream_id = %self.id, ?pid, "relay not reaped in time after kill");
            }
        }

        st.live = false;
    }

    async fn supervise(self: Arc<Self>, generation: u64) {
        debug!(stream_id = %self.id, generation, "supervision loop started");

        loop {
            match self.launch(generation).await {
                Launch::Retired => break,
                Launch::Failed => {}
                Launch::Running(relay) => self.wait_for_exit(relay).await,
            }

            if !self.state.lock().await.owns(generation) {
                break;
            }

            info!(
                stream_id = %self.id,
                backoff = ?self.env.backoff,
                "stream ended, retrying after backoff"
            );
            sleep(self.env.backoff).await;
        }

        debug!(stream_id = %self.id, generation, "supervision loop retired");
    }

    async fn launch(&self, generation: u64) -> Launch {
        let mut st = self.state.lock().await;
        if !st.owns(generation) {
            return Launch::Retired;
        }

        info!(stream_id = %self.id, "starting relay");
        let process = match self.env.launcher.launch(&st.config) {
            Ok(process) => process,
            Err(e) => {
                error!(stream_id = %self.id, error = %format!("{e:#}"), "failed to start relay");
                return Launch::Failed;
            }
        };

        st.child = Some(Arc::clone(&process.handle));
        st.live = true;
        st.launches += 1;

        let stdout = LineTimestampWriter::new(self.id.clone(), self.env.sink.clone());
        let stderr = LineTimestampWriter::new(self.id.clone(), self.env.sink.clone());
        let pumps = [
            tokio::spawn(pump_output(process.stdout, stdout, StreamKind::Stdout)),
            tokio::spawn(pump_output(process.stderr, stderr, StreamKind::Stderr)),
        ];

        Launch::Running(RunningRelay {
            handle: process.handle,
            pumps,
        })
    }

    /// Block until the relay has exited and both pumps have drained, then
    /// clear liveness unless a concurrent kill already did.
    async fn wait_for_exit(&self, relay: RunningRelay) {
        let outcome = relay.handle.reap().await;

        for pump in relay.pumps {
            if let Err(e) = pump.await {
                warn!(stream_id = %self.id, error = %e, "output pump task failed");
            }
        }

        let mut st = self.state.lock().await;
        let still_ours = st
            .child
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(current, &relay.handle));
        if still_ours {
            st.child = None;
            st.live = false;
        }

        match outcome {
            Ok(outcome) => {
                st.last_exit = Some(outcome);
                if outcome.is_success() {
                    info!(stream_id = %self.id, %outcome, "relay exited");
                } else {
                    error!(stream_id = %self.id, %outcome, "relay error");
                }
            }
            Err(e) if is_already_gone(&e) => {
                debug!(stream_id = %self.id, "relay reaped elsewhere");
            }
            Err(e) => {
                error!(stream_id = %self.id, error = %e, "failed to wait for relay");
            }
        }
    }
}

impl std::fmt::Debug for Worker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worker")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}
