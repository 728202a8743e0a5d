// src/engine/control.rs

use std::fmt;
use std::path::PathBuf;

use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::config::load_and_validate;
use crate::errors::Result;
use crate::pidfile::PidFile;
use crate::supervisor::{Registry, WorkerEnv, reconcile};

use super::ControlEvent;

/// Single dispatcher for reload and shutdown requests.
///
/// Reload re-reads the config file and reconciles; a bad file is logged and
/// the running workers are left alone. Shutdown stops every worker, removes
/// the PID file and makes [`ControlLoop::run`] return.
pub struct ControlLoop {
    registry: Registry,
    env: WorkerEnv,
    config_path: PathBuf,
    pid_file: Option<PidFile>,
    event_rx: mpsc::Receiver<ControlEvent>,
}

impl fmt::Debug for ControlLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControlLoop")
            .field("config_path", &self.config_path)
            .field("pid_file", &self.pid_file)
            .finish_non_exhaustive()
    }
}

impl ControlLoop {
    pub fn new(
        registry: Registry,
        env: WorkerEnv,
        config_path: impl Into<PathBuf>,
        event_rx: mpsc::Receiver<ControlEvent>,
    ) -> Self {
        Self {
            registry,
            env,
            config_path: config_path.into(),
            pid_file: None,
            event_rx,
        }
    }

    /// Remove this PID file as the last step of shutdown.
    pub fn with_pid_file(mut self, pid_file: PidFile) -> Self {
        self.pid_file = Some(pid_file);
        self
    }

    /// Main loop. Returns only after a shutdown has completed.
    ///
    /// A closed event channel is treated like a shutdown request.
    pub async fn run(mut self) -> Result<()> {
        info!("stream-runner control loop started");

        loop {
            let event = match self.event_rx.recv().await {
                Some(e) => e,
                None => {
                    info!("control channel closed; shutting down");
                    self.shutdown().await;
                    break;
                }
            };

            if !self.handle(event).await {
                break;
            }
        }

        Ok(())
    }

    /// Handle one event. Returns whether the loop should keep running.
    pub async fn handle(&mut self, event: ControlEvent) -> bool {
        debug!(?event, "control loop received event");

        match event {
            ControlEvent::Reload => {
                info!("received SIGHUP, reloading config");
                self.reload().await;
                true
            }
            ControlEvent::Shutdown(signal) => {
                info!(?signal, "received termination signal, shutting down");
                self.shutdown().await;
                false
            }
        }
    }

    async fn reload(&self) {
        let desired = match load_and_validate(&self.config_path) {
            Ok(cfg) => cfg,
            Err(e) => {
                error!(
                    path = ?self.config_path,
                    error = %e,
                    "config reload failed; keeping current workers"
                );
                return;
            }
        };

        let plan = reconcile(&desired, &self.registry, &self.env).await;
        info!(
            added = plan.add.len(),
            removed = plan.remove.len(),
            updated = plan.update.len(),
            unchanged = plan.unchanged.len(),
            "config reloaded successfully"
        );
    }

    async fn shutdown(&mut self) {
        {
            let workers = self.registry.write().await;
            for (id, worker) in workers.iter() {
                info!(stream_id = %id, "stopping worker");
                worker.stop().await;
            }
        }

        if let Some(pid_file) = self.pid_file.take() {
            pid_file.remove();
        }
        info!("shutdown complete");
    }
}
