use std::collections::{HashMap, HashSet};
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::bail;
use tokio::io::{AsyncWriteExt, DuplexStream};
use tokio::sync::watch;

use stream_runner::config::WorkerConfig;
use stream_runner::exec::{LaunchedProcess, ProcessHandle, ProcessLauncher, ReapFuture};
use stream_runner::types::ExitOutcome;

const SIGKILL: i32 = 9;

/// A fake launcher whose "processes" live in memory:
/// - records every launch
/// - can be told to fail launches for given stream ids
/// - hands out `FakeProcess` handles that stay alive until killed or
///   explicitly exited.
#[derive(Clone, Default)]
pub struct FakeLauncher {
    inner: Arc<LauncherState>,
}

#[derive(Default)]
struct LauncherState {
    next_pid: AtomicU32,
    launches: Mutex<Vec<WorkerConfig>>,
    failing: Mutex<HashSet<String>>,
    stdout: Mutex<HashMap<String, Vec<u8>>>,
    group_kill_fails: AtomicBool,
    processes: Mutex<Vec<Arc<FakeProcess>>>,
}

impl FakeLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every launch for `id` fails from now on.
    pub fn fail_launches_for(&self, id: &str) {
        self.inner.failing.lock().unwrap().insert(id.to_string());
    }

    /// Every process launched for `id` writes `bytes` to its stdout.
    pub fn emit_on_stdout(&self, id: &str, bytes: &[u8]) {
        self.inner
            .stdout
            .lock()
            .unwrap()
            .insert(id.to_string(), bytes.to_vec());
    }

    /// Processes launched from now on reject group kills.
    pub fn fail_group_kills(&self) {
        self.inner.group_kill_fails.store(true, Ordering::SeqCst);
    }

    /// Configs of every successful launch, in order.
    pub fn launches(&self) -> Vec<WorkerConfig> {
        self.inner.launches.lock().unwrap().clone()
    }

    pub fn launch_count(&self, id: &str) -> usize {
        self.launches().iter().filter(|c| c.id == id).count()
    }

    pub fn processes_for(&self, id: &str) -> Vec<Arc<FakeProcess>> {
        self.inner
            .processes
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.stream_id == id)
            .cloned()
            .collect()
    }

    pub fn latest(&self, id: &str) -> Option<Arc<FakeProcess>> {
        self.processes_for(id).pop()
    }

    pub fn alive_count(&self) -> usize {
        self.inner
            .processes
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.is_alive())
            .count()
    }
}

impl ProcessLauncher for FakeLauncher {
    fn launch(&self, config: &WorkerConfig) -> anyhow::Result<LaunchedProcess> {
        if self.inner.failing.lock().unwrap().contains(&config.id) {
            bail!("fake launch failure for '{}'", config.id);
        }

        let pid = 10_000 + self.inner.next_pid.fetch_add(1, Ordering::SeqCst);
        let (exit_tx, _) = watch::channel(None);
        let process = Arc::new(FakeProcess {
            stream_id: config.id.clone(),
            pid,
            exit_tx,
            group_kill_fails: self.inner.group_kill_fails.load(Ordering::SeqCst),
            group_kills: AtomicUsize::new(0),
            direct_kills: AtomicUsize::new(0),
            reaps: AtomicUsize::new(0),
        });

        let (stdout_reader, stdout_writer) = tokio::io::duplex(64 * 1024);
        let (stderr_reader, stderr_writer) = tokio::io::duplex(64 * 1024);
        let greeting = self
            .inner
            .stdout
            .lock()
            .unwrap()
            .get(&config.id)
            .cloned()
            .unwrap_or_default();
        hold_pipe_open(stdout_writer, greeting, process.exit_tx.subscribe());
        hold_pipe_open(stderr_writer, Vec::new(), process.exit_tx.subscribe());

        self.inner.launches.lock().unwrap().push(config.clone());
        self.inner.processes.lock().unwrap().push(Arc::clone(&process));

        Ok(LaunchedProcess {
            handle: process,
            stdout: Box::new(stdout_reader),
            stderr: Box::new(stderr_reader),
        })
    }
}

/// Write `bytes`, then keep the pipe open until the fake process exits.
fn hold_pipe_open(
    mut writer: DuplexStream,
    bytes: Vec<u8>,
    mut exit_rx: watch::Receiver<Option<ExitOutcome>>,
) {
    tokio::spawn(async move {
        if !bytes.is_empty() {
            let _ = writer.write_all(&bytes).await;
        }
        let _ = exit_rx.wait_for(|outcome| outcome.is_some()).await;
        drop(writer);
    });
}

/// In-memory stand-in for a relay process.
#[derive(Debug)]
pub struct FakeProcess {
    stream_id: String,
    pid: u32,
    exit_tx: watch::Sender<Option<ExitOutcome>>,
    group_kill_fails: bool,
    group_kills: AtomicUsize,
    direct_kills: AtomicUsize,
    reaps: AtomicUsize,
}

impl FakeProcess {
    /// Simulate the relay exiting on its own. Only the first exit counts.
    pub fn exit(&self, outcome: ExitOutcome) {
        self.exit_tx.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(outcome);
            true
        });
    }

    pub fn is_alive(&self) -> bool {
        self.exit_tx.borrow().is_none()
    }

    pub fn stream_id(&self) -> &str {
        &self.stream_id
    }

    pub fn group_kills(&self) -> usize {
        self.group_kills.load(Ordering::SeqCst)
    }

    pub fn direct_kills(&self) -> usize {
        self.direct_kills.load(Ordering::SeqCst)
    }

    pub fn reaps(&self) -> usize {
        self.reaps.load(Ordering::SeqCst)
    }

    fn kill(&self) -> io::Result<()> {
        if !self.is_alive() {
            return Err(io::Error::new(io::ErrorKind::NotFound, "no such process"));
        }
        self.exit(ExitOutcome::Failed {
            code: None,
            signal: Some(SIGKILL),
        });
        Ok(())
    }
}

impl ProcessHandle for FakeProcess {
    fn pid(&self) -> Option<u32> {
        Some(self.pid)
    }

    fn terminate_group(&self) -> io::Result<()> {
        self.group_kills.fetch_add(1, Ordering::SeqCst);
        if self.group_kill_fails {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "fake group kill failure",
            ));
        }
        self.kill()
    }

    fn terminate_direct(&self) -> io::Result<()> {
        self.direct_kills.fetch_add(1, Ordering::SeqCst);
        self.kill()
    }

    fn reap(&self) -> ReapFuture<'_> {
        Box::pin(async move {
            let mut rx = self.exit_tx.subscribe();
            let outcome = *rx
                .wait_for(|outcome| outcome.is_some())
                .await
                .map_err(|_| io::Error::new(io::ErrorKind::NotFound, "process vanished"))?;
            self.reaps.fetch_add(1, Ordering::SeqCst);
            outcome.ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no exit status"))
        })
    }
}
