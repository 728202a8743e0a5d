// src/exec/process.rs

//! Owned handle to one launched relay process.
//!
//! All OS-specific process code lives behind [`ProcessHandle`]. The worker
//! composes the three operations in exactly one place (its kill path), and
//! tests substitute a fake handle that never touches the OS.

use std::fmt;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};

use nix::errno::Errno;
use nix::sys::signal::{Signal, kill, killpg};
use nix::unistd::Pid;
use tokio::process::Child;
use tokio::sync::Mutex;

use crate::types::ExitOutcome;

/// Future returned by [`ProcessHandle::reap`].
pub type ReapFuture<'a> = Pin<Box<dyn Future<Output = io::Result<ExitOutcome>> + Send + 'a>>;

/// The only operations the supervisor ever performs on a running relay.
pub trait ProcessHandle: Send + Sync + fmt::Debug {
    /// OS process id, if one was assigned.
    fn pid(&self) -> Option<u32>;

    /// Kill every process in the relay's process group.
    fn terminate_group(&self) -> io::Result<()>;

    /// Kill only the relay process itself. Fallback when the group signal
    /// fails.
    fn terminate_direct(&self) -> io::Result<()>;

    /// Wait for the process to exit and collect its status.
    ///
    /// May be called more than once and from several tasks; every call after
    /// the first completed one returns the same outcome.
    fn reap(&self) -> ReapFuture<'_>;
}

/// True for errors meaning the process is already gone: no such process,
/// no child to wait for, or a handle that was already reaped.
pub fn is_already_gone(err: &io::Error) -> bool {
    if err.kind() == io::ErrorKind::NotFound {
        return true;
    }
    matches!(
        err.raw_os_error(),
        Some(code) if code == Errno::ESRCH as i32 || code == Errno::ECHILD as i32
    )
}

/// [`ProcessHandle`] backed by a real `tokio::process::Child` that was
/// started as the leader of its own process group.
pub struct ChildProcess {
    pid: Option<u32>,
    child: Mutex<Child>,
    exited: AtomicBool,
}

impl ChildProcess {
    pub fn new(child: Child) -> Self {
        Self {
            pid: child.id(),
            child: Mutex::new(child),
            exited: AtomicBool::new(false),
        }
    }

    fn target(&self) -> io::Result<Pid> {
        // Once reaped, the pid may already belong to an unrelated process.
        if self.exited.load(Ordering::Acquire) {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                "process already reaped",
            ));
        }
        let pid = self.pid.ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, "process has no pid")
        })?;
        let raw = i32::try_from(pid)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "pid out of range"))?;
        Ok(Pid::from_raw(raw))
    }
}

impl fmt::Debug for ChildProcess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChildProcess")
            .field("pid", &self.pid)
            .field("exited", &self.exited.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl ProcessHandle for ChildProcess {
    fn pid(&self) -> Option<u32> {
        self.pid
    }

    fn terminate_group(&self) -> io::Result<()> {
        // The child was spawned with process_group(0), so its pgid == pid.
        killpg(self.target()?, Signal::SIGKILL).map_err(io::Error::from)
    }

    fn terminate_direct(&self) -> io::Result<()> {
        kill(self.target()?, Signal::SIGKILL).map_err(io::Error::from)
    }

    fn reap(&self) -> ReapFuture<'_> {
        Box::pin(async move {
            let mut child = self.child.lock().await;
            let status = child.wait().await?;
            self.exited.store(true, Ordering::Release);
            Ok(ExitOutcome::from_status(status))
        })
    }
}
