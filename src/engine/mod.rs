// src/engine/mod.rs

//! External control of the supervisor.
//!
//! OS signals are translated into [`ControlEvent`]s by [`signals`] and fed
//! over an mpsc channel into the single [`control::ControlLoop`], which
//! reloads the stream config or shuts everything down.

/// Which signal asked us to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    /// SIGINT (Ctrl-C).
    Interrupt,
    /// SIGTERM.
    Terminate,
}

/// Events flowing into the control loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlEvent {
    /// Re-read the config file and reconcile (SIGHUP).
    Reload,
    /// Stop every worker and exit.
    Shutdown(ShutdownSignal),
}

pub mod control;
pub mod signals;

pub use control::ControlLoop;
pub use signals::spawn_signal_listener;
