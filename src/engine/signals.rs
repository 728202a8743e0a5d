// src/engine/signals.rs

//! Unix signal handling.
//!
//! - **SIGHUP** → [`ControlEvent::Reload`]
//! - **SIGINT** → [`ControlEvent::Shutdown`] (`Interrupt`)
//! - **SIGTERM** → [`ControlEvent::Shutdown`] (`Terminate`)

use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use super::{ControlEvent, ShutdownSignal};

/// Install the handlers and spawn a task forwarding signals to `tx`.
///
/// Handlers are registered before this returns, so a signal arriving right
/// after startup is not lost. The task ends once the receiver is dropped.
pub fn spawn_signal_listener(tx: mpsc::Sender<ControlEvent>) -> std::io::Result<JoinHandle<()>> {
    let mut hangup = signal(SignalKind::hangup())?;
    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;

    Ok(tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                _ = hangup.recv() => ControlEvent::Reload,
                _ = interrupt.recv() => ControlEvent::Shutdown(ShutdownSignal::Interrupt),
                _ = terminate.recv() => ControlEvent::Shutdown(ShutdownSignal::Terminate),
            };

            debug!(?event, "signal received");
            if tx.send(event).await.is_err() {
                break;
            }
        }
    }))
}
