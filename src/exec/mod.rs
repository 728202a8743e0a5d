// src/exec/mod.rs

//! Process execution layer.
//!
//! This module is responsible for actually starting relay processes with
//! `tokio::process::Command`, owning their OS handles, and copying their
//! output into the log sink.
//!
//! - [`process`] defines the `ProcessHandle` trait and the real
//!   `ChildProcess` (process-group kill, direct kill, reap).
//! - [`launcher`] provides the `ProcessLauncher` trait, the argument template
//!   and the production `RelayLauncher`, which tests can replace with a fake.
//! - [`capture`] contains the `LineTimestampWriter` and the output pumps.

pub mod capture;
pub mod launcher;
pub mod process;

pub use capture::{LineTimestampWriter, MAX_PENDING_BYTES, pump_output};
pub use launcher::{
    CaptureReader, LaunchedProcess, ProcessLauncher, RelayLauncher, check_relay, relay_args,
};
pub use process::{ChildProcess, ProcessHandle, ReapFuture, is_already_gone};
