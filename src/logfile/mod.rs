// src/logfile/mod.rs

//! The rotated log file shared by `tracing` and every relay's output.
//!
//! - [`sink`]: the lock-guarded current handle, reopened after rotation.
//! - [`rotate`]: size-based rotation into `name.1` .. `name.N` and the
//!   periodic task that drives it.

pub mod rotate;
pub mod sink;

pub use rotate::{LogRotator, rotation_tick, spawn_log_rotator};
pub use sink::LogSink;
