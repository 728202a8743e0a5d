// src/supervisor/mod.rs

//! Process supervision engine.
//!
//! - [`worker`]: one relay's lifecycle (launch, capture, wait, backoff,
//!   force kill, stop).
//! - [`registry`]: the shared `id -> Worker` index.
//! - [`reconcile`]: diffing a desired config against the registry.
//! - [`watchdog`]: periodic reaping of workers whose relay has died.

pub mod reconcile;
pub mod registry;
pub mod watchdog;
pub mod worker;

pub use reconcile::{ReconcilePlan, reconcile};
pub use registry::{Registry, WorkerMap};
pub use watchdog::{spawn_watchdog, watchdog_pass};
pub use worker::{Worker, WorkerEnv, WorkerStatus};
