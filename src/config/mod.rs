// src/config/mod.rs

//! Configuration loading and validation for stream-runner.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate ids and endpoints, resolve duplicates (`validate.rs`).
//! - Collect runtime tunables from the command line (`settings.rs`).

pub mod loader;
pub mod model;
pub mod settings;
pub mod validate;

pub use loader::{load_and_validate, load_from_path};
pub use model::{ConfigFile, RawConfigFile, WorkerConfig};
pub use settings::{RelaySettings, RotationSettings, Settings, WatchdogSettings};
