// src/config/mod.rs

//! Configuration loading and validation for shepherd.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate invariants and compile the process signature (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_from_path, resolve_config_path};
pub use model::{Config, EnvSection, LockSection, LogsSection, RawConfig, WorkerSection};
