// src/exec/mod.rs

//! Process execution layer.
//!
//! This module is responsible for actually starting the worker, in either of
//! its two modes, under an explicit [`ExecutionContext`].
//!
//! - [`invocation`] describes a worker command line as discrete arguments.
//! - [`context`] builds the environment and working directory per invocation.
//! - [`backend`] provides the `WorkerBackend` trait and `ProcessWorker`, used
//!   by the dispatcher to run a task to completion.
//! - [`launcher`] provides the `WorkerLauncher` trait and `DetachedLauncher`,
//!   used by the supervisor to start the continuous-mode worker.

pub mod backend;
pub mod context;
pub mod invocation;
pub mod launcher;

pub use backend::{ProcessWorker, WorkerBackend};
pub use context::{ContextBuilder, ExecutionContext};
pub use invocation::Invocation;
pub use launcher::{DetachedLauncher, WorkerLauncher};
