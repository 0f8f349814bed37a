// src/exec/backend.rs

//! Pluggable worker backend for task-mode runs.
//!
//! The dispatcher talks to a `WorkerBackend` instead of spawning processes
//! itself. Production code uses [`ProcessWorker`]; tests can provide a fake
//! that writes canned output and returns a chosen exit code.

use std::fs::{File, OpenOptions};
use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::process::{ExitStatus, Stdio};

use tokio::process::Command;
use tracing::{debug, info};

use crate::errors::{Result, ShepherdError};
use crate::exec::{ExecutionContext, Invocation};

/// Trait abstracting how a task-mode worker invocation is executed.
pub trait WorkerBackend: Send + Sync {
    /// Run `invocation` under `ctx` until it exits, appending its combined
    /// stdout/stderr to `output`.
    ///
    /// Returns the worker's exit code, or `LaunchFailure` if it never started.
    fn run_to_completion<'a>(
        &'a self,
        invocation: &'a Invocation,
        ctx: &'a ExecutionContext,
        output: &'a Path,
    ) -> Pin<Box<dyn Future<Output = Result<i32>> + Send + 'a>>;
}

/// Real backend: spawns the worker with `tokio::process` and waits for it.
#[derive(Debug, Clone, Default)]
pub struct ProcessWorker;

impl WorkerBackend for ProcessWorker {
    fn run_to_completion<'a>(
        &'a self,
        invocation: &'a Invocation,
        ctx: &'a ExecutionContext,
        output: &'a Path,
    ) -> Pin<Box<dyn Future<Output = Result<i32>> + Send + 'a>> {
        Box::pin(async move {
            let stdout = open_append(output)?;
            let stderr = stdout.try_clone()?;

            let mut cmd = Command::from(ctx.command_for(invocation));
            cmd.stdin(Stdio::null())
                .stdout(Stdio::from(stdout))
                .stderr(Stdio::from(stderr))
                .kill_on_drop(true);

            let mut child = cmd.spawn().map_err(|source| ShepherdError::LaunchFailure {
                program: invocation.program().to_string(),
                source,
            })?;

            info!(
                pid = child.id(),
                cmd = %invocation,
                "worker process started"
            );

            let status = child.wait().await?;
            let code = exit_code_of(status);
            debug!(exit_code = code, success = status.success(), "worker process exited");
            Ok(code)
        })
    }
}

/// Open `path` for appending, creating it if needed.
pub fn open_append(path: &Path) -> std::io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

/// Exit code as a shell would report it: the code itself, or `128 + signal`
/// for a process killed by a signal.
pub fn exit_code_of(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(sig) = status.signal() {
            return 128 + sig;
        }
    }

    -1
}
