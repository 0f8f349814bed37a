// src/exec/launcher.rs

//! Fire-and-forget launching of the continuous-mode worker.

use std::path::Path;
use std::process::Stdio;

use tracing::{debug, warn};

use crate::errors::{Result, ShepherdError};
use crate::exec::backend::open_append;
use crate::exec::{ExecutionContext, Invocation};

/// Trait abstracting how the continuous-mode worker is started.
///
/// The supervisor only needs a pid back; it never waits on the worker.
pub trait WorkerLauncher: Send + Sync {
    fn launch(
        &self,
        invocation: &Invocation,
        ctx: &ExecutionContext,
        output: &Path,
    ) -> Result<u32>;
}

/// Real launcher: detaches the worker from the caller.
///
/// On unix the child starts a new session (no controlling terminal, immune to
/// the caller's hangup), stdin is closed, and stdout/stderr are appended to
/// `output`. The child outlives shepherd.
#[derive(Debug, Clone, Default)]
pub struct DetachedLauncher;

impl WorkerLauncher for DetachedLauncher {
    fn launch(
        &self,
        invocation: &Invocation,
        ctx: &ExecutionContext,
        output: &Path,
    ) -> Result<u32> {
        let stdout = open_append(output)?;
        let stderr = stdout.try_clone()?;

        let mut cmd = ctx.command_for(invocation);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr));

        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            // SAFETY: setsid(2) is async-signal-safe and only affects the child.
            unsafe {
                cmd.pre_exec(|| {
                    nix::unistd::setsid()
                        .map(|_| ())
                        .map_err(std::io::Error::from)
                });
            }
        }

        let mut child = cmd.spawn().map_err(|source| ShepherdError::LaunchFailure {
            program: invocation.program().to_string(),
            source,
        })?;
        let pid = child.id();

        // Reap the child if it exits while we are still alive (loop mode), so
        // it does not linger as a zombie that still matches the signature.
        let reaper = std::thread::Builder::new()
            .name(format!("reap-{pid}"))
            .spawn(move || {
                let status = child.wait();
                debug!(pid, ?status, "detached worker exited");
            });
        if let Err(e) = reaper {
            warn!(pid, error = %e, "could not start reaper thread for detached worker");
        }

        Ok(pid)
    }
}
