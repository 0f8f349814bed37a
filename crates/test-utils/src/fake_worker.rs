use std::future::Future;
use std::io::Write;
use std::path::Path;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use shepherd::errors::{Result, ShepherdError};
use shepherd::exec::backend::open_append;
use shepherd::exec::{ExecutionContext, Invocation, WorkerBackend};

/// What the fake worker saw when it was invoked.
#[derive(Debug, Clone)]
pub struct SeenInvocation {
    pub command_line: String,
    pub context: ExecutionContext,
}

/// A fake task-mode worker that:
/// - records each invocation and its execution context
/// - appends a canned line of output to the combined log
/// - exits with a fixed code (or fails to launch)
#[derive(Debug, Clone)]
pub struct FakeWorker {
    exit_code: Option<i32>,
    output: String,
    seen: Arc<Mutex<Vec<SeenInvocation>>>,
}

impl FakeWorker {
    pub fn exiting_with(code: i32) -> Self {
        Self {
            exit_code: Some(code),
            output: format!("fake worker exiting with {code}\n"),
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// A worker whose executable cannot be found.
    pub fn unlaunchable() -> Self {
        Self {
            exit_code: None,
            ..Self::exiting_with(0)
        }
    }

    pub fn with_output(mut self, output: &str) -> Self {
        self.output = output.to_string();
        self
    }

    pub fn seen(&self) -> Vec<SeenInvocation> {
        self.seen.lock().unwrap().clone()
    }
}

impl WorkerBackend for FakeWorker {
    fn run_to_completion<'a>(
        &'a self,
        invocation: &'a Invocation,
        ctx: &'a ExecutionContext,
        output: &'a Path,
    ) -> Pin<Box<dyn Future<Output = Result<i32>> + Send + 'a>> {
        Box::pin(async move {
            let Some(code) = self.exit_code else {
                return Err(ShepherdError::LaunchFailure {
                    program: invocation.program().to_string(),
                    source: std::io::Error::from(std::io::ErrorKind::NotFound),
                });
            };

            self.seen.lock().unwrap().push(SeenInvocation {
                command_line: invocation.command_line(),
                context: ctx.clone(),
            });

            let mut file = open_append(output)?;
            file.write_all(self.output.as_bytes())?;
            Ok(code)
        })
    }
}
