// src/dispatch.rs

//! Task dispatcher: run one named task in task mode and record its outcome.
//!
//! Every run is bounded in `<task>_output.log` by a `start` and an `end`
//! framing line. Everything the worker prints goes between them, followed by
//! a `success` or `failure` line. The worker's own logger is pointed at
//! `<task>_worker.log` through the log-destination variable so its internal
//! rotation never touches the dispatcher's audit trail.

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::errors::{FailureKind, Result, ShepherdError};
use crate::exec::{ExecutionContext, WorkerBackend};
use crate::journal::{Event, FramingLine, Journal, LogLayout, Source};
use crate::lock::{self, LockGuard};
use crate::policy::PropagationPolicy;
use crate::types::{ContentionBehaviour, TaskName, TaskOutcome, TaskRun};

/// Exit code recorded when the worker could not be started (shell convention
/// for "command not found").
pub const LAUNCH_FAILURE_EXIT_CODE: i32 = 127;

pub struct Dispatcher<W> {
    config: Config,
    worker: W,
}

impl<W: WorkerBackend> Dispatcher<W> {
    pub const POLICY: PropagationPolicy = PropagationPolicy::Propagate;

    pub fn new(config: Config, worker: W) -> Self {
        Self { config, worker }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Validate `name`, then run the task.
    ///
    /// A missing or invalid name fails with `InvalidTaskName` before anything
    /// touches the filesystem.
    pub async fn run_task(&self, name: Option<&str>) -> Result<TaskRun> {
        let task = TaskName::parse(name)?;
        self.run(&task).await
    }

    /// Run an already-validated task to completion.
    ///
    /// Worker failures are not errors: they come back as a `TaskRun` with the
    /// worker's exit code. Errors are reserved for "the run never started"
    /// (`TaskBusy`).
    pub async fn run(&self, task: &TaskName) -> Result<TaskRun> {
        let (layout, setup_err) = self.config.log_layout().prepare(&self.config.workdir());
        if let Some(err) = &setup_err {
            warn!(task = %task, error = %err, "log directory unavailable; using fallback");
        }

        let _guard = self.acquire_lock(&layout, task).await?;

        let output_log = layout.task_output_log(task);
        let worker_log = layout.task_worker_log(task);
        let journal = Journal::new(&output_log);
        let invocation = self.config.task_invocation(task);

        let started_at = Utc::now();
        let run_id = make_run_id(started_at);

        info!(task = %task, run = %run_id, cmd = %invocation, "starting task");
        append(
            &journal,
            FramingLine::at(started_at, Source::Dispatcher, Event::Start)
                .field("task", task)
                .field("run", &run_id)
                .field("cmd", &invocation)
                .field("worker_log", worker_log.display()),
        );

        if let Some(err) = setup_err {
            record_failure(&journal, task, &run_id, Event::EnvSetupFailure, &err);
        }

        let (ctx, env_problem) = ExecutionContext::for_worker(&self.config, &worker_log).build();
        if let Some(err) = env_problem {
            record_failure(&journal, task, &run_id, Event::EnvSetupFailure, &err);
        }

        let (exit_code, outcome) = match self
            .worker
            .run_to_completion(&invocation, &ctx, &output_log)
            .await
        {
            Ok(code) => (code, TaskOutcome::from_exit_code(code)),
            Err(err) => {
                record_failure(&journal, task, &run_id, Event::LaunchFailure, &err);
                (LAUNCH_FAILURE_EXIT_CODE, TaskOutcome::LaunchFailed)
            }
        };

        let finished_at = Utc::now();
        let outcome_line = match outcome {
            TaskOutcome::Success => FramingLine::at(finished_at, Source::Dispatcher, Event::Success),
            TaskOutcome::Failed(_) => {
                FramingLine::at(finished_at, Source::Dispatcher, Event::Failure)
                    .field("kind", FailureKind::WorkerFailure)
            }
            TaskOutcome::LaunchFailed => {
                FramingLine::at(finished_at, Source::Dispatcher, Event::Failure)
                    .field("kind", FailureKind::LaunchFailure)
            }
        };
        append(
            &journal,
            outcome_line
                .field("task", task)
                .field("run", &run_id)
                .field("exit_code", exit_code),
        );
        append(
            &journal,
            FramingLine::at(finished_at, Source::Dispatcher, Event::End)
                .field("task", task)
                .field("run", &run_id)
                .field("exit_code", exit_code)
                .field(
                    "duration_ms",
                    (finished_at - started_at).num_milliseconds(),
                ),
        );

        if outcome.is_success() {
            info!(task = %task, run = %run_id, "task succeeded");
        } else {
            error!(task = %task, run = %run_id, exit_code, "task failed");
        }

        Ok(TaskRun {
            task: task.clone(),
            run_id,
            started_at,
            finished_at,
            exit_code,
            outcome,
            output_log,
            worker_log,
        })
    }

    async fn acquire_lock(&self, layout: &LogLayout, task: &TaskName) -> Result<Option<LockGuard>> {
        if !self.config.lock.enabled {
            return Ok(None);
        }
        let path = layout.task_lock(task);

        let acquired = match self.config.lock.on_contention {
            ContentionBehaviour::Skip => match lock::try_acquire(&path) {
                Ok(Some(guard)) => Ok(guard),
                Ok(None) => {
                    warn!(task = %task, "task already running; skipping this dispatch");
                    return Err(ShepherdError::TaskBusy(task.to_string()));
                }
                Err(err) => Err(err),
            },
            ContentionBehaviour::Wait => {
                debug!(task = %task, "waiting for task lock");
                tokio::task::spawn_blocking(move || lock::acquire_blocking(&path))
                    .await
                    .map_err(|e| ShepherdError::Other(e.into()))?
            }
        };

        match acquired {
            Ok(guard) => Ok(Some(guard)),
            Err(err) => {
                warn!(task = %task, error = %err, "could not take task lock; running unguarded");
                Ok(None)
            }
        }
    }
}

fn make_run_id(started_at: DateTime<Utc>) -> String {
    format!(
        "{}-{}",
        started_at.format("%Y%m%dT%H%M%S%3f"),
        std::process::id()
    )
}

fn append(journal: &Journal, line: FramingLine) {
    if let Err(e) = journal.append(&line) {
        error!(path = ?journal.path(), error = %e, "could not write framing line");
    }
}

fn record_failure(journal: &Journal, task: &TaskName, run_id: &str, event: Event, err: &ShepherdError) {
    let kind = err.kind();
    warn!(task = %task, run = %run_id, kind = %kind, error = %err, "dispatch problem");
    append(
        journal,
        FramingLine::new(Source::Dispatcher, event)
            .field("task", task)
            .field("run", run_id)
            .field("kind", kind)
            .field("error", err),
    );
}
