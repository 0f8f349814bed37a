// src/supervisor/mod.rs

//! Liveness supervisor: keep exactly one continuous-mode worker alive.
//!
//! Each `ensure_running` call is a one-shot check meant to be fired by cron:
//! lock, look for the worker in the process table, launch it if absent.
//! Nothing is remembered between calls.

pub mod process_table;
pub mod signature;

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::errors::{FailureKind, ShepherdError};
use crate::exec::{ExecutionContext, WorkerLauncher};
use crate::journal::{Event, FramingLine, Journal, LogLayout, Source};
use crate::lock;
use crate::policy::PropagationPolicy;

pub use process_table::{ProcessEntry, ProcessTable, SystemProcessTable};
pub use signature::ProcessSignature;

/// What a single liveness check did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LivenessReport {
    /// A matching worker already exists; nothing was started.
    AlreadyRunning { pids: Vec<u32> },
    /// No worker was found and one was started.
    Launched { pid: u32 },
    /// No worker was found and starting one failed.
    LaunchFailed { reason: String },
    /// Another supervisor is mid-check right now.
    Contended,
    /// The process table could not be read; nothing was started.
    CheckFailed { reason: String },
}

pub struct Supervisor<P, L> {
    config: Config,
    table: P,
    launcher: L,
}

impl<P: ProcessTable, L: WorkerLauncher> Supervisor<P, L> {
    pub const POLICY: PropagationPolicy = PropagationPolicy::Swallow;

    pub fn new(config: Config, table: P, launcher: L) -> Self {
        Self {
            config,
            table,
            launcher,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Pids of processes matching the continuous-mode signature, excluding
    /// shepherd itself.
    pub fn find_running(&self) -> Result<Vec<u32>, ShepherdError> {
        let me = std::process::id();
        let signature = self.config.signature();
        Ok(self
            .table
            .snapshot()?
            .into_iter()
            .filter(|p| p.pid != me && signature.matches(&p.command_line))
            .map(|p| p.pid)
            .collect())
    }

    /// Make sure a continuous-mode worker exists. Never fails: every problem
    /// ends up in the report and in the continuous-mode log.
    pub fn ensure_running(&self) -> LivenessReport {
        let (layout, setup_err) = self.config.log_layout().prepare(&self.config.workdir());
        let journal = Journal::new(layout.continuous_log());
        if let Some(err) = setup_err {
            record_failure(&journal, Event::EnvSetupFailure, &err);
        }

        let _guard = match lock::try_acquire(&layout.supervisor_lock()) {
            Ok(Some(guard)) => Some(guard),
            Ok(None) => {
                debug!("another supervisor holds the lock; skipping this check");
                return LivenessReport::Contended;
            }
            Err(err) => {
                // Without the lock we can still check; only concurrent
                // supervisors lose their protection.
                warn!(error = %err, "could not take supervisor lock; checking without it");
                None
            }
        };

        match self.find_running() {
            Ok(pids) if !pids.is_empty() => {
                debug!(?pids, "worker already running");
                return LivenessReport::AlreadyRunning { pids };
            }
            Ok(_) => {}
            Err(err) => {
                warn!(error = %err, "could not read process table; not launching");
                return LivenessReport::CheckFailed {
                    reason: err.to_string(),
                };
            }
        }

        self.launch(&layout, &journal)
    }

    fn launch(&self, layout: &LogLayout, journal: &Journal) -> LivenessReport {
        let invocation = self.config.continuous_invocation();
        let (ctx, env_problem) =
            ExecutionContext::for_worker(&self.config, &layout.continuous_internal_log()).build();
        if let Some(err) = env_problem {
            record_failure(journal, Event::EnvSetupFailure, &err);
        }

        match self
            .launcher
            .launch(&invocation, &ctx, &layout.continuous_log())
        {
            Ok(pid) => {
                info!(pid, cmd = %invocation, "launched continuous-mode worker");
                let line = FramingLine::new(Source::Supervisor, Event::Launched)
                    .field("worker_pid", pid)
                    .field("cmd", &invocation);
                if let Err(e) = journal.append(&line) {
                    warn!(error = %e, "could not write to continuous-mode log");
                }
                LivenessReport::Launched { pid }
            }
            Err(err) => {
                record_failure(journal, Event::LaunchFailure, &err);
                LivenessReport::LaunchFailed {
                    reason: err.to_string(),
                }
            }
        }
    }

    /// Run `ensure_running` every `every` until Ctrl-C.
    ///
    /// Each check runs on the blocking pool (process snapshot, flock), so a
    /// Ctrl-C arriving mid-check ends the loop without waiting for it.
    pub async fn run_every(self: Arc<Self>, every: Duration)
    where
        P: 'static,
        L: 'static,
    {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);
        info!(?every, "supervisor loop started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                res = &mut shutdown => {
                    log_shutdown(res);
                    break;
                }
            }

            let this = Arc::clone(&self);
            let check = tokio::task::spawn_blocking(move || this.ensure_running());
            tokio::select! {
                res = check => match res {
                    Ok(report) => debug!(?report, "liveness check finished"),
                    Err(e) => warn!(error = %e, "liveness check did not complete"),
                },
                res = &mut shutdown => {
                    log_shutdown(res);
                    break;
                }
            }
        }

        info!("supervisor loop stopped");
    }
}

fn log_shutdown(res: std::io::Result<()>) {
    if let Err(e) = res {
        warn!(error = %e, "failed to listen for Ctrl+C");
    }
}

fn record_failure(journal: &Journal, event: Event, err: &ShepherdError) {
    let kind: FailureKind = err.kind();
    warn!(kind = %kind, error = %err, "supervisor failure");
    let line = FramingLine::new(Source::Supervisor, event)
        .field("kind", kind)
        .field("error", err);
    if let Err(e) = journal.append(&line) {
        warn!(error = %e, "could not write to continuous-mode log");
    }
}
