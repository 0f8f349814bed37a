// src/lib.rs

pub mod cli;
pub mod config;
pub mod dispatch;
pub mod errors;
pub mod exec;
pub mod journal;
pub mod lock;
pub mod logging;
pub mod policy;
pub mod supervisor;
pub mod types;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::{error, info};

use crate::cli::{CliArgs, Command};
use crate::config::{load_and_validate, resolve_config_path, Config};
use crate::dispatch::Dispatcher;
use crate::errors::ShepherdError;
use crate::exec::{DetachedLauncher, ProcessWorker};
use crate::journal::read_runs;
use crate::supervisor::{Supervisor, SystemProcessTable};
use crate::types::TaskName;

/// High-level entry point used by `main.rs`.
///
/// Returns the process exit code:
/// - `ensure`: always 0 (launch failures are logged, not reported)
/// - `run`: the worker's exit code, or the configured busy code when the
///   task's lock is held
/// - `history`: 0
///
/// An `Err` (invalid task name, unreadable config) maps to exit code 1.
pub async fn run(args: CliArgs) -> Result<i32> {
    match args.command {
        Command::Ensure { every } => {
            Ok(run_supervisor(args.config.as_deref(), every, args.dry_run).await)
        }
        Command::Run { task } => {
            run_dispatcher(args.config.as_deref(), task.as_deref(), args.dry_run).await
        }
        Command::History { task } => run_history(args.config.as_deref(), &task),
    }
}

async fn run_supervisor(config: Option<&str>, every: Option<Duration>, dry_run: bool) -> i32 {
    let policy = Supervisor::<SystemProcessTable, DetachedLauncher>::POLICY;

    let cfg = match load_config(config) {
        Ok(cfg) => cfg,
        Err(err) => {
            error!(error = %err, "supervisor could not load config");
            return policy.exit_code(1);
        }
    };

    let supervisor = Supervisor::new(cfg, SystemProcessTable, DetachedLauncher);

    if dry_run {
        print_supervisor_dry_run(&supervisor);
        return 0;
    }

    match every {
        Some(interval) => Arc::new(supervisor).run_every(interval).await,
        None => {
            let report = supervisor.ensure_running();
            info!(?report, "liveness check finished");
        }
    }

    policy.exit_code(0)
}

async fn run_dispatcher(config: Option<&str>, task: Option<&str>, dry_run: bool) -> Result<i32> {
    // Reject bad names before reading anything from disk.
    let task = TaskName::parse(task)?;
    let cfg = load_config(config)?;
    let busy_exit_code = cfg.lock.busy_exit_code;

    if dry_run {
        print_dispatch_dry_run(&cfg, &task);
        return Ok(0);
    }

    let dispatcher = Dispatcher::new(cfg, ProcessWorker);
    match dispatcher.run(&task).await {
        Ok(run) => Ok(Dispatcher::<ProcessWorker>::POLICY.exit_code(run.exit_code)),
        Err(ShepherdError::TaskBusy(_)) => Ok(busy_exit_code),
        Err(err) => Err(err.into()),
    }
}

fn run_history(config: Option<&str>, task: &str) -> Result<i32> {
    let task: TaskName = task.parse()?;
    let cfg = load_config(config)?;
    let layout = cfg.log_layout();

    println!("log files for {task}:");
    match layout.discover(&task) {
        Ok(files) if files.is_empty() => println!("  (none)"),
        Ok(files) => {
            for f in files {
                println!("  {}", f.display());
            }
        }
        Err(err) => println!("  (cannot read {}: {err})", layout.dir().display()),
    }

    let runs = read_runs(&layout.task_output_log(&task))?;
    println!();
    println!("runs ({}):", runs.len());
    for r in runs {
        println!("  {r}");
    }

    Ok(0)
}

fn load_config(explicit: Option<&str>) -> std::result::Result<Config, ShepherdError> {
    let path = resolve_config_path(explicit);
    info!(config = ?path, "loading config");
    load_and_validate(&path)
}

fn print_supervisor_dry_run(supervisor: &Supervisor<SystemProcessTable, DetachedLauncher>) {
    let cfg = supervisor.config();
    let layout = cfg.log_layout();
    println!("shepherd dry-run (ensure)");
    println!("  command:   {}", cfg.continuous_invocation());
    println!("  workdir:   {}", cfg.workdir().display());
    println!("  signature: {:?} ({:?})", cfg.signature().pattern(), cfg.worker.signature_kind);
    println!("  log:       {}", layout.continuous_log().display());
    println!("  {}:       {}", cfg.env.log_var, layout.continuous_internal_log().display());
    match supervisor.find_running() {
        Ok(pids) if pids.is_empty() => println!("  status:    not running (would launch)"),
        Ok(pids) => println!("  status:    running, pids {pids:?}"),
        Err(err) => println!("  status:    unknown ({err})"),
    }
}

fn print_dispatch_dry_run(cfg: &Config, task: &TaskName) {
    let layout = cfg.log_layout();
    println!("shepherd dry-run (run {task})");
    println!("  command:   {}", cfg.task_invocation(task));
    println!("  workdir:   {}", cfg.workdir().display());
    println!("  output:    {}", layout.task_output_log(task).display());
    println!("  {}: {}", cfg.env.log_var, layout.task_worker_log(task).display());
    if let Some(file) = cfg.env_file() {
        println!("  env file:  {}", file.display());
    }
    if cfg.lock.enabled {
        println!(
            "  lock:      {} (on contention: {:?})",
            layout.task_lock(task).display(),
            cfg.lock.on_contention
        );
    }
}
