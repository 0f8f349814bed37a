// src/config/model.rs

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::exec::Invocation;
use crate::journal::LogLayout;
use crate::supervisor::ProcessSignature;
use crate::types::{ContentionBehaviour, SignatureKind, TaskName};

/// Configuration as read from `Shepherd.toml`, before validation.
///
/// ```toml
/// [worker]
/// program = "python"
/// args = ["-m", "src"]
/// task_flag = "--task"
///
/// [logs]
/// dir = "logs"
///
/// [env]
/// file = ".env"
/// log_var = "WORKER_LOG_FILE"
///
/// [lock]
/// on_contention = "skip"
/// ```
///
/// Only `[worker].program` is mandatory.
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfig {
    pub worker: WorkerSection,

    #[serde(default)]
    pub logs: LogsSection,

    #[serde(default)]
    pub env: EnvSection,

    #[serde(default)]
    pub lock: LockSection,

    /// Directory relative paths are resolved against. Set by the loader to the
    /// config file's parent directory; never read from TOML.
    #[serde(skip)]
    pub base_dir: Option<PathBuf>,
}

/// `[worker]` section: how to start the external worker.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkerSection {
    /// Executable to run (looked up on `PATH` if not a path).
    pub program: String,

    /// Arguments for continuous mode. Task mode appends the task flag.
    #[serde(default)]
    pub args: Vec<String>,

    /// Working directory of the worker.
    #[serde(default = "default_workdir")]
    pub workdir: PathBuf,

    /// Task-selection flag; task mode passes `<task_flag>=<name>`.
    #[serde(default = "default_task_flag")]
    pub task_flag: String,

    /// Pattern identifying the continuous-mode worker in the process table.
    /// Defaults to `program` and `args` joined with spaces.
    #[serde(default)]
    pub signature: Option<String>,

    #[serde(default)]
    pub signature_kind: SignatureKind,
}

fn default_workdir() -> PathBuf {
    PathBuf::from(".")
}

fn default_task_flag() -> String {
    "--task".to_string()
}

/// `[logs]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct LogsSection {
    #[serde(default = "default_log_dir")]
    pub dir: PathBuf,

    /// Combined output of the continuous-mode worker.
    #[serde(default = "default_continuous_log")]
    pub continuous: String,

    /// Log destination injected into the continuous-mode worker.
    #[serde(default = "default_continuous_internal_log")]
    pub continuous_internal: String,
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_continuous_log() -> String {
    "worker.log".to_string()
}

fn default_continuous_internal_log() -> String {
    "worker_internal.log".to_string()
}

impl Default for LogsSection {
    fn default() -> Self {
        Self {
            dir: default_log_dir(),
            continuous: default_continuous_log(),
            continuous_internal: default_continuous_internal_log(),
        }
    }
}

/// `[env]` section: what goes into each worker's environment.
#[derive(Debug, Clone, Deserialize)]
pub struct EnvSection {
    /// Optional `.env`-style file loaded fresh for every invocation.
    #[serde(default)]
    pub file: Option<PathBuf>,

    /// Start from shepherd's own environment (cron gives a minimal one).
    #[serde(default = "default_inherit")]
    pub inherit: bool,

    /// Variable naming the file the worker's internal logger should use.
    #[serde(default = "default_log_var")]
    pub log_var: String,
}

fn default_inherit() -> bool {
    true
}

fn default_log_var() -> String {
    "WORKER_LOG_FILE".to_string()
}

impl Default for EnvSection {
    fn default() -> Self {
        Self {
            file: None,
            inherit: default_inherit(),
            log_var: default_log_var(),
        }
    }
}

/// `[lock]` section: per-task mutual exclusion for overlapping dispatches.
#[derive(Debug, Clone, Deserialize)]
pub struct LockSection {
    #[serde(default = "default_lock_enabled")]
    pub enabled: bool,

    #[serde(default)]
    pub on_contention: ContentionBehaviour,

    /// Exit code reported when a dispatch is skipped because the task is busy.
    #[serde(default = "default_busy_exit_code")]
    pub busy_exit_code: i32,
}

fn default_lock_enabled() -> bool {
    true
}

fn default_busy_exit_code() -> i32 {
    // EX_TEMPFAIL from sysexits.h
    75
}

impl Default for LockSection {
    fn default() -> Self {
        Self {
            enabled: default_lock_enabled(),
            on_contention: ContentionBehaviour::default(),
            busy_exit_code: default_busy_exit_code(),
        }
    }
}

/// Validated configuration.
///
/// Only constructible through `TryFrom<RawConfig>` (see `validate.rs`), so
/// holding a `Config` means the signature compiled and the invariants held.
#[derive(Debug, Clone)]
pub struct Config {
    pub worker: WorkerSection,
    pub logs: LogsSection,
    pub env: EnvSection,
    pub lock: LockSection,
    base_dir: PathBuf,
    signature: ProcessSignature,
}

impl Config {
    pub(crate) fn new_unchecked(raw: RawConfig, signature: ProcessSignature) -> Self {
        Self {
            worker: raw.worker,
            logs: raw.logs,
            env: raw.env,
            lock: raw.lock,
            base_dir: raw.base_dir.unwrap_or_else(|| PathBuf::from(".")),
            signature,
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    /// Worker working directory, resolved against the config directory.
    pub fn workdir(&self) -> PathBuf {
        self.resolve(&self.worker.workdir)
    }

    pub fn env_file(&self) -> Option<PathBuf> {
        self.env.file.as_deref().map(|p| self.resolve(p))
    }

    pub fn log_layout(&self) -> LogLayout {
        LogLayout::new(
            self.resolve(&self.logs.dir),
            &self.logs.continuous,
            &self.logs.continuous_internal,
        )
    }

    pub fn signature(&self) -> &ProcessSignature {
        &self.signature
    }

    /// `program args...`: the worker running indefinitely.
    pub fn continuous_invocation(&self) -> Invocation {
        Invocation::new(&self.worker.program, self.worker.args.iter().cloned())
    }

    /// `program args... <task_flag>=<task>`: the worker running one task.
    pub fn task_invocation(&self, task: &TaskName) -> Invocation {
        let mut inv = self.continuous_invocation();
        inv.push_arg(format!("{}={}", self.worker.task_flag, task));
        inv
    }
}
