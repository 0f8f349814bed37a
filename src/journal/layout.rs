// src/journal/layout.rs

use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::{Result, ShepherdError};
use crate::types::TaskName;

/// Where every log and lock file lives.
///
/// ```text
/// <dir>/worker.log                 continuous-mode combined output
/// <dir>/worker_internal.log        continuous-mode internal log
/// <dir>/<task>_output.log          task-mode combined output + framing
/// <dir>/<task>_worker.log          task-mode internal log
/// <dir>/.locks/tasks/<task>.lock   per-task advisory lock
/// <dir>/.locks/supervisor.lock     liveness-check lock
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLayout {
    dir: PathBuf,
    continuous: String,
    continuous_internal: String,
}

impl LogLayout {
    pub fn new(dir: impl Into<PathBuf>, continuous: &str, continuous_internal: &str) -> Self {
        Self {
            dir: dir.into(),
            continuous: continuous.to_string(),
            continuous_internal: continuous_internal.to_string(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn continuous_log(&self) -> PathBuf {
        self.dir.join(&self.continuous)
    }

    pub fn continuous_internal_log(&self) -> PathBuf {
        self.dir.join(&self.continuous_internal)
    }

    pub fn task_output_log(&self, task: &TaskName) -> PathBuf {
        self.dir.join(format!("{task}_output.log"))
    }

    pub fn task_worker_log(&self, task: &TaskName) -> PathBuf {
        self.dir.join(format!("{task}_worker.log"))
    }

    pub fn lock_dir(&self) -> PathBuf {
        self.dir.join(".locks")
    }

    /// Task locks live in their own directory so no task name can collide
    /// with `supervisor.lock`.
    pub fn task_lock_dir(&self) -> PathBuf {
        self.lock_dir().join("tasks")
    }

    pub fn task_lock(&self, task: &TaskName) -> PathBuf {
        self.task_lock_dir().join(format!("{task}.lock"))
    }

    pub fn supervisor_lock(&self) -> PathBuf {
        self.lock_dir().join("supervisor.lock")
    }

    /// Create the log and lock directories. Idempotent, and safe when several
    /// invocations race to create them.
    pub fn ensure_dirs(&self) -> Result<()> {
        fs::create_dir_all(self.task_lock_dir()).map_err(|e| ShepherdError::EnvironmentSetup {
            path: self.dir.clone(),
            reason: e.to_string(),
        })
    }

    /// Create the directories, falling back to `fallback` as the log directory
    /// when the configured one cannot be created.
    ///
    /// The returned error (if any) describes why the fallback was used; if the
    /// fallback fails too the original layout is returned and later writes
    /// will fail on their own.
    pub fn prepare(self, fallback: &Path) -> (LogLayout, Option<ShepherdError>) {
        match self.ensure_dirs() {
            Ok(()) => (self, None),
            Err(err) => {
                let alt = LogLayout {
                    dir: fallback.to_path_buf(),
                    ..self.clone()
                };
                if alt.dir != self.dir && alt.ensure_dirs().is_ok() {
                    (alt, Some(err))
                } else {
                    (self, Some(err))
                }
            }
        }
    }

    /// Existing log files of `task`: `<task>_output.log` and `<task>_worker.log`.
    pub fn discover(&self, task: &TaskName) -> Result<Vec<PathBuf>> {
        let wanted = [format!("{task}_output.log"), format!("{task}_worker.log")];
        let mut found = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if wanted.iter().any(|w| w == name) && entry.path().is_file() {
                found.push(entry.path());
            }
        }
        found.sort();
        Ok(found)
    }
}
