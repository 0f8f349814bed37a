// src/types.rs

//! Core value types shared by the supervisor and the dispatcher.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::errors::ShepherdError;

const MAX_TASK_NAME_LEN: usize = 128;

/// Validated task identifier.
///
/// Only ASCII letters, digits, `_`, `-` and `.` are accepted, and the name may
/// not start with `.` or `-`. That keeps it usable as a file name component
/// and stops it from being read as an option by the worker.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskName(String);

impl TaskName {
    /// Validate an optional raw name (a missing CLI argument arrives as `None`).
    pub fn parse(raw: Option<&str>) -> Result<Self, ShepherdError> {
        let raw = raw.ok_or_else(|| {
            ShepherdError::InvalidTaskName("no task name given".to_string())
        })?;
        raw.parse()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for TaskName {
    type Err = ShepherdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(ShepherdError::InvalidTaskName(
                "task name is empty".to_string(),
            ));
        }
        if s.len() > MAX_TASK_NAME_LEN {
            return Err(ShepherdError::InvalidTaskName(format!(
                "task name is longer than {MAX_TASK_NAME_LEN} bytes"
            )));
        }
        if s.starts_with('.') || s.starts_with('-') {
            return Err(ShepherdError::InvalidTaskName(format!(
                "task name '{s}' must not start with '.' or '-'"
            )));
        }
        if let Some(bad) = s
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')))
        {
            return Err(ShepherdError::InvalidTaskName(format!(
                "task name '{}' contains disallowed character {:?}",
                s.escape_default(),
                bad
            )));
        }
        Ok(TaskName(s.to_string()))
    }
}

impl fmt::Display for TaskName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How the continuous-mode signature is compared against command lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SignatureKind {
    #[default]
    Substring,
    Regex,
}

/// What to do when another dispatcher already holds a task's lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ContentionBehaviour {
    /// Give up immediately and report the task as busy.
    #[default]
    Skip,
    /// Block until the running instance releases the lock.
    Wait,
}

/// Final state of a task run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    Success,
    /// Worker exited nonzero (or was killed by a signal).
    Failed(i32),
    /// The worker could not be started at all.
    LaunchFailed,
}

impl TaskOutcome {
    pub fn from_exit_code(code: i32) -> Self {
        if code == 0 {
            TaskOutcome::Success
        } else {
            TaskOutcome::Failed(code)
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, TaskOutcome::Success)
    }
}

/// One completed task-mode invocation.
#[derive(Debug, Clone)]
pub struct TaskRun {
    pub task: TaskName,
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub exit_code: i32,
    pub outcome: TaskOutcome,
    /// Combined stdout/stderr of the worker, framed by start/end markers.
    pub output_log: PathBuf,
    /// File handed to the worker's own logger via the log-destination variable.
    pub worker_log: PathBuf,
}
