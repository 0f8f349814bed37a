// src/errors.rs

//! Crate-wide error type and the failure taxonomy recorded in log files.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ShepherdError {
    #[error("Invalid task name: {0}")]
    InvalidTaskName(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Environment setup failed for {path:?}: {reason}")]
    EnvironmentSetup { path: PathBuf, reason: String },

    #[error("Failed to launch '{program}': {source}")]
    LaunchFailure {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Task '{0}' is already running (lock held)")]
    TaskBusy(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ShepherdError {
    /// Map this error onto the failure taxonomy written into log files.
    pub fn kind(&self) -> FailureKind {
        match self {
            ShepherdError::InvalidTaskName(_) => FailureKind::InvalidInput,
            ShepherdError::EnvironmentSetup { .. } => FailureKind::EnvironmentSetupFailure,
            ShepherdError::LaunchFailure { .. } => FailureKind::LaunchFailure,
            ShepherdError::ConfigError(_)
            | ShepherdError::TomlError(_)
            | ShepherdError::IoError(_)
            | ShepherdError::TaskBusy(_)
            | ShepherdError::Other(_) => FailureKind::EnvironmentSetupFailure,
        }
    }
}

/// Failure classes as operators see them in the log files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    InvalidInput,
    EnvironmentSetupFailure,
    LaunchFailure,
    WorkerFailure,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureKind::InvalidInput => "InvalidInput",
            FailureKind::EnvironmentSetupFailure => "EnvironmentSetupFailure",
            FailureKind::LaunchFailure => "LaunchFailure",
            FailureKind::WorkerFailure => "WorkerFailure",
        };
        f.write_str(s)
    }
}

pub type Result<T> = std::result::Result<T, ShepherdError>;
