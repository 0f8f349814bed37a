// src/exec/context.rs

//! Per-invocation execution context.
//!
//! Every worker launch gets its own [`ExecutionContext`], built from:
//! 1. the base process environment (optional, `[env].inherit`)
//! 2. an optional `.env`-style file (`KEY=VALUE`, `#` comments, blank lines)
//! 3. the injected log-destination variable
//!
//! Later layers override earlier ones. The context is handed to the command
//! explicitly; shepherd's own environment is never modified.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;

use crate::config::Config;
use crate::errors::ShepherdError;
use crate::exec::Invocation;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionContext {
    workdir: PathBuf,
    env: BTreeMap<String, String>,
}

impl ExecutionContext {
    pub fn builder(workdir: impl Into<PathBuf>) -> ContextBuilder {
        ContextBuilder {
            workdir: workdir.into(),
            base: BTreeMap::new(),
            env_file: None,
            log_destination: None,
        }
    }

    /// Builder preloaded from the `[worker]` and `[env]` config sections.
    pub fn for_worker(cfg: &Config, log_destination: &Path) -> ContextBuilder {
        let mut builder = ExecutionContext::builder(cfg.workdir());
        if cfg.env.inherit {
            builder = builder.base_env(std::env::vars());
        }
        if let Some(file) = cfg.env_file() {
            builder = builder.env_file(file);
        }
        builder.log_destination(&cfg.env.log_var, log_destination)
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    pub fn env(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.env.get(key).map(String::as_str)
    }

    /// Build a command for `invocation` running under exactly this context.
    pub fn command_for(&self, invocation: &Invocation) -> Command {
        let mut cmd = Command::new(invocation.program());
        cmd.args(invocation.args())
            .env_clear()
            .envs(&self.env)
            .current_dir(&self.workdir);
        cmd
    }
}

pub struct ContextBuilder {
    workdir: PathBuf,
    base: BTreeMap<String, String>,
    env_file: Option<PathBuf>,
    log_destination: Option<(String, PathBuf)>,
}

impl ContextBuilder {
    pub fn base_env(mut self, vars: impl IntoIterator<Item = (String, String)>) -> Self {
        self.base.extend(vars);
        self
    }

    pub fn env_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.env_file = Some(path.into());
        self
    }

    pub fn log_destination(mut self, var: &str, path: impl Into<PathBuf>) -> Self {
        self.log_destination = Some((var.to_string(), path.into()));
        self
    }

    /// Assemble the context.
    ///
    /// An unreadable or malformed env file does not abort the build: the
    /// context is returned without (or with part of) the file's entries and
    /// the problem comes back as an `EnvironmentSetup` error for the caller to
    /// record.
    pub fn build(self) -> (ExecutionContext, Option<ShepherdError>) {
        let mut env = self.base;
        let mut problem = None;

        if let Some(path) = &self.env_file {
            match read_env_file(path) {
                Ok((vars, err)) => {
                    debug!(file = ?path, count = vars.len(), "loaded env file");
                    env.extend(vars);
                    problem = err;
                }
                Err(err) => problem = Some(err),
            }
        }

        if let Some((var, path)) = self.log_destination {
            env.insert(var, path.to_string_lossy().into_owned());
        }

        (
            ExecutionContext {
                workdir: self.workdir,
                env,
            },
            problem,
        )
    }
}

/// Parse a `.env` file without touching the process environment.
///
/// Returns the entries that parsed plus the first line-level error, if any.
fn read_env_file(
    path: &Path,
) -> Result<(Vec<(String, String)>, Option<ShepherdError>), ShepherdError> {
    let iter = dotenvy::from_path_iter(path).map_err(|e| ShepherdError::EnvironmentSetup {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let mut vars = Vec::new();
    let mut first_err = None;
    for item in iter {
        match item {
            Ok(pair) => vars.push(pair),
            Err(e) => {
                if first_err.is_none() {
                    first_err = Some(ShepherdError::EnvironmentSetup {
                        path: path.to_path_buf(),
                        reason: e.to_string(),
                    });
                }
            }
        }
    }
    Ok((vars, first_err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn env_file_layers_over_base_and_log_var_wins() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "A=from_file\nWORKER_LOG_FILE=/ignored.log").unwrap();

        let (ctx, problem) = ExecutionContext::builder("/srv/worker")
            .base_env([
                ("A".to_string(), "from_base".to_string()),
                ("B".to_string(), "kept".to_string()),
            ])
            .env_file(file.path())
            .log_destination("WORKER_LOG_FILE", "/var/log/task_worker.log")
            .build();

        assert!(problem.is_none());
        assert_eq!(ctx.get("A"), Some("from_file"));
        assert_eq!(ctx.get("B"), Some("kept"));
        assert_eq!(ctx.get("WORKER_LOG_FILE"), Some("/var/log/task_worker.log"));
        assert_eq!(ctx.workdir(), Path::new("/srv/worker"));
    }

    #[test]
    fn missing_env_file_is_reported_but_not_fatal() {
        let (ctx, problem) = ExecutionContext::builder(".")
            .env_file("/definitely/not/here/.env")
            .log_destination("LOG", "x.log")
            .build();

        assert!(matches!(problem, Some(ShepherdError::EnvironmentSetup { .. })));
        assert_eq!(ctx.env().len(), 1);
        assert_eq!(ctx.get("LOG"), Some("x.log"));
    }

    #[test]
    fn command_uses_only_context_environment() {
        let (ctx, _) = ExecutionContext::builder("/tmp")
            .base_env([("ONLY".to_string(), "1".to_string())])
            .build();
        let inv = Invocation::new("worker", ["--task=a".to_string()]);
        let cmd = ctx.command_for(&inv);

        assert_eq!(cmd.get_program(), "worker");
        assert_eq!(cmd.get_args().collect::<Vec<_>>(), ["--task=a"]);
        assert_eq!(cmd.get_current_dir(), Some(Path::new("/tmp")));
        let envs: Vec<_> = cmd.get_envs().filter_map(|(k, v)| v.map(|v| (k, v))).collect();
        assert_eq!(envs.len(), 1);
    }
}
