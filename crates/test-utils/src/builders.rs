#![allow(dead_code)]

use std::path::{Path, PathBuf};

use shepherd::config::{Config, EnvSection, LockSection, LogsSection, RawConfig, WorkerSection};
use shepherd::types::{ContentionBehaviour, SignatureKind};

/// Builder for `Config` to simplify test setup.
///
/// Defaults differ from a real `Shepherd.toml` in one way: the worker does
/// not inherit the test process environment, so contexts are deterministic.
pub struct ConfigBuilder {
    raw: RawConfig,
}

impl ConfigBuilder {
    pub fn new(program: &str) -> Self {
        Self {
            raw: RawConfig {
                worker: WorkerSection {
                    program: program.to_string(),
                    args: vec![],
                    workdir: PathBuf::from("."),
                    task_flag: "--task".to_string(),
                    signature: None,
                    signature_kind: SignatureKind::Substring,
                },
                logs: LogsSection::default(),
                env: EnvSection {
                    inherit: false,
                    ..EnvSection::default()
                },
                lock: LockSection::default(),
                base_dir: None,
            },
        }
    }

    /// A `sh -c <script>` worker. Task mode passes the task flag as `$1`.
    pub fn sh(script: &str) -> Self {
        Self::new("sh").arg("-c").arg(script).arg("worker")
    }

    pub fn arg(mut self, arg: &str) -> Self {
        self.raw.worker.args.push(arg.to_string());
        self
    }

    /// Resolve relative paths (workdir, logs, env file) against `dir`.
    pub fn rooted_at(mut self, dir: impl AsRef<Path>) -> Self {
        self.raw.base_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn workdir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.raw.worker.workdir = dir.into();
        self
    }

    pub fn log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.raw.logs.dir = dir.into();
        self
    }

    pub fn signature(mut self, pattern: &str) -> Self {
        self.raw.worker.signature = Some(pattern.to_string());
        self
    }

    pub fn env_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.raw.env.file = Some(path.into());
        self
    }

    pub fn inherit_env(mut self, val: bool) -> Self {
        self.raw.env.inherit = val;
        self
    }

    pub fn lock_enabled(mut self, val: bool) -> Self {
        self.raw.lock.enabled = val;
        self
    }

    pub fn on_contention(mut self, behaviour: ContentionBehaviour) -> Self {
        self.raw.lock.on_contention = behaviour;
        self
    }

    pub fn build_raw(self) -> RawConfig {
        self.raw
    }

    pub fn build(self) -> Config {
        Config::try_from(self.raw).expect("Failed to build valid config from builder")
    }
}
