// src/config/validate.rs

use std::path::Path;

use crate::config::model::{Config, RawConfig};
use crate::errors::{Result, ShepherdError};
use crate::supervisor::ProcessSignature;

impl TryFrom<RawConfig> for Config {
    type Error = ShepherdError;

    fn try_from(raw: RawConfig) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        let signature = build_signature(&raw)?;
        Ok(Config::new_unchecked(raw, signature))
    }
}

fn validate_raw_config(cfg: &RawConfig) -> Result<()> {
    validate_worker(cfg)?;
    validate_logs(cfg)?;
    validate_env(cfg)?;
    Ok(())
}

fn validate_worker(cfg: &RawConfig) -> Result<()> {
    if cfg.worker.program.trim().is_empty() {
        return Err(ShepherdError::ConfigError(
            "[worker].program must not be empty".to_string(),
        ));
    }

    let flag = &cfg.worker.task_flag;
    if !flag.starts_with('-') || flag.len() < 2 || flag.contains('=') {
        return Err(ShepherdError::ConfigError(format!(
            "[worker].task_flag must look like an option (e.g. \"--task\"), got {flag:?}"
        )));
    }

    // Task mode always carries the flag, so a continuous-mode argument that
    // already contains it would make both modes indistinguishable.
    if cfg.worker.args.iter().any(|a| a.contains(flag.as_str())) {
        return Err(ShepherdError::ConfigError(format!(
            "[worker].args must not contain the task flag {flag:?}"
        )));
    }

    Ok(())
}

fn validate_logs(cfg: &RawConfig) -> Result<()> {
    for (key, name) in [
        ("continuous", &cfg.logs.continuous),
        ("continuous_internal", &cfg.logs.continuous_internal),
    ] {
        ensure_bare_file_name(key, name)?;
    }

    if cfg.logs.continuous == cfg.logs.continuous_internal {
        return Err(ShepherdError::ConfigError(
            "[logs].continuous and [logs].continuous_internal must differ".to_string(),
        ));
    }

    Ok(())
}

fn ensure_bare_file_name(key: &str, name: &str) -> Result<()> {
    let path = Path::new(name);
    let is_bare = !name.is_empty()
        && path.file_name().map(|f| f == path.as_os_str()).unwrap_or(false);
    if !is_bare {
        return Err(ShepherdError::ConfigError(format!(
            "[logs].{key} must be a plain file name, got {name:?}"
        )));
    }
    Ok(())
}

fn validate_env(cfg: &RawConfig) -> Result<()> {
    let var = &cfg.env.log_var;
    if var.is_empty() || var.contains('=') || var.contains('\0') {
        return Err(ShepherdError::ConfigError(format!(
            "[env].log_var is not a valid variable name: {var:?}"
        )));
    }
    Ok(())
}

fn build_signature(cfg: &RawConfig) -> Result<ProcessSignature> {
    let pattern = match &cfg.worker.signature {
        Some(s) => s.clone(),
        None => std::iter::once(cfg.worker.program.as_str())
            .chain(cfg.worker.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" "),
    };

    if pattern.trim().is_empty() {
        return Err(ShepherdError::ConfigError(
            "[worker].signature must not be empty".to_string(),
        ));
    }
    if pattern.contains(cfg.worker.task_flag.as_str()) {
        return Err(ShepherdError::ConfigError(format!(
            "[worker].signature {pattern:?} contains the task flag {:?}; it would never match continuous mode",
            cfg.worker.task_flag
        )));
    }

    ProcessSignature::new(&pattern, cfg.worker.signature_kind, &cfg.worker.task_flag)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SignatureKind;

    fn raw(toml_src: &str) -> RawConfig {
        toml::from_str(toml_src).expect("test TOML must parse")
    }

    #[test]
    fn minimal_config_gets_defaults() {
        let cfg = Config::try_from(raw("[worker]\nprogram = \"python\"\nargs = [\"-m\", \"src\"]\n"))
            .unwrap();

        assert_eq!(cfg.worker.task_flag, "--task");
        assert_eq!(cfg.logs.continuous, "worker.log");
        assert_eq!(cfg.env.log_var, "WORKER_LOG_FILE");
        assert!(cfg.lock.enabled);
        assert_eq!(cfg.lock.busy_exit_code, 75);
        assert_eq!(cfg.signature().pattern(), "python -m src");
        assert_eq!(cfg.worker.signature_kind, SignatureKind::Substring);
    }

    #[test]
    fn task_invocation_appends_flag_as_single_argument() {
        let cfg = Config::try_from(raw("[worker]\nprogram = \"python\"\nargs = [\"-m\", \"src\"]\n"))
            .unwrap();
        let task = "daily_report".parse().unwrap();
        let inv = cfg.task_invocation(&task);

        assert_eq!(inv.args(), ["-m", "src", "--task=daily_report"]);
        assert!(!cfg.signature().matches(&inv.command_line()));
        assert!(cfg.signature().matches(&cfg.continuous_invocation().command_line()));
    }

    #[test]
    fn rejects_empty_program() {
        let err = Config::try_from(raw("[worker]\nprogram = \"  \"\n")).unwrap_err();
        assert!(matches!(err, ShepherdError::ConfigError(_)));
    }

    #[test]
    fn rejects_signature_containing_task_flag() {
        let err = Config::try_from(raw(
            "[worker]\nprogram = \"python\"\nsignature = \"python --task\"\n",
        ))
        .unwrap_err();
        match err {
            ShepherdError::ConfigError(msg) => assert!(msg.contains("task flag")),
            other => panic!("expected ConfigError, got {other:?}"),
        }
    }

    #[test]
    fn rejects_args_containing_task_flag() {
        let err = Config::try_from(raw(
            "[worker]\nprogram = \"python\"\nargs = [\"--task=x\"]\n",
        ))
        .unwrap_err();
        assert!(matches!(err, ShepherdError::ConfigError(_)));
    }

    #[test]
    fn rejects_log_names_with_directories() {
        let err = Config::try_from(raw(
            "[worker]\nprogram = \"python\"\n[logs]\ncontinuous = \"../worker.log\"\n",
        ))
        .unwrap_err();
        assert!(matches!(err, ShepherdError::ConfigError(_)));
    }

    #[test]
    fn rejects_invalid_regex_signature() {
        let err = Config::try_from(raw(
            "[worker]\nprogram = \"python\"\nsignature = \"python (\"\nsignature_kind = \"regex\"\n",
        ))
        .unwrap_err();
        assert!(matches!(err, ShepherdError::ConfigError(_)));
    }

    #[test]
    fn unknown_contention_mode_fails_to_parse() {
        let res: std::result::Result<RawConfig, _> = toml::from_str(
            "[worker]\nprogram = \"python\"\n[lock]\non_contention = \"retry\"\n",
        );
        assert!(res.is_err());
    }
}
