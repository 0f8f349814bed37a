// src/supervisor/signature.rs

use regex::Regex;

use crate::errors::{Result, ShepherdError};
use crate::types::SignatureKind;

/// Identifies the continuous-mode worker among all OS processes.
///
/// A command line matches when it contains the pattern (substring or regex)
/// **and** does not carry the task flag. Task-mode invocations always carry
/// the flag, so they can never be mistaken for the continuous worker even
/// though their command line starts with the same program and arguments.
#[derive(Debug, Clone)]
pub struct ProcessSignature {
    pattern: String,
    matcher: Matcher,
    task_flag: String,
}

#[derive(Debug, Clone)]
enum Matcher {
    Substring,
    Regex(Regex),
}

impl ProcessSignature {
    pub fn new(pattern: &str, kind: SignatureKind, task_flag: &str) -> Result<Self> {
        let matcher = match kind {
            SignatureKind::Substring => Matcher::Substring,
            SignatureKind::Regex => Matcher::Regex(Regex::new(pattern).map_err(|e| {
                ShepherdError::ConfigError(format!(
                    "[worker].signature is not a valid regex: {e}"
                ))
            })?),
        };
        Ok(Self {
            pattern: pattern.to_string(),
            matcher,
            task_flag: task_flag.to_string(),
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn matches(&self, command_line: &str) -> bool {
        if command_line.contains(self.task_flag.as_str()) {
            return false;
        }
        match &self.matcher {
            Matcher::Substring => command_line.contains(self.pattern.as_str()),
            Matcher::Regex(re) => re.is_match(command_line),
        }
    }
}
