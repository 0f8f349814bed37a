// src/journal/history.rs

//! Reconstruct past task runs from the framing lines of an output log.

use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use chrono::{DateTime, Utc};

use crate::errors::Result;
use crate::journal::line::parse_line;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRecord {
    pub run_id: String,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub exit_code: Option<i32>,
}

impl RunRecord {
    /// `None` while no end marker has been seen (still running, or the
    /// dispatcher itself died).
    pub fn succeeded(&self) -> Option<bool> {
        self.exit_code.map(|c| c == 0)
    }
}

impl fmt::Display for RunRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fmt_ts = |ts: Option<DateTime<Utc>>| {
            ts.map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_else(|| "-".to_string())
        };
        let status = match self.exit_code {
            Some(0) => "ok".to_string(),
            Some(code) => format!("failed ({code})"),
            None => "running/crashed".to_string(),
        };
        write!(
            f,
            "{}  {}  {}  {}",
            self.run_id,
            fmt_ts(self.started_at),
            fmt_ts(self.finished_at),
            status
        )
    }
}

/// Read every run recorded in `path`, oldest first.
///
/// A missing file means the task never ran and yields an empty list.
pub fn read_runs(path: &Path) -> Result<Vec<RunRecord>> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut runs: Vec<RunRecord> = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line?;
        let Some(parsed) = parse_line(&line) else {
            continue;
        };
        let Some(run_id) = parsed.get("run") else {
            continue;
        };

        match parsed.event() {
            Some("start") => runs.push(RunRecord {
                run_id: run_id.to_string(),
                started_at: parsed.timestamp(),
                finished_at: None,
                exit_code: None,
            }),
            Some("end") => {
                if let Some(run) = runs.iter_mut().rev().find(|r| r.run_id == run_id) {
                    run.finished_at = parsed.timestamp();
                    run.exit_code = parsed.get("exit_code").and_then(|c| c.parse().ok());
                }
            }
            _ => {}
        }
    }

    Ok(runs)
}
