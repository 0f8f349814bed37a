// src/supervisor/process_table.rs

//! Process table abstraction.
//!
//! The supervisor asks a `ProcessTable` for a snapshot of running processes
//! instead of querying the OS directly, so liveness logic can be tested
//! against a fake table.

use sysinfo::{ProcessStatus, System};

use crate::errors::Result;

/// One running process as seen by the liveness check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessEntry {
    pub pid: u32,
    /// Full invocation command line, arguments joined with spaces.
    pub command_line: String,
}

pub trait ProcessTable: Send + Sync {
    fn snapshot(&self) -> Result<Vec<ProcessEntry>>;
}

/// Real process table backed by `sysinfo`.
///
/// Zombies and processes without a visible command line (kernel threads,
/// other users' processes on hardened systems) are left out.
#[derive(Debug, Clone, Default)]
pub struct SystemProcessTable;

impl ProcessTable for SystemProcessTable {
    fn snapshot(&self) -> Result<Vec<ProcessEntry>> {
        let sys = System::new_all();

        let entries = sys
            .processes()
            .iter()
            .filter(|(_, p)| p.status() != ProcessStatus::Zombie)
            .filter(|(_, p)| !p.cmd().is_empty())
            .map(|(pid, p)| ProcessEntry {
                pid: pid.as_u32(),
                command_line: p.cmd().join(" "),
            })
            .collect();

        Ok(entries)
    }
}
