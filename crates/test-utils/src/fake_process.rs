use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use shepherd::errors::{Result, ShepherdError};
use shepherd::exec::{ExecutionContext, Invocation, WorkerLauncher};
use shepherd::supervisor::{ProcessEntry, ProcessTable};

/// An in-memory process table shared between a supervisor and a launcher.
#[derive(Debug, Clone, Default)]
pub struct FakeProcessTable {
    entries: Arc<Mutex<Vec<ProcessEntry>>>,
}

impl FakeProcessTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, pid: u32, command_line: &str) {
        self.entries.lock().unwrap().push(ProcessEntry {
            pid,
            command_line: command_line.to_string(),
        });
    }

    pub fn kill(&self, pid: u32) {
        self.entries.lock().unwrap().retain(|e| e.pid != pid);
    }

    pub fn count_matching(&self, needle: &str) -> usize {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.command_line.contains(needle))
            .count()
    }
}

impl ProcessTable for FakeProcessTable {
    fn snapshot(&self) -> Result<Vec<ProcessEntry>> {
        Ok(self.entries.lock().unwrap().clone())
    }
}

/// A launcher that "starts" the worker by adding it to a `FakeProcessTable`.
///
/// - records every invocation it was asked to launch
/// - optionally fails every launch as if the executable were missing
#[derive(Debug, Clone)]
pub struct FakeLauncher {
    table: FakeProcessTable,
    launched: Arc<Mutex<Vec<String>>>,
    next_pid: Arc<AtomicU32>,
    fail: bool,
}

impl FakeLauncher {
    pub fn new(table: FakeProcessTable) -> Self {
        Self {
            table,
            launched: Arc::new(Mutex::new(Vec::new())),
            next_pid: Arc::new(AtomicU32::new(4_000_000)),
            fail: false,
        }
    }

    pub fn failing(table: FakeProcessTable) -> Self {
        Self {
            fail: true,
            ..Self::new(table)
        }
    }

    pub fn launched(&self) -> Vec<String> {
        self.launched.lock().unwrap().clone()
    }
}

impl WorkerLauncher for FakeLauncher {
    fn launch(
        &self,
        invocation: &Invocation,
        _ctx: &ExecutionContext,
        _output: &Path,
    ) -> Result<u32> {
        if self.fail {
            return Err(ShepherdError::LaunchFailure {
                program: invocation.program().to_string(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            });
        }

        let pid = self.next_pid.fetch_add(1, Ordering::SeqCst);
        self.launched.lock().unwrap().push(invocation.command_line());
        self.table.insert(pid, &invocation.command_line());
        Ok(pid)
    }
}
