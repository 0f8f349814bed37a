// src/lock.rs

//! Named advisory locks (`flock`) used to serialise overlapping invocations.
//!
//! The lock lives as long as the returned [`LockGuard`]; dropping the guard
//! (including during unwinding or an early `?` return) releases it, and the
//! kernel releases it anyway if the process dies.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::{debug, warn};

use crate::errors::Result;

#[derive(Debug)]
pub struct LockGuard {
    file: File,
    path: PathBuf,
}

impl LockGuard {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            warn!(path = ?self.path, error = %e, "failed to release advisory lock");
        } else {
            debug!(path = ?self.path, "released advisory lock");
        }
    }
}

fn open_lock_file(path: &Path) -> Result<File> {
    // Never truncate before holding the lock: the holder's pid is in there.
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)?;
    Ok(file)
}

fn stamp_holder(guard: &mut LockGuard) {
    let res = guard
        .file
        .set_len(0)
        .and_then(|_| writeln!(guard.file, "{}", std::process::id()));
    if let Err(e) = res {
        debug!(path = ?guard.path, error = %e, "could not write pid into lock file");
    }
}

/// Take the lock at `path` if it is free; `Ok(None)` if someone holds it.
pub fn try_acquire(path: &Path) -> Result<Option<LockGuard>> {
    let file = open_lock_file(path)?;
    match file.try_lock_exclusive() {
        Ok(()) => {
            let mut guard = LockGuard {
                file,
                path: path.to_path_buf(),
            };
            stamp_holder(&mut guard);
            debug!(path = ?path, "acquired advisory lock");
            Ok(Some(guard))
        }
        Err(e) if e.kind() == fs2::lock_contended_error().kind() => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Block the current thread until the lock at `path` is ours.
pub fn acquire_blocking(path: &Path) -> Result<LockGuard> {
    let file = open_lock_file(path)?;
    file.lock_exclusive()?;
    let mut guard = LockGuard {
        file,
        path: path.to_path_buf(),
    };
    stamp_holder(&mut guard);
    debug!(path = ?path, "acquired advisory lock (after waiting)");
    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn second_holder_is_refused_until_release() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("daily_report.lock");

        let first = try_acquire(&path).unwrap().expect("first acquire succeeds");
        assert!(try_acquire(&path).unwrap().is_none());

        drop(first);
        assert!(try_acquire(&path).unwrap().is_some());
    }

    #[test]
    fn holder_pid_is_written() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.lock");
        let _guard = try_acquire(&path).unwrap().unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.trim(), std::process::id().to_string());
    }

    #[test]
    fn blocking_acquire_waits_for_release() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.lock");
        let first = try_acquire(&path).unwrap().unwrap();

        let waiter_path = path.clone();
        let waiter = std::thread::spawn(move || acquire_blocking(&waiter_path).map(|_| ()));

        std::thread::sleep(std::time::Duration::from_millis(50));
        assert!(!waiter.is_finished());
        drop(first);
        waiter.join().unwrap().unwrap();
    }
}
