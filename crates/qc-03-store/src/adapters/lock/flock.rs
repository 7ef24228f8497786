//! Exclusive lock on the data directory using `fs2` (`flock` on Unix,
//! `LockFileEx` on Windows). Acquired on startup, released on drop.
//!
//! Reports through [`StorageError`] rather than a lock-specific error
//! type: a caller opening a store doesn't care whether "locked" came
//! from this file or from `rocksdb`, and `StorageError::Locked` already
//! exists for exactly this.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use fs2::FileExt;

use crate::domain::errors::StorageError;

const LOCK_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_LOCK_AGE: Duration = Duration::from_secs(86_400);

/// Holds an exclusive lock on `data_dir` for as long as it lives.
#[derive(Debug)]
pub struct DatabaseLock {
    file: File,
    path: PathBuf,
    pid: u32,
}

impl DatabaseLock {
    const LOCK_FILE: &'static str = "LOCK";

    pub fn acquire(data_dir: &Path) -> Result<Self, StorageError> {
        let lock_path = data_dir.join(Self::LOCK_FILE);
        if lock_path.exists() && !Self::path_is_within(data_dir, &lock_path) {
            return Err(StorageError::Io(format!("lock path {} escapes data directory {}", lock_path.display(), data_dir.display())));
        }

        let deadline = Instant::now() + LOCK_TIMEOUT;
        let mut retry_delay = Duration::from_millis(50);

        loop {
            if Self::is_stale(&lock_path) {
                let _ = std::fs::remove_file(&lock_path);
            }

            let file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&lock_path)
                .map_err(|e| StorageError::Io(e.to_string()))?;

            match file.try_lock_exclusive() {
                Ok(()) => {
                    let pid = std::process::id();
                    let mut locked = file;
                    writeln!(locked, "{pid}").map_err(|e| StorageError::Io(e.to_string()))?;
                    locked.sync_all().map_err(|e| StorageError::Io(e.to_string()))?;
                    return Ok(Self { file: locked, path: lock_path, pid });
                }
                Err(_) => {
                    let existing_pid = Self::read_pid(&lock_path);
                    if let Some(pid) = existing_pid {
                        if !is_process_running(pid) {
                            drop(file);
                            let _ = std::fs::remove_file(&lock_path);
                            continue;
                        }
                    }
                    if Instant::now() >= deadline {
                        return Err(StorageError::Locked(match existing_pid {
                            Some(pid) => format!("held by pid {pid} ({})", lock_path.display()),
                            None => format!("held ({})", lock_path.display()),
                        }));
                    }
                    drop(file);
                    std::thread::sleep(retry_delay);
                    retry_delay = (retry_delay * 2).min(Duration::from_millis(500));
                }
            }
        }
    }

    /// `lock_path` must canonicalize to somewhere under `data_dir` — a
    /// symlink swapped in for the lock file between opens can't be used
    /// to make this process write its PID, or take a lock, outside of
    /// where the caller asked it to.
    fn path_is_within(data_dir: &Path, lock_path: &Path) -> bool {
        let (Ok(dir), Ok(path)) = (data_dir.canonicalize(), lock_path.canonicalize()) else {
            return false;
        };
        path.starts_with(dir)
    }

    fn is_stale(lock_path: &Path) -> bool {
        lock_path
            .metadata()
            .ok()
            .and_then(|m| m.modified().ok())
            .and_then(|t| t.elapsed().ok())
            .map(|age| age > MAX_LOCK_AGE)
            .unwrap_or(false)
    }

    fn read_pid(path: &Path) -> Option<u32> {
        std::fs::read_to_string(path).ok()?.trim().parse().ok()
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for DatabaseLock {
    fn drop(&mut self) {
        let _ = fs2::FileExt::unlock(&self.file);
        let _ = std::fs::remove_file(&self.path);
    }
}

fn is_process_running(pid: u32) -> bool {
    #[cfg(unix)]
    {
        Path::new(&format!("/proc/{pid}")).exists()
    }
    #[cfg(not(unix))]
    {
        let _ = pid;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquires_and_releases() {
        let dir = tempfile::tempdir().unwrap();
        let lock = DatabaseLock::acquire(dir.path()).unwrap();
        assert_eq!(lock.pid(), std::process::id());
        drop(lock);
        assert!(!dir.path().join("LOCK").exists());
    }

    #[test]
    fn second_acquire_in_same_process_fails_fast() {
        let dir = tempfile::tempdir().unwrap();
        let _first = DatabaseLock::acquire(dir.path()).unwrap();
        // fs2 locks are per-file-descriptor; opening again from the same
        // process still contends for the OS-level exclusive lock.
        let second = File::create(dir.path().join("LOCK")).unwrap();
        assert!(second.try_lock_exclusive().is_err());
    }

    #[cfg(unix)]
    #[test]
    fn a_lock_path_symlinked_outside_the_data_dir_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        std::fs::write(outside.path().join("LOCK"), b"").unwrap();
        std::os::unix::fs::symlink(outside.path().join("LOCK"), dir.path().join("LOCK")).unwrap();

        let err = DatabaseLock::acquire(dir.path()).unwrap_err();
        assert!(matches!(err, StorageError::Io(_)));
    }
}
