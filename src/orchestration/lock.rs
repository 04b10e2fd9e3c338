//! Single-flight run lock.
//!
//! A sentinel file prevents two pipeline runs from interleaving. The file
//! holds an owner token (UUID + pid); acquisition is atomic
//! (`create_new`), and release is RAII so the lock disappears on every
//! exit path of the owning run, panic-unwind included. A guard never
//! deletes a lock file it does not own.

use std::fs;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{PipelineError, Result};

/// Mutual-exclusion resource for pipeline runs.
#[derive(Debug, Clone)]
pub struct RunLock {
    path: PathBuf,
}

impl RunLock {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Try to acquire the lock. Fails with [`PipelineError::LockHeld`] when
    /// a lock file already exists — the caller must refuse to start rather
    /// than queue.
    pub fn acquire(&self) -> Result<RunLockGuard> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let token = format!("{} pid={}", Uuid::new_v4(), std::process::id());
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)
        {
            Ok(mut file) => {
                file.write_all(token.as_bytes())?;
                info!(path = %self.path.display(), "🔒 pipeline lock acquired");
                Ok(RunLockGuard {
                    path: self.path.clone(),
                    token,
                })
            }
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
                let owner = fs::read_to_string(&self.path)
                    .unwrap_or_else(|_| "unknown owner".to_string());
                Err(PipelineError::LockHeld { owner })
            }
            Err(err) => Err(err.into()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Held lock; releases on drop.
#[derive(Debug)]
pub struct RunLockGuard {
    path: PathBuf,
    token: String,
}

impl Drop for RunLockGuard {
    fn drop(&mut self) {
        // Only remove a sentinel this guard wrote; a stale path reused by a
        // newer run must survive.
        match fs::read_to_string(&self.path) {
            Ok(contents) if contents == self.token => {
                if let Err(err) = fs::remove_file(&self.path) {
                    warn!(path = %self.path.display(), error = %err, "failed to release pipeline lock");
                } else {
                    info!(path = %self.path.display(), "🔓 pipeline lock released");
                }
            }
            Ok(_) => {
                warn!(path = %self.path.display(), "lock file owned by another run, leaving in place");
            }
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "could not inspect lock file on release");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_and_release() {
        let dir = tempfile::tempdir().unwrap();
        let lock = RunLock::new(dir.path().join("pipeline.lock"));

        let guard = lock.acquire().unwrap();
        assert!(lock.path().exists());
        drop(guard);
        assert!(!lock.path().exists());
    }

    #[test]
    fn test_second_acquire_refused() {
        let dir = tempfile::tempdir().unwrap();
        let lock = RunLock::new(dir.path().join("pipeline.lock"));

        let _guard = lock.acquire().unwrap();
        let err = lock.acquire().unwrap_err();
        assert!(matches!(err, PipelineError::LockHeld { .. }));
        // The refused acquire must not have touched the sentinel.
        assert!(lock.path().exists());
    }

    #[test]
    fn test_foreign_lock_not_removed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.lock");
        fs::write(&path, "some other owner").unwrap();

        let lock = RunLock::new(&path);
        let err = lock.acquire().unwrap_err();
        match err {
            PipelineError::LockHeld { owner } => assert_eq!(owner, "some other owner"),
            other => panic!("expected LockHeld, got {other:?}"),
        }
        assert!(path.exists());
        assert_eq!(fs::read_to_string(&path).unwrap(), "some other owner");
    }

    #[test]
    fn test_released_on_panic_unwind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.lock");
        let lock = RunLock::new(&path);

        let result = std::panic::catch_unwind(|| {
            let _guard = lock.acquire().unwrap();
            panic!("unexpected unclassified error");
        });
        assert!(result.is_err());
        assert!(!path.exists());
    }

    #[test]
    fn test_reacquire_after_release() {
        let dir = tempfile::tempdir().unwrap();
        let lock = RunLock::new(dir.path().join("pipeline.lock"));

        drop(lock.acquire().unwrap());
        let second = lock.acquire();
        assert!(second.is_ok());
    }
}
