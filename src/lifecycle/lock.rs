//! Cross-process single-instance lock.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info, warn};

use crate::error::LifecycleError;

/// Exclusivity resource held for the life of one process.
pub trait ExclusivityLock: Send + Sync {
    /// Take the lock; fails if another process holds it.
    fn acquire(&self) -> Result<(), LifecycleError>;

    /// Give the lock up. Only the first call after `acquire` has an effect.
    fn release(&self) -> Result<(), LifecycleError>;
}

/// Lock backed by a file created with `create_new`, holding the owner's pid.
#[derive(Debug)]
pub struct FileLock {
    path: PathBuf,
    held: AtomicBool,
}

impl FileLock {
    /// Lock at `path` (not yet acquired).
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            held: AtomicBool::new(false),
        }
    }

    /// Lock file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether this process currently holds the lock.
    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::SeqCst)
    }
}

impl ExclusivityLock for FileLock {
    fn acquire(&self) -> Result<(), LifecycleError> {
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                let holder = fs::read_to_string(&self.path)
                    .map(|s| s.trim().to_string())
                    .ok()
                    .filter(|s| !s.is_empty())
                    .unwrap_or_else(|| "unknown".to_string());
                return Err(LifecycleError::AlreadyHeld {
                    path: self.path.clone(),
                    holder,
                });
            }
            Err(source) => {
                return Err(LifecycleError::LockIo {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        writeln!(file, "{}", std::process::id()).map_err(|source| LifecycleError::LockIo {
            path: self.path.clone(),
            source,
        })?;

        self.held.store(true, Ordering::SeqCst);
        info!(path = %self.path.display(), pid = std::process::id(), "Lock acquired");
        Ok(())
    }

    fn release(&self) -> Result<(), LifecycleError> {
        if !self.held.swap(false, Ordering::SeqCst) {
            debug!(path = %self.path.display(), "Lock not held, nothing to release");
            return Ok(());
        }

        match fs::remove_file(&self.path) {
            Ok(()) => {
                info!(path = %self.path.display(), "Lock released");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!(path = %self.path.display(), "Lock file already gone");
                Ok(())
            }
            Err(source) => Err(LifecycleError::LockIo {
                path: self.path.clone(),
                source,
            }),
        }
    }
}
