//! Single-instance lock
//!
//! Two daemons claiming the same sensors and driving the same display would
//! fight each other, so startup takes an exclusive `flock` on
//! `$XDG_RUNTIME_DIR/swaysensor.lock` and holds it for the process lifetime.

use std::fs::{File, OpenOptions};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use nix::errno::Errno;
use nix::fcntl::{Flock, FlockArg};
use thiserror::Error;

const LOCK_FILE: &str = "swaysensor.lock";

#[derive(Debug, Error)]
pub enum InstanceError {
    #[error("XDG_RUNTIME_DIR is not set - cannot place the instance lock")]
    RuntimeDirUnset,

    #[error("Failed to open lock file {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Another instance is running (lock held on {path})")]
    AlreadyRunning { path: PathBuf },

    #[error("Failed to lock {path}: {source}")]
    Lock {
        path: PathBuf,
        #[source]
        source: Errno,
    },
}

/// Held for as long as this process is the running instance
#[derive(Debug)]
pub struct InstanceLock {
    _lock: Flock<File>,
    path: PathBuf,
}

impl InstanceLock {
    /// Take the lock in `$XDG_RUNTIME_DIR`
    pub fn acquire() -> Result<Self, InstanceError> {
        let runtime_dir = std::env::var_os("XDG_RUNTIME_DIR")
            .filter(|dir| !dir.is_empty())
            .ok_or(InstanceError::RuntimeDirUnset)?;
        Self::acquire_in(Path::new(&runtime_dir))
    }

    /// Take the lock in `dir`
    pub fn acquire_in(dir: &Path) -> Result<Self, InstanceError> {
        let path = dir.join(LOCK_FILE);

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .mode(0o644)
            .open(&path)
            .map_err(|e| InstanceError::Open {
                path: path.clone(),
                source: e,
            })?;

        let lock = Flock::lock(file, FlockArg::LockExclusiveNonblock).map_err(|(_, errno)| {
            if errno == Errno::EWOULDBLOCK {
                InstanceError::AlreadyRunning { path: path.clone() }
            } else {
                InstanceError::Lock {
                    path: path.clone(),
                    source: errno,
                }
            }
        })?;

        Ok(Self { _lock: lock, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
