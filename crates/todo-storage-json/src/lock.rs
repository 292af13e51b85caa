//! Advisory cross-process lock held for the duration of a save or load.

use std::{
    fs::{File, OpenOptions},
    path::{Path, PathBuf},
};

use fs2::FileExt;
use tracing::{debug, warn};

use crate::{StoreError, StoreResult};

pub const LOCK_FILE_NAME: &str = ".lock";

/// Exclusive lock on a sentinel file. Released when dropped, on every exit path.
#[derive(Debug)]
pub struct StoreLock {
    file: File,
    path: PathBuf,
}

impl StoreLock {
    /// Blocks until the lock on `path` is acquired, creating the sentinel if needed.
    pub fn acquire(path: &Path) -> StoreResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|err| StoreError::storage("open lock file", path, err))?;
        file.lock_exclusive()
            .map_err(|err| StoreError::storage("lock", path, err))?;
        debug!(path = %path.display(), "acquired store lock");
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        if let Err(err) = FileExt::unlock(&self.file) {
            warn!(path = %self.path.display(), error = %err, "failed to release store lock");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn lock_can_be_reacquired_after_drop() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join(LOCK_FILE_NAME);
        {
            let _lock = StoreLock::acquire(&path).expect("first lock");
        }
        let again = StoreLock::acquire(&path).expect("second lock");
        drop(again);
        assert!(path.exists());
    }

    #[test]
    fn held_lock_excludes_other_handles() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join(LOCK_FILE_NAME);
        let _held = StoreLock::acquire(&path).expect("lock");
        let other = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .expect("open sentinel");
        assert!(other.try_lock_exclusive().is_err());
    }
}
