//! Durable write path for one document file: temp write, backup, atomic rename.

use std::{
    fs::{self, File},
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};

use tracing::{debug, info, warn};

use crate::{
    lock::{StoreLock, LOCK_FILE_NAME},
    BackupChain, StoreError, StoreResult, BACKUP_DIR_NAME,
};

const TMP_SUFFIX: &str = "tmp";
const CORRUPT_SUFFIX: &str = "corrupt";

/// Location of a persisted document together with its backup chain and lock file.
#[derive(Debug, Clone)]
pub struct StorageFile {
    path: PathBuf,
    backups: BackupChain,
    lock_path: PathBuf,
}

impl StorageFile {
    pub fn new(path: impl Into<PathBuf>, retention: usize) -> Self {
        let path = path.into();
        let parent = parent_dir(&path);
        Self {
            backups: BackupChain::new(parent.join(BACKUP_DIR_NAME), retention),
            lock_path: parent.join(LOCK_FILE_NAME),
            path,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn backups(&self) -> &BackupChain {
        &self.backups
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default()
            .to_string()
    }

    pub(crate) fn tmp_path(&self) -> PathBuf {
        tmp_path(&self.path)
    }

    pub fn lock(&self) -> StoreResult<StoreLock> {
        let parent = parent_dir(&self.path);
        fs::create_dir_all(&parent)
            .map_err(|err| StoreError::storage("create data directory", &parent, err))?;
        StoreLock::acquire(&self.lock_path)
    }

    /// Persists `contents` under the store lock.
    pub fn commit(&self, contents: &str) -> StoreResult<()> {
        let _lock = self.lock()?;
        self.commit_locked(contents)
    }

    /// Persists `contents`; the caller holds the store lock.
    ///
    /// The target is only touched by the final rename, so any failure before
    /// it leaves the previous file byte-identical.
    pub(crate) fn commit_locked(&self, contents: &str) -> StoreResult<()> {
        let tmp = self.tmp_path();
        write_synced(&tmp, contents)?;
        if let Err(err) = self.backups.create(&self.path) {
            discard(&tmp);
            return Err(err);
        }
        self.replace_with(&tmp)?;
        self.backups.prune_beyond_retention(&self.file_name())?;
        debug!(path = %self.path.display(), bytes = contents.len(), "saved document");
        Ok(())
    }

    /// Rewrites the primary without rotating the backup chain.
    pub(crate) fn rewrite_locked(&self, contents: &str) -> StoreResult<()> {
        let tmp = self.tmp_path();
        write_synced(&tmp, contents)?;
        self.replace_with(&tmp)
    }

    /// Reads the primary file. `Ok(None)` when it does not exist.
    pub(crate) fn read_primary(&self) -> StoreResult<Option<String>> {
        match fs::read_to_string(&self.path) {
            Ok(text) => Ok(Some(text)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(StoreError::storage("read", &self.path, err)),
        }
    }

    /// Moves an unreadable primary aside so it survives the self-heal rewrite.
    pub(crate) fn quarantine_primary(&self) -> StoreResult<Option<PathBuf>> {
        if !self.path.exists() {
            return Ok(None);
        }
        self.backups.ensure_dir()?;
        let target = self
            .backups
            .dir()
            .join(format!("{}.{CORRUPT_SUFFIX}", self.file_name()));
        fs::copy(&self.path, &target)
            .map_err(|err| StoreError::storage("quarantine", &target, err))?;
        info!(path = %target.display(), "kept copy of unreadable document");
        Ok(Some(target))
    }

    fn replace_with(&self, tmp: &Path) -> StoreResult<()> {
        if let Err(err) = fs::rename(tmp, &self.path) {
            discard(tmp);
            return Err(StoreError::storage("replace", &self.path, err));
        }
        sync_parent(&self.path);
        Ok(())
    }
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut tmp = path.to_path_buf();
    let ext = match path.extension().and_then(|ext| ext.to_str()) {
        Some(existing) => format!("{existing}.{TMP_SUFFIX}"),
        None => TMP_SUFFIX.to_string(),
    };
    tmp.set_extension(ext);
    tmp
}

fn write_synced(path: &Path, contents: &str) -> StoreResult<()> {
    let mut file = File::create(path).map_err(|err| StoreError::storage("write", path, err))?;
    file.write_all(contents.as_bytes())
        .and_then(|()| file.flush())
        .and_then(|()| file.sync_all())
        .map_err(|err| {
            discard(path);
            StoreError::storage("write", path, err)
        })
}

fn discard(path: &Path) {
    if let Err(err) = fs::remove_file(path) {
        if err.kind() != ErrorKind::NotFound {
            warn!(path = %path.display(), error = %err, "failed to remove temp file");
        }
    }
}

#[cfg(unix)]
fn sync_parent(path: &Path) {
    let parent = parent_dir(path);
    if let Err(err) = File::open(&parent).and_then(|dir| dir.sync_all()) {
        debug!(path = %parent.display(), error = %err, "directory sync skipped");
    }
}

#[cfg(not(unix))]
fn sync_parent(_path: &Path) {}
