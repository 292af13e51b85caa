//! Numbered backup rotation plus retention-exempt timestamped snapshots.
//!
//! For a tracked file `tasks.json` and retention `N` the chain lives in the
//! backup directory as `tasks.json.1 … tasks.json.N`, `.1` being the newest.
//! Snapshots are named `tasks_<YYYYMMDD_HHMMSS>.json` and are never pruned.

use std::{
    cmp::Reverse,
    fs,
    path::{Path, PathBuf},
    time::SystemTime,
};

use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::debug;

use crate::{StoreError, StoreResult};

pub const BACKUP_DIR_NAME: &str = "backups";
const SNAPSHOT_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";
const TMP_SUFFIX: &str = "tmp";

/// Metadata describing a backup file on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupInfo {
    pub path: PathBuf,
    pub name: String,
    pub size_bytes: u64,
    pub modified: Option<DateTime<Utc>>,
    /// Rotation slot, `None` for timestamped snapshots.
    pub slot: Option<usize>,
}

/// Rotating backup chain rooted in one directory.
#[derive(Debug, Clone)]
pub struct BackupChain {
    dir: PathBuf,
    retention: usize,
}

impl BackupChain {
    pub fn new(dir: PathBuf, retention: usize) -> Self {
        Self {
            dir,
            retention: retention.max(1),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn ensure_dir(&self) -> StoreResult<()> {
        fs::create_dir_all(&self.dir)
            .map_err(|err| StoreError::storage("create backup directory", &self.dir, err))
    }

    pub fn slot_path(&self, filename: &str, slot: usize) -> PathBuf {
        self.dir.join(format!("{filename}.{slot}"))
    }

    /// Shifts `.i` to `.i+1` from the highest retained slot down, vacating `.1`.
    pub fn rotate(&self, filename: &str) -> StoreResult<()> {
        for slot in (1..self.retention).rev() {
            let from = self.slot_path(filename, slot);
            if !from.exists() {
                continue;
            }
            let to = self.slot_path(filename, slot + 1);
            if to.exists() {
                fs::remove_file(&to).map_err(|err| StoreError::storage("remove backup", &to, err))?;
            }
            fs::rename(&from, &to).map_err(|err| StoreError::storage("rotate backup", &from, err))?;
        }
        Ok(())
    }

    /// Rotates the chain and copies `file` into slot `.1`. `None` when `file` does not exist.
    pub fn create(&self, file: &Path) -> StoreResult<Option<PathBuf>> {
        if !file.exists() {
            return Ok(None);
        }
        let filename = file_name(file)?;
        self.ensure_dir()?;
        self.rotate(&filename)?;
        let slot = self.slot_path(&filename, 1);
        copy_via_tmp(file, &slot)?;
        debug!(backup = %slot.display(), "rotated backup chain");
        Ok(Some(slot))
    }

    /// Copies `file` under a timestamped name exempt from rotation and pruning.
    pub fn create_timestamped(&self, file: &Path) -> StoreResult<Option<PathBuf>> {
        if !file.exists() {
            return Ok(None);
        }
        self.ensure_dir()?;
        let name = file_name(file)?;
        let (stem, suffix) = split_name(&name);
        let timestamp = Utc::now().format(SNAPSHOT_TIMESTAMP_FORMAT).to_string();
        let mut target = self.dir.join(format!("{stem}_{timestamp}{suffix}"));
        let mut counter = 1;
        while target.exists() {
            target = self
                .dir
                .join(format!("{stem}_{timestamp}-{counter}{suffix}"));
            counter += 1;
        }
        copy_via_tmp(file, &target)?;
        debug!(backup = %target.display(), "created snapshot backup");
        Ok(Some(target))
    }

    /// Existing numbered slots `1..=retention`, then snapshots newest first.
    pub fn list(&self, filename: &str) -> StoreResult<Vec<PathBuf>> {
        let mut backups: Vec<PathBuf> = (1..=self.retention)
            .map(|slot| self.slot_path(filename, slot))
            .filter(|path| path.is_file())
            .collect();
        backups.extend(self.snapshots(filename)?);
        Ok(backups)
    }

    /// Slot `.1` if present, else the newest snapshot.
    pub fn latest(&self, filename: &str) -> StoreResult<Option<PathBuf>> {
        let first = self.slot_path(filename, 1);
        if first.is_file() {
            return Ok(Some(first));
        }
        Ok(self.snapshots(filename)?.into_iter().next())
    }

    /// Deletes numbered slots above the retention count. Returns how many were removed.
    pub fn prune_beyond_retention(&self, filename: &str) -> StoreResult<usize> {
        if !self.dir.exists() {
            return Ok(0);
        }
        let prefix = format!("{filename}.");
        let mut removed = 0;
        let entries =
            fs::read_dir(&self.dir).map_err(|err| StoreError::storage("list", &self.dir, err))?;
        for entry in entries {
            let entry = entry.map_err(|err| StoreError::storage("list", &self.dir, err))?;
            let path = entry.path();
            let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
                continue;
            };
            let Some(slot) = name
                .strip_prefix(&prefix)
                .and_then(|rest| rest.parse::<usize>().ok())
            else {
                continue;
            };
            if slot > self.retention {
                fs::remove_file(&path)
                    .map_err(|err| StoreError::storage("remove backup", &path, err))?;
                removed += 1;
            }
        }
        if removed > 0 {
            debug!(filename, removed, "pruned backups beyond retention");
        }
        Ok(removed)
    }

    pub fn info(&self, path: &Path) -> StoreResult<BackupInfo> {
        let meta = fs::metadata(path).map_err(|err| StoreError::storage("inspect", path, err))?;
        let name = file_name(path)?;
        let slot = name
            .rsplit_once('.')
            .and_then(|(_, tail)| tail.parse::<usize>().ok());
        Ok(BackupInfo {
            path: path.to_path_buf(),
            name,
            size_bytes: meta.len(),
            modified: meta.modified().ok().map(DateTime::<Utc>::from),
            slot,
        })
    }

    fn snapshots(&self, filename: &str) -> StoreResult<Vec<PathBuf>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let (stem, suffix) = split_name(filename);
        let prefix = format!("{stem}_");
        let mut found = Vec::new();
        let entries =
            fs::read_dir(&self.dir).map_err(|err| StoreError::storage("list", &self.dir, err))?;
        for entry in entries {
            let entry = entry.map_err(|err| StoreError::storage("list", &self.dir, err))?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
                continue;
            };
            let Some(middle) = name
                .strip_prefix(&prefix)
                .and_then(|rest| rest.strip_suffix(suffix))
            else {
                continue;
            };
            if parse_snapshot_timestamp(middle).is_none() {
                continue;
            }
            let modified = entry
                .metadata()
                .and_then(|meta| meta.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            found.push((modified, name.to_string(), path));
        }
        found.sort_by_key(|(modified, name, _)| Reverse((*modified, name.clone())));
        Ok(found.into_iter().map(|(_, _, path)| path).collect())
    }
}

/// Splits `tasks.json` into (`tasks`, `.json`). Names without an extension get an empty suffix.
fn split_name(filename: &str) -> (&str, &str) {
    match filename.rfind('.') {
        Some(idx) if idx > 0 => (&filename[..idx], &filename[idx..]),
        _ => (filename, ""),
    }
}

fn parse_snapshot_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let stamp = value.split_once('-').map(|(stamp, _)| stamp).unwrap_or(value);
    NaiveDateTime::parse_from_str(stamp, SNAPSHOT_TIMESTAMP_FORMAT)
        .ok()
        .map(|naive| DateTime::from_naive_utc_and_offset(naive, Utc))
}

fn file_name(path: &Path) -> StoreResult<String> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .ok_or_else(|| StoreError::corrupted(path, "path has no usable file name"))
}

fn copy_via_tmp(from: &Path, to: &Path) -> StoreResult<()> {
    let mut tmp = to.as_os_str().to_owned();
    tmp.push(format!(".{TMP_SUFFIX}"));
    let tmp = PathBuf::from(tmp);
    fs::copy(from, &tmp).map_err(|err| StoreError::storage("copy backup", &tmp, err))?;
    fs::rename(&tmp, to).map_err(|err| StoreError::storage("rename backup", to, err))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{tempdir, TempDir};

    fn chain_with_file(retention: usize) -> (TempDir, BackupChain, PathBuf) {
        let dir = tempdir().expect("tempdir");
        let file = dir.path().join("tasks.json");
        let chain = BackupChain::new(dir.path().join(BACKUP_DIR_NAME), retention);
        (dir, chain, file)
    }

    #[test]
    fn create_is_noop_without_source() {
        let (_guard, chain, file) = chain_with_file(3);
        assert_eq!(chain.create(&file).expect("create"), None);
        assert!(chain.list("tasks.json").expect("list").is_empty());
    }

    #[test]
    fn rotation_keeps_newest_in_slot_one() {
        let (_guard, chain, file) = chain_with_file(3);
        for version in ["a", "b", "c", "d"] {
            fs::write(&file, version).expect("write live file");
            chain.create(&file).expect("backup");
        }
        let slots: Vec<String> = chain
            .list("tasks.json")
            .expect("list")
            .iter()
            .map(|path| fs::read_to_string(path).expect("read slot"))
            .collect();
        assert_eq!(slots, vec!["d", "c", "b"]);
        assert!(!chain.slot_path("tasks.json", 4).exists());
    }

    #[test]
    fn retention_of_one_overwrites_single_slot() {
        let (_guard, chain, file) = chain_with_file(0);
        fs::write(&file, "first").expect("write");
        chain.create(&file).expect("backup");
        fs::write(&file, "second").expect("write");
        chain.create(&file).expect("backup");
        let slot = chain.slot_path("tasks.json", 1);
        assert_eq!(fs::read_to_string(slot).expect("read"), "second");
        assert_eq!(chain.list("tasks.json").expect("list").len(), 1);
    }

    #[test]
    fn prune_removes_slots_left_by_larger_retention() {
        let (guard, wide, file) = chain_with_file(5);
        for version in ["1", "2", "3", "4", "5"] {
            fs::write(&file, version).expect("write");
            wide.create(&file).expect("backup");
        }
        let narrow = BackupChain::new(guard.path().join(BACKUP_DIR_NAME), 2);
        assert_eq!(narrow.prune_beyond_retention("tasks.json").expect("prune"), 3);
        assert_eq!(narrow.list("tasks.json").expect("list").len(), 2);
        assert!(!narrow.slot_path("tasks.json", 3).exists());
    }

    #[test]
    fn snapshots_are_listed_after_slots_and_never_pruned() {
        let (_guard, chain, file) = chain_with_file(1);
        fs::write(&file, "live").expect("write");
        chain.create(&file).expect("backup");
        let first = chain
            .create_timestamped(&file)
            .expect("snapshot")
            .expect("snapshot path");
        let second = chain
            .create_timestamped(&file)
            .expect("snapshot")
            .expect("snapshot path");
        assert_ne!(first, second, "same-second snapshots must not collide");

        chain.prune_beyond_retention("tasks.json").expect("prune");
        let listed = chain.list("tasks.json").expect("list");
        assert_eq!(listed.len(), 3);
        assert_eq!(listed[0], chain.slot_path("tasks.json", 1));
        assert!(listed.contains(&first) && listed.contains(&second));
    }

    #[test]
    fn latest_prefers_slot_then_snapshot() {
        let (_guard, chain, file) = chain_with_file(2);
        assert_eq!(chain.latest("tasks.json").expect("latest"), None);
        fs::write(&file, "live").expect("write");
        let snapshot = chain
            .create_timestamped(&file)
            .expect("snapshot")
            .expect("snapshot path");
        assert_eq!(chain.latest("tasks.json").expect("latest"), Some(snapshot));
        let slot = chain.create(&file).expect("backup").expect("slot");
        assert_eq!(chain.latest("tasks.json").expect("latest"), Some(slot));
    }

    #[test]
    fn unrelated_files_are_not_snapshots() {
        let (guard, chain, file) = chain_with_file(2);
        chain.ensure_dir().expect("dir");
        fs::write(guard.path().join(BACKUP_DIR_NAME).join("tasks_archive.json"), "x")
            .expect("write");
        fs::write(&file, "live").expect("write");
        assert!(chain.list("tasks.json").expect("list").is_empty());
    }

    #[test]
    fn info_reports_slot_and_size() {
        let (_guard, chain, file) = chain_with_file(2);
        fs::write(&file, "12345").expect("write");
        let slot = chain.create(&file).expect("backup").expect("slot");
        let info = chain.info(&slot).expect("info");
        assert_eq!(info.slot, Some(1));
        assert_eq!(info.size_bytes, 5);
        assert_eq!(info.name, "tasks.json.1");
        assert!(info.modified.is_some());
    }
}
