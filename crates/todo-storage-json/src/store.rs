//! Generic in-memory entity collection persisted to one JSON document.

use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use todo_domain::{Entity, FieldValue};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    document::{self, Decoded, SkippedRecord},
    BackupInfo, Filter, ListQuery, StorageFile, StoreError, StoreResult,
};

pub const DEFAULT_RETENTION: usize = 5;

/// Where the data adopted by `load` or `restore` came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// No primary file and no backups: the store starts empty.
    Fresh,
    Primary,
    /// The primary was missing or unreadable and a backup was adopted.
    /// `healed` is false when rewriting the primary from it failed.
    Recovered { from: PathBuf, healed: bool },
    Restored { from: PathBuf },
    /// Nothing could be decoded. The store was reset to empty.
    Failed { attempts: Vec<(PathBuf, String)> },
}

impl LoadOutcome {
    pub fn succeeded(&self) -> bool {
        !matches!(self, LoadOutcome::Failed { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadReport {
    pub outcome: LoadOutcome,
    pub loaded: usize,
    pub skipped: Vec<SkippedRecord>,
    pub version: Option<String>,
    pub saved_at: Option<DateTime<Utc>>,
}

impl LoadReport {
    fn empty(outcome: LoadOutcome) -> Self {
        Self {
            outcome,
            loaded: 0,
            skipped: Vec::new(),
            version: None,
            saved_at: None,
        }
    }
}

/// In-memory collection of one entity type, keyed by id and iterated in insertion order.
#[derive(Debug)]
pub struct EntityStore<T: Entity> {
    entities: HashMap<Uuid, T>,
    order: Vec<Uuid>,
    file: StorageFile,
    last_save: Option<DateTime<Utc>>,
}

impl<T: Entity> EntityStore<T> {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self::with_retention(path, DEFAULT_RETENTION)
    }

    pub fn with_retention(path: impl Into<PathBuf>, retention: usize) -> Self {
        Self {
            entities: HashMap::new(),
            order: Vec::new(),
            file: StorageFile::new(path, retention),
            last_save: None,
        }
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn file(&self) -> &StorageFile {
        &self.file
    }

    pub fn last_save(&self) -> Option<DateTime<Utc>> {
        self.last_save
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.entities.contains_key(&id)
    }

    /// Entities in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        self.order.iter().filter_map(|id| self.entities.get(id))
    }

    /// Validates and inserts `entity`, assigning an id when it has none.
    /// An entity whose id is already stored replaces the stored one.
    pub fn create(&mut self, mut entity: T) -> StoreResult<T> {
        if entity.id().is_nil() {
            entity.set_id(Uuid::new_v4());
        }
        entity.validate()?;
        let id = entity.id();
        if self.entities.insert(id, entity.clone()).is_some() {
            debug!(kind = T::KIND, %id, "replaced existing entity on create");
        } else {
            self.order.push(id);
        }
        Ok(entity)
    }

    pub fn read(&self, id: Uuid) -> Option<&T> {
        self.entities.get(&id)
    }

    /// Applies `changes` to a working copy and stores it only if it still validates.
    pub fn update(&mut self, id: Uuid, changes: &[T::Change]) -> StoreResult<T> {
        let stored = self
            .entities
            .get_mut(&id)
            .ok_or(StoreError::NotFound { kind: T::KIND, id })?;
        let mut working = stored.clone();
        for change in changes {
            working.apply(change);
        }
        working.touch(Utc::now());
        working.validate()?;
        *stored = working.clone();
        Ok(working)
    }

    /// Named-field variant of [`EntityStore::update`]. Every name is parsed
    /// before anything is applied.
    pub fn update_fields<I, S>(&mut self, id: Uuid, fields: I) -> StoreResult<T>
    where
        I: IntoIterator<Item = (S, FieldValue)>,
        S: AsRef<str>,
    {
        if !self.contains(id) {
            return Err(StoreError::NotFound { kind: T::KIND, id });
        }
        let changes = fields
            .into_iter()
            .map(|(name, value)| T::parse_change(name.as_ref(), value))
            .collect::<Result<Vec<_>, _>>()?;
        self.update(id, &changes)
    }

    pub fn remove(&mut self, id: Uuid) -> Option<T> {
        let removed = self.entities.remove(&id)?;
        self.order.retain(|candidate| *candidate != id);
        Some(removed)
    }

    pub fn delete(&mut self, id: Uuid) -> bool {
        self.remove(id).is_some()
    }

    pub fn clear(&mut self) {
        self.entities.clear();
        self.order.clear();
    }

    pub fn list(&self, query: &ListQuery) -> Vec<T> {
        query.apply(self.iter())
    }

    /// Case-insensitive substring search over `fields`, in insertion order.
    pub fn search(&self, query: &str, fields: &[&str], limit: Option<usize>) -> Vec<T> {
        let needle = query.to_lowercase();
        self.iter()
            .filter(|entity| {
                fields.iter().any(|field| {
                    entity
                        .field(field)
                        .and_then(|value| value.search_text())
                        .map(|text| text.to_lowercase().contains(&needle))
                        .unwrap_or(false)
                })
            })
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect()
    }

    pub fn count(&self, filter: Option<&Filter>) -> usize {
        match filter {
            Some(filter) => self.iter().filter(|entity| filter.matches(*entity)).count(),
            None => self.len(),
        }
    }

    /// Updates every known id in turn. Unknown ids are skipped; the first
    /// validation failure stops the loop and earlier updates stay applied.
    pub fn bulk_update(&mut self, ids: &[Uuid], changes: &[T::Change]) -> StoreResult<usize> {
        let mut updated = 0;
        for id in ids {
            if !self.contains(*id) {
                continue;
            }
            self.update(*id, changes)?;
            updated += 1;
        }
        Ok(updated)
    }

    /// Point-in-time document of the current contents.
    pub fn encode(&self) -> StoreResult<String> {
        let records: Vec<&T> = self.iter().collect();
        document::encode(self.path(), &records, Utc::now())
    }

    pub fn mark_saved(&mut self, at: DateTime<Utc>) {
        self.last_save = Some(at);
    }

    pub fn save(&mut self) -> StoreResult<()> {
        let contents = self.encode()?;
        self.file.commit(&contents)?;
        self.mark_saved(Utc::now());
        Ok(())
    }

    /// Loads the primary file, falling back to the backup chain when it is
    /// missing or unreadable. A recovered backup is written back as the primary.
    pub fn load(&mut self) -> StoreResult<LoadReport> {
        let _lock = self.file.lock()?;
        let mut attempts = Vec::new();

        match self.file.read_primary() {
            Ok(None) => debug!(path = %self.path().display(), "no primary document"),
            Ok(Some(text)) => match document::decode::<T>(self.path(), &text) {
                Ok(decoded) => return Ok(self.adopt(decoded, LoadOutcome::Primary)),
                Err(err) => {
                    warn!(path = %self.path().display(), error = %err, "primary document unreadable");
                    attempts.push((self.path().to_path_buf(), err.to_string()));
                }
            },
            Err(err) => {
                warn!(path = %self.path().display(), error = %err, "primary document unreadable");
                attempts.push((self.path().to_path_buf(), err.to_string()));
            }
        }

        let candidates = self.file.backups().list(&self.file.file_name())?;
        if candidates.is_empty() && attempts.is_empty() {
            self.clear();
            return Ok(LoadReport::empty(LoadOutcome::Fresh));
        }

        for candidate in candidates {
            let decoded = fs::read_to_string(&candidate)
                .map_err(|err| StoreError::storage("read", &candidate, err))
                .and_then(|text| document::decode::<T>(&candidate, &text));
            match decoded {
                Ok(decoded) => {
                    let mut report = self.adopt(
                        decoded,
                        LoadOutcome::Recovered {
                            from: candidate.clone(),
                            healed: false,
                        },
                    );
                    let healed = self.heal_primary();
                    info!(
                        path = %self.path().display(),
                        from = %candidate.display(),
                        healed,
                        "recovered from backup"
                    );
                    report.outcome = LoadOutcome::Recovered {
                        from: candidate,
                        healed,
                    };
                    return Ok(report);
                }
                Err(err) => {
                    warn!(backup = %candidate.display(), error = %err, "backup unreadable");
                    attempts.push((candidate, err.to_string()));
                }
            }
        }

        warn!(path = %self.path().display(), attempts = attempts.len(), "no readable document, starting empty");
        self.clear();
        Ok(LoadReport::empty(LoadOutcome::Failed { attempts }))
    }

    /// Rotates the chain and copies the current file into slot `.1`.
    pub fn backup(&self) -> StoreResult<Option<PathBuf>> {
        let _lock = self.file.lock()?;
        self.file.backups().create(self.path())
    }

    /// Timestamped copy that rotation and pruning never remove.
    pub fn snapshot_backup(&self) -> StoreResult<Option<PathBuf>> {
        let _lock = self.file.lock()?;
        self.file.backups().create_timestamped(self.path())
    }

    /// Replaces the contents with `backup` and saves them. The current file is
    /// rotated into the chain first. An unreadable backup leaves the store untouched.
    pub fn restore(&mut self, backup: &Path) -> StoreResult<LoadReport> {
        if !backup.is_file() {
            return Err(StoreError::BackupNotFound(backup.to_path_buf()));
        }
        let _lock = self.file.lock()?;
        let text =
            fs::read_to_string(backup).map_err(|err| StoreError::storage("read", backup, err))?;
        let decoded = document::decode::<T>(backup, &text)?;
        let report = self.adopt(
            decoded,
            LoadOutcome::Restored {
                from: backup.to_path_buf(),
            },
        );
        let contents = self.encode()?;
        self.file.commit_locked(&contents)?;
        self.mark_saved(Utc::now());
        info!(path = %self.path().display(), from = %backup.display(), "restored from backup");
        Ok(report)
    }

    pub fn list_backups(&self) -> StoreResult<Vec<BackupInfo>> {
        let backups = self.file.backups();
        backups
            .list(&self.file.file_name())?
            .iter()
            .map(|path| backups.info(path))
            .collect()
    }

    fn adopt(&mut self, decoded: Decoded<T>, outcome: LoadOutcome) -> LoadReport {
        self.clear();
        for entity in decoded.records {
            let id = entity.id();
            self.order.push(id);
            self.entities.insert(id, entity);
        }
        debug!(
            path = %self.path().display(),
            kind = T::KIND,
            loaded = self.len(),
            skipped = decoded.skipped.len(),
            "loaded document"
        );
        LoadReport {
            outcome,
            loaded: self.len(),
            skipped: decoded.skipped,
            version: Some(decoded.version),
            saved_at: decoded.saved_at,
        }
    }

    /// Keeps the unreadable primary aside and rewrites it from memory.
    /// The backup chain is not rotated, so the adopted slot stays in place.
    fn heal_primary(&mut self) -> bool {
        let result = self
            .file
            .quarantine_primary()
            .and_then(|_| self.encode())
            .and_then(|contents| self.file.rewrite_locked(&contents));
        match result {
            Ok(()) => {
                self.mark_saved(Utc::now());
                true
            }
            Err(err) => {
                warn!(path = %self.path().display(), error = %err, "could not rewrite primary document");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{tempdir, TempDir};
    use todo_domain::{Priority, Task, TaskChange};

    fn store() -> (TempDir, EntityStore<Task>) {
        let dir = tempdir().expect("tempdir");
        let store = EntityStore::with_retention(dir.path().join("tasks.json"), 3);
        (dir, store)
    }

    #[test]
    fn create_assigns_missing_id() {
        let (_guard, mut store) = store();
        let mut task = Task::new("Needs id");
        task.id = Uuid::nil();
        let created = store.create(task).expect("create");
        assert!(!created.id.is_nil());
        assert_eq!(store.read(created.id), Some(&created));
    }

    #[test]
    fn titleless_create_is_rejected_without_inserting() {
        let (_guard, mut store) = store();
        let err = store.create(Task::new("")).expect_err("empty title");
        assert!(matches!(err, StoreError::Validation(_)));
        assert_eq!(store.count(None), 0);
    }

    #[test]
    fn create_with_existing_id_replaces_in_place() {
        let (_guard, mut store) = store();
        let first = store.create(Task::new("first")).expect("create");
        store.create(Task::new("second")).expect("create");
        let mut again = first.clone();
        again.title = "first again".into();
        store.create(again).expect("recreate");
        let titles: Vec<&str> = store.iter().map(|task| task.title.as_str()).collect();
        assert_eq!(titles, vec!["first again", "second"]);
    }

    #[test]
    fn update_unknown_id_is_not_found() {
        let (_guard, mut store) = store();
        let id = Uuid::new_v4();
        let err = store
            .update(id, &[TaskChange::Title("x".into())])
            .expect_err("unknown id");
        assert!(matches!(err, StoreError::NotFound { kind: "task", id: missing } if missing == id));
    }

    #[test]
    fn failed_validation_keeps_previous_state() {
        let (_guard, mut store) = store();
        let task = store.create(Task::new("Keep")).expect("create");
        let err = store
            .update(
                task.id,
                &[
                    TaskChange::Priority(Priority::High),
                    TaskChange::Title("  ".into()),
                ],
            )
            .expect_err("blank title");
        assert!(matches!(err, StoreError::Validation(_)));
        let stored = store.read(task.id).expect("still stored");
        assert_eq!(stored, &task);
    }

    #[test]
    fn update_refreshes_timestamp() {
        let (_guard, mut store) = store();
        let task = store.create(Task::new("Touch me")).expect("create");
        let updated = store
            .update(task.id, &[TaskChange::Position(4)])
            .expect("update");
        assert_eq!(updated.position, 4);
        assert!(updated.updated_at >= task.updated_at);
    }

    #[test]
    fn update_fields_rejects_unknown_names_atomically() {
        let (_guard, mut store) = store();
        let task = store.create(Task::new("Named")).expect("create");
        let err = store
            .update_fields(
                task.id,
                [("title", FieldValue::from("Renamed")), ("colour", FieldValue::from("red"))],
            )
            .expect_err("unknown field");
        assert!(matches!(err, StoreError::UnknownField { .. }));
        assert_eq!(store.read(task.id).expect("stored").title, "Named");

        let updated = store
            .update_fields(task.id, [("priority", FieldValue::from("urgent"))])
            .expect("update");
        assert_eq!(updated.priority, Priority::Urgent);
    }

    #[test]
    fn search_is_case_insensitive_and_limited() {
        let (_guard, mut store) = store();
        store.create(Task::new("Buy MILK")).expect("create");
        store
            .create(Task::new("Call").with_description("ask about milk"))
            .expect("create");
        store.create(Task::new("Walk dog")).expect("create");
        assert_eq!(store.search("milk", &["title", "description"], None).len(), 2);
        assert_eq!(store.search("milk", &["title"], None).len(), 1);
        assert_eq!(store.search("MILK", &["title", "description"], Some(1)).len(), 1);
        assert!(store.search("milk", &["unknown"], None).is_empty());
    }

    #[test]
    fn bulk_update_skips_unknown_ids() {
        let (_guard, mut store) = store();
        let a = store.create(Task::new("a")).expect("create");
        let b = store.create(Task::new("b")).expect("create");
        let updated = store
            .bulk_update(&[a.id, Uuid::new_v4(), b.id], &[TaskChange::Priority(Priority::Low)])
            .expect("bulk");
        assert_eq!(updated, 2);
        let low = Filter::new().eq("priority", "low");
        assert_eq!(store.count(Some(&low)), 2);
    }

    #[test]
    fn delete_reports_presence() {
        let (_guard, mut store) = store();
        let task = store.create(Task::new("gone")).expect("create");
        assert!(store.delete(task.id));
        assert!(!store.delete(task.id));
        assert!(store.is_empty());
    }

    #[test]
    fn fresh_load_without_files() {
        let (_guard, mut store) = store();
        let report = store.load().expect("load");
        assert_eq!(report.outcome, LoadOutcome::Fresh);
        assert_eq!(report.loaded, 0);
    }
}
