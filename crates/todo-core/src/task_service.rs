//! Task operations on a shared store, with a timed undo buffer for deletes.

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use todo_domain::{FieldValue, Task, TaskChange, DEFAULT_PROJECT};
use todo_storage_json::{Filter, ListQuery};
use tracing::debug;
use uuid::Uuid;

use crate::{AutoSaver, Clock, CoreError, CoreResult, SharedStore, SystemClock};

/// Highest priority first.
pub const DEFAULT_TASK_SORT: &str = "-priority";
pub const DEFAULT_UNDO_TIMEOUT: Duration = Duration::from_secs(10);

/// Validated task mutations. Every successful mutation marks the auto-saver dirty.
pub struct TaskService {
    store: SharedStore<Task>,
    autosave: Option<Arc<AutoSaver>>,
    clock: Arc<dyn Clock>,
    undo_timeout: Duration,
    undo_buffer: Mutex<Vec<(DateTime<Utc>, Task)>>,
    default_project: String,
}

impl TaskService {
    pub fn new(store: SharedStore<Task>) -> Self {
        Self {
            store,
            autosave: None,
            clock: Arc::new(SystemClock),
            undo_timeout: DEFAULT_UNDO_TIMEOUT,
            undo_buffer: Mutex::new(Vec::new()),
            default_project: DEFAULT_PROJECT.into(),
        }
    }

    pub fn with_autosave(mut self, autosave: Arc<AutoSaver>) -> Self {
        self.autosave = Some(autosave);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_undo_timeout(mut self, timeout: Duration) -> Self {
        self.undo_timeout = timeout;
        self
    }

    pub fn with_default_project(mut self, project: impl Into<String>) -> Self {
        self.default_project = project.into();
        self
    }

    pub fn default_project(&self) -> &str {
        &self.default_project
    }

    pub fn store(&self) -> &SharedStore<Task> {
        &self.store
    }

    pub fn create(&self, mut task: Task) -> CoreResult<Task> {
        if task.project.trim().is_empty() {
            task.project = self.default_project.clone();
        }
        let now = self.clock.now();
        task.created_at = now;
        task.updated_at = now;
        let created = self.store.lock().create(task)?;
        self.changed();
        Ok(created)
    }

    /// Creates a task with default fields in the default project.
    pub fn add(&self, title: impl Into<String>) -> CoreResult<Task> {
        self.create(Task::new(title).with_project(self.default_project.as_str()))
    }

    pub fn get(&self, id: Uuid) -> Option<Task> {
        self.store.lock().read(id).cloned()
    }

    pub fn update(&self, id: Uuid, changes: &[TaskChange]) -> CoreResult<Task> {
        let updated = self.store.lock().update(id, changes)?;
        self.changed();
        Ok(updated)
    }

    pub fn update_fields<I, S>(&self, id: Uuid, fields: I) -> CoreResult<Task>
    where
        I: IntoIterator<Item = (S, FieldValue)>,
        S: AsRef<str>,
    {
        let updated = self.store.lock().update_fields(id, fields)?;
        self.changed();
        Ok(updated)
    }

    /// Removes the task and keeps a copy for [`TaskService::undo_delete`].
    /// Returns `false` when no such task exists.
    pub fn delete(&self, id: Uuid) -> bool {
        let Some(task) = self.store.lock().remove(id) else {
            return false;
        };
        let now = self.clock.now();
        let mut buffer = self.undo_buffer.lock();
        buffer.push((now, task));
        self.prune_undo(&mut buffer, now);
        drop(buffer);
        self.changed();
        true
    }

    /// Restores the most recently deleted task if the undo window is still open.
    pub fn undo_delete(&self) -> CoreResult<Option<Task>> {
        let now = self.clock.now();
        let entry = {
            let mut buffer = self.undo_buffer.lock();
            self.prune_undo(&mut buffer, now);
            buffer.pop()
        };
        let Some((_, task)) = entry else {
            return Ok(None);
        };
        let restored = self.store.lock().create(task)?;
        debug!(id = %restored.id, "restored deleted task");
        self.changed();
        Ok(Some(restored))
    }

    pub fn can_undo(&self) -> bool {
        let now = self.clock.now();
        let mut buffer = self.undo_buffer.lock();
        self.prune_undo(&mut buffer, now);
        !buffer.is_empty()
    }

    pub fn mark_done(&self, id: Uuid) -> CoreResult<Task> {
        self.set_completion(id, |task, now| task.mark_done(now))
    }

    pub fn toggle_done(&self, id: Uuid) -> CoreResult<Task> {
        self.set_completion(id, |task, now| task.toggle_done(now))
    }

    /// Lists tasks matching `filter`, sorted by `sort` (default `-priority`).
    pub fn list(&self, filter: Option<Filter>, sort: Option<&str>) -> Vec<Task> {
        let query = ListQuery::new()
            .filter(filter.unwrap_or_default())
            .sort_by(sort.unwrap_or(DEFAULT_TASK_SORT));
        self.store.lock().list(&query)
    }

    /// All tasks in insertion order.
    pub fn all(&self) -> Vec<Task> {
        self.store.lock().list(&ListQuery::new())
    }

    /// Title and description search.
    pub fn search(&self, query: &str) -> Vec<Task> {
        self.store
            .lock()
            .search(query, &["title", "description"], None)
    }

    pub fn count(&self, filter: Option<&Filter>) -> usize {
        self.store.lock().count(filter)
    }

    fn set_completion(
        &self,
        id: Uuid,
        transition: impl FnOnce(&mut Task, DateTime<Utc>),
    ) -> CoreResult<Task> {
        let mut task = self
            .get(id)
            .ok_or_else(|| CoreError::NotFound(format!("task {id}")))?;
        transition(&mut task, self.clock.now());
        self.update(
            id,
            &[
                TaskChange::Status(task.status),
                TaskChange::CompletedAt(task.completed_at),
            ],
        )
    }

    fn prune_undo(&self, buffer: &mut Vec<(DateTime<Utc>, Task)>, now: DateTime<Utc>) {
        buffer.retain(|(deleted_at, _)| {
            now.signed_duration_since(*deleted_at)
                .to_std()
                .map(|age| age < self.undo_timeout)
                .unwrap_or(true)
        });
    }

    fn changed(&self) {
        if let Some(autosave) = &self.autosave {
            autosave.mark_dirty();
        }
    }
}
