//! Project operations: unique names, archiving and per-project task statistics.

use std::sync::Arc;

use todo_domain::{default_projects, Project, ProjectChange, TaskStatus};
use todo_storage_json::{Filter, ListQuery};
use uuid::Uuid;

use crate::{AutoSaver, CoreError, CoreResult, SharedStore, TaskService};

/// Task counts for one project.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectStats {
    pub project_name: String,
    pub total: usize,
    pub completed: usize,
    pub in_progress: usize,
    pub todo: usize,
    /// Percentage of completed tasks, `0.0` for an empty project.
    pub completion_rate: f64,
}

pub struct ProjectService {
    store: SharedStore<Project>,
    autosave: Option<Arc<AutoSaver>>,
}

impl ProjectService {
    pub fn new(store: SharedStore<Project>) -> Self {
        Self {
            store,
            autosave: None,
        }
    }

    pub fn with_autosave(mut self, autosave: Arc<AutoSaver>) -> Self {
        self.autosave = Some(autosave);
        self
    }

    pub fn store(&self) -> &SharedStore<Project> {
        &self.store
    }

    /// Seeds Inbox, Personal and Work into an empty store. Returns how many were added.
    pub fn ensure_defaults(&self) -> CoreResult<usize> {
        let mut store = self.store.lock();
        if !store.is_empty() {
            return Ok(0);
        }
        let defaults = default_projects();
        let added = defaults.len();
        for project in defaults {
            store.create(project)?;
        }
        drop(store);
        self.changed();
        Ok(added)
    }

    pub fn create(&self, project: Project) -> CoreResult<Project> {
        self.validate_name(None, &project.name)?;
        let created = self.store.lock().create(project)?;
        self.changed();
        Ok(created)
    }

    pub fn get(&self, id: Uuid) -> Option<Project> {
        self.store.lock().read(id).cloned()
    }

    /// Case-insensitive lookup by trimmed name.
    pub fn get_by_name(&self, name: &str) -> Option<Project> {
        let normalized = normalize(name);
        self.store
            .lock()
            .iter()
            .find(|project| normalize(&project.name) == normalized)
            .cloned()
    }

    pub fn update(&self, id: Uuid, changes: &[ProjectChange]) -> CoreResult<Project> {
        for change in changes {
            if let ProjectChange::Name(name) = change {
                self.validate_name(Some(id), name)?;
            }
        }
        let updated = self.store.lock().update(id, changes)?;
        self.changed();
        Ok(updated)
    }

    pub fn archive(&self, id: Uuid) -> CoreResult<Project> {
        self.update(id, &[ProjectChange::Archived(true)])
    }

    pub fn unarchive(&self, id: Uuid) -> CoreResult<Project> {
        self.update(id, &[ProjectChange::Archived(false)])
    }

    /// Deletes a project. With `tasks` given, refuses while any task still belongs to it.
    pub fn delete(&self, id: Uuid, tasks: Option<&TaskService>) -> CoreResult<bool> {
        let project = self
            .get(id)
            .ok_or_else(|| CoreError::NotFound(format!("project {id}")))?;
        if let Some(tasks) = tasks {
            let remaining = tasks.count(Some(&Self::task_filter(&project)));
            if remaining > 0 {
                return Err(CoreError::Validation(format!(
                    "Cannot delete project '{}' - it has {remaining} active tasks. \
                     Move tasks to another project first.",
                    project.name
                )));
            }
        }
        let deleted = self.store.lock().delete(id);
        if deleted {
            self.changed();
        }
        Ok(deleted)
    }

    /// Projects sorted by lowercase name.
    pub fn list(&self, include_archived: bool) -> Vec<Project> {
        let query = if include_archived {
            ListQuery::new()
        } else {
            ListQuery::new().filter(Filter::new().eq("is_archived", false))
        };
        let mut projects = self.store.lock().list(&query);
        projects.sort_by_key(|project| project.name.to_lowercase());
        projects
    }

    pub fn statistics(&self, id: Uuid, tasks: &TaskService) -> CoreResult<ProjectStats> {
        let project = self
            .get(id)
            .ok_or_else(|| CoreError::NotFound(format!("project {id}")))?;
        let members = tasks.list(Some(Self::task_filter(&project)), None);
        let count = |status: TaskStatus| members.iter().filter(|task| task.status == status).count();
        let total = members.len();
        let completed = count(TaskStatus::Done);
        Ok(ProjectStats {
            project_name: project.name,
            total,
            completed,
            in_progress: count(TaskStatus::InProgress),
            todo: count(TaskStatus::Todo),
            completion_rate: if total > 0 {
                completed as f64 / total as f64 * 100.0
            } else {
                0.0
            },
        })
    }

    /// Statistics for every active project, in list order.
    pub fn all_statistics(&self, tasks: &TaskService) -> CoreResult<Vec<ProjectStats>> {
        self.list(false)
            .iter()
            .map(|project| self.statistics(project.id, tasks))
            .collect()
    }

    fn task_filter(project: &Project) -> Filter {
        Filter::new().eq("project", project.name.as_str())
    }

    fn validate_name(&self, exclude: Option<Uuid>, candidate: &str) -> CoreResult<()> {
        let normalized = normalize(candidate);
        let duplicate = self.store.lock().iter().any(|project| {
            normalize(&project.name) == normalized && exclude != Some(project.id)
        });
        if duplicate {
            Err(CoreError::Validation(format!(
                "Project '{}' already exists",
                candidate.trim()
            )))
        } else {
            Ok(())
        }
    }

    fn changed(&self) {
        if let Some(autosave) = &self.autosave {
            autosave.mark_dirty();
        }
    }
}

fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}
