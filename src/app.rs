//! Application lifecycle: open data files, start auto-save, shut down cleanly.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use parking_lot::Mutex;
use todo_config::{Config, ConfigManager};
use todo_core::{AutoSaveSettings, AutoSaver, ProjectService, SharedStore, TaskService};
use todo_domain::{Entity, Project, Task};
use todo_storage_json::{EntityStore, LoadOutcome, LoadReport};
use tracing::{info, warn};

use crate::{utils::paths::DataPaths, AppError, AppResult};

/// Open Todo Master session: both stores, their auto-savers and the services over them.
pub struct TodoApp {
    config: Config,
    paths: DataPaths,
    tasks: TaskService,
    projects: ProjectService,
    task_autosave: Arc<AutoSaver>,
    project_autosave: Arc<AutoSaver>,
    task_load: Option<LoadReport>,
    project_load: Option<LoadReport>,
    shut_down: bool,
}

impl TodoApp {
    /// Opens the data directory chosen by `TODO_MASTER_HOME`, the stored config, or the default.
    pub fn open_default() -> AppResult<Self> {
        let home = Config::default().resolve_data_dir();
        let config = ConfigManager::with_base_dir(&home)?.load()?;
        let data_dir = config.resolve_data_dir();
        Self::open_with(&data_dir, config)
    }

    /// Opens `data_dir`, reading `config.json` from it when present.
    pub fn open_in(data_dir: &Path) -> AppResult<Self> {
        let config = ConfigManager::with_base_dir(data_dir)?.load()?;
        Self::open_with(data_dir, config)
    }

    pub fn open_with(data_dir: &Path, config: Config) -> AppResult<Self> {
        config.validate()?;
        let paths = DataPaths::new(data_dir);
        paths.ensure()?;

        let task_store = shared_store::<Task>(&paths.tasks_file, config.backup_retention);
        let project_store = shared_store::<Project>(&paths.projects_file, config.backup_retention);
        let task_load = load_store(&task_store);
        let project_load = load_store(&project_store);

        let settings = AutoSaveSettings {
            interval: config.autosave_interval(),
            poll: config.autosave_poll(),
        };
        let task_autosave = Arc::new(AutoSaver::new(task_store.clone(), settings));
        let project_autosave = Arc::new(AutoSaver::new(project_store.clone(), settings));

        let tasks = TaskService::new(task_store)
            .with_autosave(task_autosave.clone())
            .with_undo_timeout(config.undo_timeout())
            .with_default_project(config.default_project.clone());
        let projects = ProjectService::new(project_store).with_autosave(project_autosave.clone());
        let seeded = projects.ensure_defaults()?;
        if seeded > 0 {
            info!(seeded, "created default projects");
        }

        task_autosave.start()?;
        project_autosave.start()?;
        info!(path = %paths.root.display(), "opened data directory");

        Ok(Self {
            config,
            paths,
            tasks,
            projects,
            task_autosave,
            project_autosave,
            task_load,
            project_load,
            shut_down: false,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn paths(&self) -> &DataPaths {
        &self.paths
    }

    pub fn tasks(&self) -> &TaskService {
        &self.tasks
    }

    pub fn projects(&self) -> &ProjectService {
        &self.projects
    }

    pub fn task_autosave(&self) -> &AutoSaver {
        &self.task_autosave
    }

    pub fn project_autosave(&self) -> &AutoSaver {
        &self.project_autosave
    }

    /// Report of the initial task load, `None` if it failed with an error.
    pub fn task_load(&self) -> Option<&LoadReport> {
        self.task_load.as_ref()
    }

    pub fn project_load(&self) -> Option<&LoadReport> {
        self.project_load.as_ref()
    }

    /// Timestamped copies of both data files. Rotation never removes them.
    pub fn snapshot(&self) -> AppResult<Vec<PathBuf>> {
        let mut created = Vec::new();
        created.extend(self.tasks.store().lock().snapshot_backup()?);
        created.extend(self.projects.store().lock().snapshot_backup()?);
        Ok(created)
    }

    /// Restores the task or project file from `backup`, picked by the backup's file name.
    pub fn restore(&self, backup: &Path) -> AppResult<LoadReport> {
        let name = backup
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default();
        // Holding the saver's lock keeps a save encoded before the restore
        // from landing on top of it.
        let report = if name.starts_with(Project::COLLECTION) {
            self.project_autosave
                .with_save_lock(|| self.projects.store().lock().restore(backup))?
        } else {
            self.task_autosave
                .with_save_lock(|| self.tasks.store().lock().restore(backup))?
        };
        Ok(report)
    }

    /// Stops both auto-savers with a final save. A store is written directly
    /// only when its final auto-save failed to flush it. Later calls do nothing.
    pub fn shutdown(&mut self) -> AppResult<()> {
        if self.shut_down {
            return Ok(());
        }
        self.shut_down = true;

        let mut first_error: Option<AppError> = None;
        if let Err(err) = finish(&self.task_autosave, self.tasks.store()) {
            first_error.get_or_insert(err);
        }
        if let Err(err) = finish(&self.project_autosave, self.projects.store()) {
            first_error.get_or_insert(err);
        }
        info!("shut down");
        first_error.map_or(Ok(()), Err)
    }
}

impl Drop for TodoApp {
    fn drop(&mut self) {
        if let Err(err) = self.shutdown() {
            warn!(error = %err, "shutdown on drop failed");
        }
    }
}

/// Stops `autosave` and retries once against the store if changes are still unsaved.
fn finish<T: Entity>(autosave: &AutoSaver, store: &SharedStore<T>) -> AppResult<()> {
    let stopped = autosave.stop(true);
    if let Err(err) = &stopped {
        warn!(error = %err, "final auto-save failed");
    }
    if stopped.is_ok() && !autosave.is_dirty() {
        return Ok(());
    }
    let mut store = store.lock();
    if let Err(err) = store.save() {
        warn!(path = %store.path().display(), error = %err, "saving at shutdown failed");
        return Err(err.into());
    }
    Ok(())
}

fn shared_store<T: Entity>(path: &Path, retention: usize) -> SharedStore<T> {
    Arc::new(Mutex::new(EntityStore::with_retention(path, retention)))
}

fn load_store<T: Entity>(store: &SharedStore<T>) -> Option<LoadReport> {
    let mut store = store.lock();
    match store.load() {
        Ok(report) => {
            match &report.outcome {
                LoadOutcome::Failed { attempts } => warn!(
                    path = %store.path().display(),
                    attempts = attempts.len(),
                    "no readable data, starting empty"
                ),
                LoadOutcome::Recovered { from, healed } => warn!(
                    path = %store.path().display(),
                    from = %from.display(),
                    healed,
                    "data restored from backup"
                ),
                _ => {}
            }
            if !report.skipped.is_empty() {
                warn!(
                    path = %store.path().display(),
                    skipped = report.skipped.len(),
                    "some records could not be read"
                );
            }
            Some(report)
        }
        Err(err) => {
            warn!(path = %store.path().display(), error = %err, "load failed, starting empty");
            None
        }
    }
}
