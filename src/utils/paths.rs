use std::{
    fs,
    path::{Path, PathBuf},
};

use todo_config::manager::CONFIG_FILE_NAME;
use todo_storage_json::BACKUP_DIR_NAME;

pub const TASKS_FILE: &str = "tasks.json";
pub const PROJECTS_FILE: &str = "projects.json";

/// File layout inside the data directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPaths {
    pub root: PathBuf,
    pub tasks_file: PathBuf,
    pub projects_file: PathBuf,
    pub config_file: PathBuf,
    pub backup_dir: PathBuf,
}

impl DataPaths {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            tasks_file: root.join(TASKS_FILE),
            projects_file: root.join(PROJECTS_FILE),
            config_file: root.join(CONFIG_FILE_NAME),
            backup_dir: root.join(BACKUP_DIR_NAME),
        }
    }

    pub fn ensure(&self) -> std::io::Result<()> {
        fs::create_dir_all(&self.root)
    }
}
