use std::{env, ffi::OsString, path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{ConfigError, ConfigResult};

/// Environment variable that overrides the data directory.
pub const DATA_DIR_ENV: &str = "TODO_MASTER_HOME";
const DEFAULT_DIR_NAME: &str = ".todo_master";

/// User-configurable persistence and behaviour settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Optional custom data directory. Defaults to `~/.todo_master`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
    /// Quiet period after the last change before auto-save writes.
    pub autosave_interval_secs: u64,
    pub autosave_poll_millis: u64,
    /// Numbered backups kept per data file.
    pub backup_retention: usize,
    pub undo_timeout_secs: u64,
    pub default_project: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: None,
            autosave_interval_secs: 5,
            autosave_poll_millis: 1000,
            backup_retention: 5,
            undo_timeout_secs: 10,
            default_project: "Inbox".into(),
        }
    }
}

impl Config {
    pub fn autosave_interval(&self) -> Duration {
        Duration::from_secs(self.autosave_interval_secs)
    }

    pub fn autosave_poll(&self) -> Duration {
        Duration::from_millis(self.autosave_poll_millis)
    }

    pub fn undo_timeout(&self) -> Duration {
        Duration::from_secs(self.undo_timeout_secs)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.autosave_poll_millis == 0 {
            return Err(ConfigError::Invalid {
                field: "autosave_poll_millis",
                reason: "must be greater than zero".into(),
            });
        }
        if self.backup_retention == 0 {
            return Err(ConfigError::Invalid {
                field: "backup_retention",
                reason: "at least one backup must be kept".into(),
            });
        }
        if self.default_project.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "default_project",
                reason: "cannot be empty".into(),
            });
        }
        Ok(())
    }

    /// Data directory: `TODO_MASTER_HOME`, then `data_dir`, then `~/.todo_master`.
    pub fn resolve_data_dir(&self) -> PathBuf {
        self.resolve_data_dir_from(env::var_os(DATA_DIR_ENV))
    }

    pub fn resolve_data_dir_from(&self, override_dir: Option<OsString>) -> PathBuf {
        if let Some(dir) = override_dir.filter(|dir| !dir.is_empty()) {
            return PathBuf::from(dir);
        }
        if let Some(path) = &self.data_dir {
            return path.clone();
        }
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(DEFAULT_DIR_NAME)
    }
}
