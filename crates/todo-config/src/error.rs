use std::{io, path::PathBuf};

use thiserror::Error;

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Could not parse {}: {message}", .path.display())]
    Parse { path: PathBuf, message: String },

    #[error("Serialization error: {0}")]
    Serde(String),

    /// A setting has a value the application cannot run with.
    #[error("Invalid setting `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}
