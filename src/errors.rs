use thiserror::Error;
use todo_config::ConfigError;
use todo_core::CoreError;
use todo_storage_json::StoreError;

pub type AppResult<T> = Result<T, AppError>;

/// Top-level error for the application and its command line.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("{0}")]
    Usage(String),
}
