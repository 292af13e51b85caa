use std::{
    io,
    path::{Path, PathBuf},
};

use thiserror::Error;
use todo_domain::DomainError;
use uuid::Uuid;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: Uuid },
    #[error("Unknown field `{field}` for {entity}")]
    UnknownField { entity: &'static str, field: String },
    #[error("Invalid value for `{field}`: expected {expected}")]
    InvalidValue {
        field: String,
        expected: &'static str,
    },
    #[error("Failed to {action} {}: {source}", .path.display())]
    Storage {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Serialization error in {}: {message}", .path.display())]
    Serde { path: PathBuf, message: String },
    #[error("Corrupted data in {}: {reason}", .path.display())]
    Corrupted { path: PathBuf, reason: String },
    #[error("Backup not found: {}", .0.display())]
    BackupNotFound(PathBuf),
}

impl StoreError {
    pub(crate) fn storage(action: &'static str, path: &Path, source: io::Error) -> Self {
        StoreError::Storage {
            action,
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn corrupted(path: &Path, reason: impl Into<String>) -> Self {
        StoreError::Corrupted {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }

    /// `true` for errors describing unreadable file contents rather than I/O faults.
    pub fn is_corruption(&self) -> bool {
        matches!(self, StoreError::Serde { .. } | StoreError::Corrupted { .. })
    }
}

impl From<DomainError> for StoreError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation(message) => StoreError::Validation(message),
            DomainError::UnknownField { entity, field } => {
                StoreError::UnknownField { entity, field }
            }
            DomainError::InvalidValue { field, expected } => {
                StoreError::InvalidValue { field, expected }
            }
        }
    }
}
