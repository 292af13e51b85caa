use thiserror::Error;
use todo_domain::DomainError;
use todo_storage_json::StoreError;

pub type CoreResult<T> = Result<T, CoreError>;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Store(StoreError),
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Auto-save failed: {0}")]
    AutoSave(String),
}

impl CoreError {
    pub fn is_validation(&self) -> bool {
        matches!(self, CoreError::Validation(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, CoreError::NotFound(_))
    }
}

impl From<StoreError> for CoreError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Validation(message) => CoreError::Validation(message),
            StoreError::NotFound { kind, id } => CoreError::NotFound(format!("{kind} {id}")),
            other => CoreError::Store(other),
        }
    }
}

impl From<DomainError> for CoreError {
    fn from(err: DomainError) -> Self {
        StoreError::from(err).into()
    }
}
