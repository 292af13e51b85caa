use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("Unknown field `{field}` for {entity}")]
    UnknownField { entity: &'static str, field: String },
    #[error("Invalid value for `{field}`: expected {expected}")]
    InvalidValue {
        field: String,
        expected: &'static str,
    },
}

impl DomainError {
    pub fn validation(message: impl Into<String>) -> Self {
        DomainError::Validation(message.into())
    }

    pub fn invalid_value(field: &str, expected: &'static str) -> Self {
        DomainError::InvalidValue {
            field: field.to_string(),
            expected,
        }
    }
}
