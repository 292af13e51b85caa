//! todo-domain
//!
//! Pure domain models (Task, Project) and the entity contract consumed by storage.
//! No I/O, no CLI, no storage. Only data types, change sets and core enums.

pub mod common;
pub mod error;
pub mod field;
pub mod project;
pub mod task;

pub use common::*;
pub use error::DomainError;
pub use field::FieldValue;
pub use project::*;
pub use task::*;
