//! todo-core
//!
//! Services and background persistence for Todo Master.
//! Depends on todo-domain and todo-storage-json. No CLI, no terminal I/O.

pub mod autosave;
pub mod error;
pub mod project_service;
pub mod task_service;
pub mod time;

pub use autosave::{AutoSaveSettings, AutoSaveStatus, AutoSaver, SaveTarget, SharedStore};
pub use error::{CoreError, CoreResult};
pub use project_service::{ProjectService, ProjectStats};
pub use task_service::{TaskService, DEFAULT_TASK_SORT};
pub use time::{Clock, SystemClock};
