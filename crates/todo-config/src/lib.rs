//! todo-config
//!
//! Persistent user settings for Todo Master.
//! Owns the Config data structure plus disk persistence helpers.

pub mod error;
pub mod manager;
pub mod model;

pub use error::{ConfigError, ConfigResult};
pub use manager::ConfigManager;
pub use model::{Config, DATA_DIR_ENV};
