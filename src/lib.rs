#![doc(test(attr(deny(warnings))))]

//! Todo Master keeps tasks and projects in crash-safe JSON files, backs them up
//! on every save and writes changes in the background while the user works.

pub mod app;
pub mod cli;
pub mod errors;
pub mod utils;

pub use app::TodoApp;
pub use errors::{AppError, AppResult};

use std::sync::Once;

static INIT_TRACING: Once = Once::new();

/// Initializes global tracing and emits a startup info log.
pub fn init() {
    INIT_TRACING.call_once(|| {
        utils::init_tracing();
        tracing::info!("Todo Master tracing initialized.");
    });
}
